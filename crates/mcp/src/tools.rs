// crates/mcp/src/tools.rs
//! The static tool catalog and dual-name canonicalization.
//!
//! The source permits two spellings per tool (`mem-*` and `memory.*`);
//! we canonicalize internally to the `mem-*` short form and accept
//! either spelling on `tools/call`. Both spellings are published in
//! `tools/list` so a client that only recognizes the dotted form still
//! finds its tool.

use serde_json::{json, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ToolName {
    Search,
    Recall,
    Timeline,
    Save,
    Export,
    Import,
    Update,
    Delete,
}

impl ToolName {
    pub fn canonical(self) -> &'static str {
        match self {
            ToolName::Search => "mem-search",
            ToolName::Recall => "mem-recall",
            ToolName::Timeline => "mem-timeline",
            ToolName::Save => "mem-save",
            ToolName::Export => "mem-export",
            ToolName::Import => "mem-import",
            ToolName::Update => "mem-update",
            ToolName::Delete => "mem-delete",
        }
    }

    fn alias(self) -> Option<&'static str> {
        match self {
            ToolName::Search => Some("memory.find"),
            ToolName::Recall => Some("memory.get"),
            ToolName::Timeline => Some("memory.history"),
            ToolName::Save => Some("memory.create"),
            // export/import/update/delete have no `memory.*` alias in the source.
            _ => None,
        }
    }

    pub fn all() -> [ToolName; 8] {
        [
            ToolName::Search,
            ToolName::Recall,
            ToolName::Timeline,
            ToolName::Save,
            ToolName::Export,
            ToolName::Import,
            ToolName::Update,
            ToolName::Delete,
        ]
    }

    /// Accepts either spelling and returns the canonical tool, or `None`
    /// for an unrecognized name.
    pub fn canonicalize(raw: &str) -> Option<ToolName> {
        ToolName::all().into_iter().find(|t| t.canonical() == raw || t.alias() == Some(raw))
    }

    fn description(self) -> &'static str {
        match self {
            ToolName::Search => "Hybrid search over project observations.",
            ToolName::Recall => "Fetch a single observation by id.",
            ToolName::Timeline => "Reverse-chronological observations for a session or project.",
            ToolName::Save => "Create an observation directly, bypassing the compressor.",
            ToolName::Export => "Export a project's observations and summaries as a JSON document.",
            ToolName::Import => "Import a previously exported JSON document.",
            ToolName::Update => "Update mutable fields of an existing observation.",
            ToolName::Delete => "Delete an observation.",
        }
    }

    fn input_schema(self) -> Value {
        match self {
            ToolName::Search => json!({
                "type": "object",
                "properties": {
                    "query": {"type": "string"},
                    "strategy": {"type": "string", "enum": ["filter-only", "semantic", "hybrid"]},
                    "limit": {"type": "integer"},
                    "filters": {"type": "object"},
                },
                "required": ["query"],
            }),
            ToolName::Recall => json!({
                "type": "object",
                "properties": {"id": {"type": "string"}},
                "required": ["id"],
            }),
            ToolName::Timeline => json!({
                "type": "object",
                "properties": {
                    "sessionId": {"type": "string"},
                    "limit": {"type": "integer"},
                    "includeSuperseded": {"type": "boolean"},
                },
                "required": [],
            }),
            ToolName::Save => json!({
                "type": "object",
                "properties": {
                    "sessionId": {"type": "string"},
                    "type": {"type": "string"},
                    "title": {"type": "string"},
                    "subtitle": {"type": "string"},
                    "narrative": {"type": "string"},
                    "facts": {"type": "array", "items": {"type": "string"}},
                    "concepts": {"type": "array", "items": {"type": "string"}},
                    "filesRead": {"type": "array", "items": {"type": "string"}},
                    "filesModified": {"type": "array", "items": {"type": "string"}},
                    "importance": {"type": "integer"},
                },
                "required": ["sessionId", "title", "narrative"],
            }),
            ToolName::Export => json!({
                "type": "object",
                "properties": {},
                "required": [],
            }),
            ToolName::Import => json!({
                "type": "object",
                "properties": {"document": {"type": "string"}},
                "required": ["document"],
            }),
            ToolName::Update => json!({
                "type": "object",
                "properties": {
                    "id": {"type": "string"},
                    "title": {"type": "string"},
                    "subtitle": {"type": "string"},
                    "narrative": {"type": "string"},
                    "importance": {"type": "integer"},
                    "concepts": {"type": "array", "items": {"type": "string"}},
                },
                "required": ["id"],
            }),
            ToolName::Delete => json!({
                "type": "object",
                "properties": {"id": {"type": "string"}},
                "required": ["id"],
            }),
        }
    }
}

/// Serializes the full catalog: both spellings of each tool are listed
/// as separate entries sharing the same schema and description.
pub fn catalog() -> Vec<Value> {
    let mut entries = Vec::new();
    for tool in ToolName::all() {
        entries.push(json!({
            "name": tool.canonical(),
            "description": tool.description(),
            "inputSchema": tool.input_schema(),
        }));
        if let Some(alias) = tool.alias() {
            entries.push(json!({
                "name": alias,
                "description": tool.description(),
                "inputSchema": tool.input_schema(),
            }));
        }
    }
    entries
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn both_spellings_canonicalize_to_the_same_tool() {
        assert_eq!(ToolName::canonicalize("mem-search"), Some(ToolName::Search));
        assert_eq!(ToolName::canonicalize("memory.find"), Some(ToolName::Search));
    }

    #[test]
    fn unknown_name_does_not_canonicalize() {
        assert_eq!(ToolName::canonicalize("mem-nonsense"), None);
    }

    #[test]
    fn catalog_lists_both_spellings_for_aliased_tools() {
        let names: Vec<String> = catalog().iter().map(|v| v["name"].as_str().unwrap().to_string()).collect();
        assert!(names.contains(&"mem-search".to_string()));
        assert!(names.contains(&"memory.find".to_string()));
        assert!(names.contains(&"mem-export".to_string()));
    }
}
