// crates/core/src/types.rs
//! Domain types shared across the storage, queue, search and MCP layers.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A bounded period of agent activity scoped to a project path.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub id: String,
    pub project_path: String,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
    pub status: SessionStatus,
    pub observation_count: i64,
    pub summary_id: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    Active,
    Idle,
    Completed,
}

impl SessionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionStatus::Active => "active",
            SessionStatus::Idle => "idle",
            SessionStatus::Completed => "completed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "active" => Some(SessionStatus::Active),
            "idle" => Some(SessionStatus::Idle),
            "completed" => Some(SessionStatus::Completed),
            _ => None,
        }
    }
}

/// The closed set of observation types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ObservationType {
    Decision,
    Bugfix,
    Feature,
    Refactor,
    Discovery,
    Change,
}

impl ObservationType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ObservationType::Decision => "decision",
            ObservationType::Bugfix => "bugfix",
            ObservationType::Feature => "feature",
            ObservationType::Refactor => "refactor",
            ObservationType::Discovery => "discovery",
            ObservationType::Change => "change",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "decision" => Some(ObservationType::Decision),
            "bugfix" => Some(ObservationType::Bugfix),
            "feature" => Some(ObservationType::Feature),
            "refactor" => Some(ObservationType::Refactor),
            "discovery" => Some(ObservationType::Discovery),
            "change" => Some(ObservationType::Change),
            _ => None,
        }
    }

    /// Closed lookup table used by the progressive-context relevance score
    /// and the heuristic reranker.
    pub fn importance_weight(&self) -> f64 {
        match self {
            ObservationType::Decision => 1.0,
            ObservationType::Bugfix => 0.9,
            ObservationType::Feature => 0.8,
            ObservationType::Refactor => 0.6,
            ObservationType::Discovery => 0.5,
            ObservationType::Change => 0.4,
        }
    }
}

/// A compressed record of one tool execution's significance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    pub id: String,
    pub session_id: String,
    pub obs_type: ObservationType,
    pub title: String,
    pub subtitle: String,
    pub facts: Vec<String>,
    pub narrative: String,
    pub concepts: Vec<String>,
    pub files_read: Vec<String>,
    pub files_modified: Vec<String>,
    pub raw_output: String,
    pub tool_name: String,
    pub created_at: DateTime<Utc>,
    pub token_count: i64,
    pub discovery_tokens: i64,
    pub importance: i32,
    pub embedding: Option<Vec<f32>>,
    pub superseded_by: Option<String>,
    pub superseded_at: Option<DateTime<Utc>>,
}

impl Observation {
    pub const DEFAULT_IMPORTANCE: i32 = 3;

    pub fn is_superseded(&self) -> bool {
        self.superseded_by.is_some()
    }
}

/// A lightweight projection used by the progressive context builder
/// and search results, avoiding transporting `raw_output` and full
/// `narrative` where only an index entry is needed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObservationIndexEntry {
    pub id: String,
    pub session_id: String,
    pub obs_type: ObservationType,
    pub title: String,
    pub subtitle: String,
    pub concepts: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub token_count: i64,
    pub importance: i32,
}

impl From<&Observation> for ObservationIndexEntry {
    fn from(o: &Observation) -> Self {
        ObservationIndexEntry {
            id: o.id.clone(),
            session_id: o.session_id.clone(),
            obs_type: o.obs_type,
            title: o.title.clone(),
            subtitle: o.subtitle.clone(),
            concepts: o.concepts.clone(),
            created_at: o.created_at,
            token_count: o.token_count,
            importance: o.importance,
        }
    }
}

/// One-per-session narrative summary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSummary {
    pub session_id: String,
    pub request: String,
    pub investigated: String,
    pub learned: String,
    pub completed: String,
    pub next_steps: String,
    pub summary: String,
    pub key_decisions: Vec<String>,
    pub files_modified: Vec<String>,
    pub concepts: Vec<String>,
    pub token_count: i64,
    pub created_at: DateTime<Utc>,
}

/// Durable queue entry status lattice:
/// pending < processing < {completed, failed}, with the stale-reset
/// exception processing -> pending.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl MessageStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageStatus::Pending => "pending",
            MessageStatus::Processing => "processing",
            MessageStatus::Completed => "completed",
            MessageStatus::Failed => "failed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(MessageStatus::Pending),
            "processing" => Some(MessageStatus::Processing),
            "completed" => Some(MessageStatus::Completed),
            "failed" => Some(MessageStatus::Failed),
            _ => None,
        }
    }
}

/// A durable queue entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingMessage {
    pub id: String,
    pub session_id: String,
    pub tool_name: String,
    pub tool_output: String,
    pub call_id: String,
    pub created_at: DateTime<Utc>,
    pub status: MessageStatus,
    pub retry_count: i32,
    pub last_error: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityType {
    Technology,
    Library,
    Pattern,
    Concept,
    File,
    Person,
    Project,
    Other,
}

impl EntityType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityType::Technology => "technology",
            EntityType::Library => "library",
            EntityType::Pattern => "pattern",
            EntityType::Concept => "concept",
            EntityType::File => "file",
            EntityType::Person => "person",
            EntityType::Project => "project",
            EntityType::Other => "other",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "technology" => Some(EntityType::Technology),
            "library" => Some(EntityType::Library),
            "pattern" => Some(EntityType::Pattern),
            "concept" => Some(EntityType::Concept),
            "file" => Some(EntityType::File),
            "person" => Some(EntityType::Person),
            "project" => Some(EntityType::Project),
            "other" => Some(EntityType::Other),
            _ => None,
        }
    }
}

/// A named thing extracted from observation content. Unique by (name, type).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    pub id: String,
    pub name: String,
    pub entity_type: EntityType,
    pub first_seen_at: DateTime<Utc>,
    pub last_seen_at: DateTime<Utc>,
    pub mention_count: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelationshipType {
    Uses,
    DependsOn,
    Implements,
    Extends,
    RelatedTo,
    Replaces,
    Configures,
}

impl RelationshipType {
    pub fn as_str(&self) -> &'static str {
        match self {
            RelationshipType::Uses => "uses",
            RelationshipType::DependsOn => "depends_on",
            RelationshipType::Implements => "implements",
            RelationshipType::Extends => "extends",
            RelationshipType::RelatedTo => "related_to",
            RelationshipType::Replaces => "replaces",
            RelationshipType::Configures => "configures",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "uses" => Some(RelationshipType::Uses),
            "depends_on" => Some(RelationshipType::DependsOn),
            "implements" => Some(RelationshipType::Implements),
            "extends" => Some(RelationshipType::Extends),
            "related_to" => Some(RelationshipType::RelatedTo),
            "replaces" => Some(RelationshipType::Replaces),
            "configures" => Some(RelationshipType::Configures),
            _ => None,
        }
    }
}

/// A directed, typed edge between two entities. Unique by
/// (source, target, relationship).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityRelation {
    pub id: String,
    pub source_entity_id: String,
    pub target_entity_id: String,
    pub relationship: RelationshipType,
    pub observation_id: String,
    pub created_at: DateTime<Utc>,
}

/// One row per applied schema version.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MigrationRecord {
    pub version: i64,
    pub name: String,
    pub applied_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn observation_type_round_trips_through_str() {
        for t in [
            ObservationType::Decision,
            ObservationType::Bugfix,
            ObservationType::Feature,
            ObservationType::Refactor,
            ObservationType::Discovery,
            ObservationType::Change,
        ] {
            assert_eq!(ObservationType::parse(t.as_str()), Some(t));
        }
        assert_eq!(ObservationType::parse("nonsense"), None);
    }

    #[test]
    fn session_status_round_trips() {
        for s in [SessionStatus::Active, SessionStatus::Idle, SessionStatus::Completed] {
            assert_eq!(SessionStatus::parse(s.as_str()), Some(s));
        }
    }

    #[test]
    fn message_status_round_trips() {
        for s in [
            MessageStatus::Pending,
            MessageStatus::Processing,
            MessageStatus::Completed,
            MessageStatus::Failed,
        ] {
            assert_eq!(MessageStatus::parse(s.as_str()), Some(s));
        }
    }

    #[test]
    fn relationship_type_round_trips() {
        for r in [
            RelationshipType::Uses,
            RelationshipType::DependsOn,
            RelationshipType::Implements,
            RelationshipType::Extends,
            RelationshipType::RelatedTo,
            RelationshipType::Replaces,
            RelationshipType::Configures,
        ] {
            assert_eq!(RelationshipType::parse(r.as_str()), Some(r));
        }
    }
}
