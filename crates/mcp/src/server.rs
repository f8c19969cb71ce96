// crates/mcp/src/server.rs
//! The stdio JSON-RPC request loop (C8): newline-delimited parse/route,
//! concurrent in-flight tool-call tracking, project isolation for
//! mutation tools.

use std::sync::Arc;

use agent_memory_core::error::McpError;
use agent_memory_core::provider::ObservationDraft;
use agent_memory_core::types::ObservationType;
use agent_memory_db::{ObservationRepository, SessionRepository, SummaryRepository};
use agent_memory_search::{SearchOrchestrator, SearchRequest};
use serde_json::{json, Value};
use sqlx::SqlitePool;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::Mutex;
use tokio::task::JoinSet;

use crate::protocol::{JsonRpcResponse, RawRequest, ToolCallResult};
use crate::tools::{self, ToolName};

const PROTOCOL_VERSION: &str = "2024-11-05";

pub struct McpServer {
    project_path: String,
    server_name: String,
    server_version: String,
    pool: SqlitePool,
    observations: ObservationRepository,
    sessions: SessionRepository,
    summaries: SummaryRepository,
    orchestrator: SearchOrchestrator,
}

impl McpServer {
    pub fn new(
        project_path: String,
        pool: SqlitePool,
        observations: ObservationRepository,
        sessions: SessionRepository,
        summaries: SummaryRepository,
        orchestrator: SearchOrchestrator,
    ) -> Self {
        Self {
            project_path,
            server_name: "agent-memory".to_string(),
            server_version: env!("CARGO_PKG_VERSION").to_string(),
            pool,
            observations,
            sessions,
            summaries,
            orchestrator,
        }
    }

    /// Drives the request loop until `reader` hits EOF, then awaits every
    /// outstanding tool-call task before returning.
    pub async fn run<R, W>(self: Arc<Self>, mut reader: R, writer: W) -> std::io::Result<()>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin + Send + 'static,
    {
        let writer = Arc::new(Mutex::new(writer));
        let mut in_flight: JoinSet<()> = JoinSet::new();
        let mut line = String::new();

        loop {
            line.clear();
            let read = reader.read_line(&mut line).await?;
            if read == 0 {
                break;
            }
            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }

            match self.clone().dispatch(trimmed.to_string(), writer.clone()) {
                Dispatch::Immediate(Some(response)) => write_response(&writer, response).await?,
                Dispatch::Immediate(None) => {}
                Dispatch::Spawned(task) => {
                    in_flight.spawn(task);
                }
            }
        }

        while in_flight.join_next().await.is_some() {}
        Ok(())
    }

    /// Parses and routes one line. `tools/call` is handed back as a
    /// future to run concurrently with subsequent lines; everything else
    /// resolves synchronously.
    fn dispatch<W>(self: Arc<Self>, line: String, writer: Arc<Mutex<W>>) -> Dispatch
    where
        W: AsyncWrite + Unpin + Send + 'static,
    {
        let raw: RawRequest = match serde_json::from_str(&line) {
            Ok(r) => r,
            Err(_) => {
                return Dispatch::Immediate(Some(JsonRpcResponse::failure(
                    Value::Null,
                    McpError::Parse.code() as i32,
                    McpError::Parse.to_string(),
                )))
            }
        };

        if !raw.is_valid_request() {
            return Dispatch::Immediate(Some(JsonRpcResponse::failure(
                Value::Null,
                McpError::InvalidRequest.code() as i32,
                McpError::InvalidRequest.to_string(),
            )));
        }
        if raw.is_notification() {
            return Dispatch::Immediate(None);
        }

        let id = raw.id.clone().unwrap_or(Value::Null);
        let method = raw.method.clone().unwrap_or_default();

        match method.as_str() {
            "initialize" => Dispatch::Immediate(Some(JsonRpcResponse::success(
                id,
                json!({
                    "protocolVersion": PROTOCOL_VERSION,
                    "capabilities": {"tools": {}},
                    "serverInfo": {"name": self.server_name, "version": self.server_version},
                }),
            ))),
            "ping" => Dispatch::Immediate(Some(JsonRpcResponse::success(id, json!({})))),
            "tools/list" => Dispatch::Immediate(Some(JsonRpcResponse::success(
                id,
                json!({"tools": tools::catalog()}),
            ))),
            "tools/call" => {
                let params = raw.params.clone();
                Dispatch::Spawned(Box::pin(async move {
                    let response = self.handle_tool_call(id, params).await;
                    let _ = write_response(&writer, response).await;
                }))
            }
            _ => Dispatch::Immediate(Some(JsonRpcResponse::failure(
                id,
                McpError::MethodNotFound(method).code() as i32,
                "method not found",
            ))),
        }
    }

    async fn handle_tool_call(&self, id: Value, params: Option<Value>) -> JsonRpcResponse {
        let params = match params {
            Some(p) => p,
            None => {
                return JsonRpcResponse::failure(
                    id,
                    McpError::InvalidArguments("missing params".into()).code() as i32,
                    "missing params",
                )
            }
        };
        // A missing `name` is a protocol-level failure; an unrecognized
        // (but present) name is the tool handler's problem to report as
        // isError:true, same as any other invalid-argument case.
        let name = match params.get("name").and_then(|v| v.as_str()) {
            Some(n) => n,
            None => {
                return JsonRpcResponse::failure(
                    id,
                    McpError::InvalidArguments("missing name".into()).code() as i32,
                    "missing tool name",
                )
            }
        };
        let arguments = params.get("arguments").cloned().unwrap_or(json!({}));

        let result = match ToolName::canonicalize(name) {
            None => {
                tracing::warn!(tool = name, "unrecognized tool name");
                ToolCallResult::error(format!("unknown tool: {name}"))
            }
            Some(tool) => match self.run_tool(tool, arguments).await {
                Ok(value) => ToolCallResult::ok(value.to_string()),
                Err(message) => {
                    tracing::warn!(tool = tool.canonical(), error = %message, "tool call failed");
                    ToolCallResult::error(message)
                }
            },
        };
        JsonRpcResponse::success(id, serde_json::to_value(result).unwrap_or(json!({})))
    }

    async fn run_tool(&self, tool: ToolName, args: Value) -> Result<Value, String> {
        match tool {
            ToolName::Search => self.tool_search(args).await,
            ToolName::Recall => self.tool_recall(args).await,
            ToolName::Timeline => self.tool_timeline(args).await,
            ToolName::Save => self.tool_save(args).await,
            ToolName::Export => self.tool_export().await,
            ToolName::Import => self.tool_import(args).await,
            ToolName::Update => self.tool_update(args).await,
            ToolName::Delete => self.tool_delete(args).await,
        }
    }

    async fn tool_search(&self, args: Value) -> Result<Value, String> {
        let request: SearchRequest = serde_json::from_value(args).map_err(|e| format!("invalid search arguments: {e}"))?;
        let results = self.orchestrator.search(&request).await.map_err(|e| e.to_string())?;
        Ok(json!({"results": results}))
    }

    async fn tool_recall(&self, args: Value) -> Result<Value, String> {
        let id = args.get("id").and_then(|v| v.as_str()).ok_or("missing id")?;
        let observation = self
            .observations
            .get_by_id(id)
            .await
            .map_err(|e| e.to_string())?
            .ok_or_else(|| format!("no observation with id {id}"))?;
        Ok(serde_json::to_value(observation).unwrap_or(json!({})))
    }

    async fn tool_timeline(&self, args: Value) -> Result<Value, String> {
        let session_id = args.get("sessionId").and_then(|v| v.as_str());
        let limit = args.get("limit").and_then(|v| v.as_i64()).unwrap_or(50);
        let include_superseded = args.get("includeSuperseded").and_then(|v| v.as_bool()).unwrap_or(false);
        let observations = self
            .observations
            .timeline(&self.project_path, session_id, limit, include_superseded)
            .await
            .map_err(|e| e.to_string())?;

        let summary = match session_id {
            Some(sid) => self.summaries.get_by_session(sid).await.map_err(|e| e.to_string())?,
            None => None,
        };
        Ok(json!({"observations": observations, "summary": summary}))
    }

    async fn tool_save(&self, args: Value) -> Result<Value, String> {
        let session_id = args.get("sessionId").and_then(|v| v.as_str()).ok_or("missing sessionId")?;
        let title = args.get("title").and_then(|v| v.as_str()).ok_or("missing title")?;
        let narrative = args.get("narrative").and_then(|v| v.as_str()).ok_or("missing narrative")?;
        self.sessions.get_or_require(session_id).await.map_err(|e| e.to_string())?;

        let obs_type = args
            .get("type")
            .and_then(|v| v.as_str())
            .and_then(ObservationType::parse)
            .unwrap_or(ObservationType::Change);
        let string_array = |key: &str| -> Vec<String> {
            args.get(key)
                .and_then(|v| v.as_array())
                .map(|a| a.iter().filter_map(|v| v.as_str().map(str::to_string)).collect())
                .unwrap_or_default()
        };
        let draft = ObservationDraft {
            obs_type,
            title: title.to_string(),
            subtitle: args.get("subtitle").and_then(|v| v.as_str()).unwrap_or_default().to_string(),
            facts: string_array("facts"),
            narrative: narrative.to_string(),
            concepts: string_array("concepts"),
            files_read: string_array("filesRead"),
            files_modified: string_array("filesModified"),
            importance: args.get("importance").and_then(|v| v.as_i64()).unwrap_or(3) as i32,
        };

        let observation = self
            .observations
            .create(session_id, &draft, "mem-save", "")
            .await
            .map_err(|e| e.to_string())?;
        Ok(serde_json::to_value(observation).unwrap_or(json!({})))
    }

    async fn tool_export(&self) -> Result<Value, String> {
        let document = agent_memory_db::export_project(&self.pool, &self.project_path)
            .await
            .map_err(|e| e.to_string())?;
        Ok(serde_json::to_value(document).unwrap_or(json!({})))
    }

    async fn tool_import(&self, args: Value) -> Result<Value, String> {
        let document = args.get("document").and_then(|v| v.as_str()).ok_or("missing document")?;
        let outcome = agent_memory_db::import_document(&self.pool, document).await.map_err(|e| e.to_string())?;
        Ok(json!({"imported": outcome.imported, "skipped": outcome.skipped}))
    }

    async fn tool_update(&self, args: Value) -> Result<Value, String> {
        let id = args.get("id").and_then(|v| v.as_str()).ok_or("missing id")?;
        self.require_same_project(id).await?;

        let concepts: Option<Vec<String>> = args.get("concepts").and_then(|v| v.as_array()).map(|a| {
            a.iter().filter_map(|v| v.as_str().map(str::to_string)).collect()
        });
        self.observations
            .update_fields(
                id,
                args.get("title").and_then(|v| v.as_str()),
                args.get("subtitle").and_then(|v| v.as_str()),
                args.get("narrative").and_then(|v| v.as_str()),
                args.get("importance").and_then(|v| v.as_i64()).map(|v| v as i32),
                concepts.as_deref(),
            )
            .await
            .map_err(|e| e.to_string())?;
        Ok(json!({"updated": true}))
    }

    async fn tool_delete(&self, args: Value) -> Result<Value, String> {
        let id = args.get("id").and_then(|v| v.as_str()).ok_or("missing id")?;
        self.require_same_project(id).await?;
        self.observations.delete(id).await.map_err(|e| e.to_string())?;
        Ok(json!({"deleted": true}))
    }

    /// Project isolation: `mem-update`/`mem-delete` are no-ops when the
    /// observation's session belongs to a different project path.
    async fn require_same_project(&self, observation_id: &str) -> Result<(), String> {
        let owner = self
            .observations
            .project_path_for(observation_id)
            .await
            .map_err(|e| e.to_string())?
            .ok_or_else(|| format!("no observation with id {observation_id}"))?;
        if owner != self.project_path {
            return Err(format!("observation {observation_id} belongs to a different project"));
        }
        Ok(())
    }
}

enum Dispatch {
    Immediate(Option<JsonRpcResponse>),
    Spawned(std::pin::Pin<Box<dyn std::future::Future<Output = ()> + Send>>),
}

async fn write_response<W>(writer: &Arc<Mutex<W>>, response: JsonRpcResponse) -> std::io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    let mut line = serde_json::to_string(&response).unwrap_or_else(|_| "{}".to_string());
    line.push('\n');
    let mut guard = writer.lock().await;
    guard.write_all(line.as_bytes()).await?;
    guard.flush().await
}

#[cfg(test)]
mod tests {
    use super::*;
    use agent_memory_db::vector::VectorIndexKind;
    use agent_memory_db::Database;
    use tokio::io::AsyncReadExt;

    async fn build_server(project_path: &str) -> Arc<McpServer> {
        let db = Database::open_in_memory().await.unwrap();
        let pool = db.pool().clone();
        let observations = ObservationRepository::new(pool.clone());
        let sessions = SessionRepository::new(pool.clone());
        let summaries = SummaryRepository::new(pool.clone());
        let orchestrator = SearchOrchestrator::new(pool.clone(), observations.clone(), VectorIndexKind::InProcess);
        Arc::new(McpServer::new(
            project_path.to_string(),
            pool,
            observations,
            sessions,
            summaries,
            orchestrator,
        ))
    }

    /// Feeds `input` to the server over an in-memory duplex pipe and
    /// collects everything it writes back.
    async fn run_round_trip(server: Arc<McpServer>, input: &str) -> Vec<u8> {
        let (mut input_writer, input_reader) = tokio::io::duplex(8192);
        let (output_writer, mut output_reader) = tokio::io::duplex(8192);

        let run_handle = tokio::spawn(async move {
            server.run(tokio::io::BufReader::new(input_reader), output_writer).await.unwrap();
        });

        input_writer.write_all(input.as_bytes()).await.unwrap();
        drop(input_writer);

        let mut output = Vec::new();
        output_reader.read_to_end(&mut output).await.unwrap();
        run_handle.await.unwrap();
        output
    }

    /// A full stdio session: initialize, list tools, then call one by
    /// its `memory.*` alias, all over the same newline-delimited stream.
    #[tokio::test]
    async fn mcp_round_trip_initialize_list_and_search() {
        let server = build_server("/p").await;
        let input = concat!(
            r#"{"jsonrpc":"2.0","id":1,"method":"initialize","params":{}}"#,
            "\n",
            r#"{"jsonrpc":"2.0","id":2,"method":"tools/list"}"#,
            "\n",
            r#"{"jsonrpc":"2.0","id":3,"method":"tools/call","params":{"name":"memory.find","arguments":{"query":"anything"}}}"#,
            "\n",
        );
        let output = run_round_trip(server, input).await;

        let text = String::from_utf8(output).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 3);

        let responses: Vec<Value> = lines.iter().map(|l| serde_json::from_str(l).unwrap()).collect();
        let mut by_id = std::collections::HashMap::new();
        for r in &responses {
            by_id.insert(r["id"].as_i64().unwrap(), r.clone());
        }

        assert_eq!(by_id[&1]["result"]["protocolVersion"], "2024-11-05");

        let tools_list = by_id[&2]["result"]["tools"].as_array().unwrap();
        assert!(tools_list.iter().any(|t| t["name"] == "memory.find"));

        let content = &by_id[&3]["result"]["content"][0]["text"];
        let parsed: Value = serde_json::from_str(content.as_str().unwrap()).unwrap();
        assert!(parsed.get("results").is_some());
    }

    #[tokio::test]
    async fn notification_without_id_produces_no_response() {
        let server = build_server("/p").await;
        let output = run_round_trip(server, "{\"jsonrpc\":\"2.0\",\"method\":\"ping\"}\n").await;
        assert!(output.is_empty());
    }

    #[tokio::test]
    async fn malformed_json_yields_parse_error_with_null_id() {
        let server = build_server("/p").await;
        let output = run_round_trip(server, "not json\n").await;
        let response: Value = serde_json::from_slice(&output).unwrap();
        assert_eq!(response["id"], Value::Null);
        assert_eq!(response["error"]["code"], -32700);
    }

    #[tokio::test]
    async fn update_on_other_project_observation_is_rejected() {
        let db = Database::open_in_memory().await.unwrap();
        let pool = db.pool().clone();
        let observations = ObservationRepository::new(pool.clone());
        let sessions = SessionRepository::new(pool.clone());
        let summaries = SummaryRepository::new(pool.clone());
        let other_session = sessions.create("/other-project").await.unwrap();
        let draft = ObservationDraft {
            obs_type: ObservationType::Change,
            title: "t".into(),
            subtitle: String::new(),
            facts: vec![],
            narrative: "n".into(),
            concepts: vec![],
            files_read: vec![],
            files_modified: vec![],
            importance: 3,
        };
        let obs = observations.create(&other_session.id, &draft, "Read", "").await.unwrap();

        let orchestrator = SearchOrchestrator::new(pool.clone(), observations.clone(), VectorIndexKind::InProcess);
        let server = McpServer::new("/mine".to_string(), pool, observations, sessions, summaries, orchestrator);

        let result = server.run_tool(ToolName::Delete, json!({"id": obs.id})).await;
        assert!(result.is_err());
    }
}
