// crates/core/src/error.rs
use thiserror::Error;

/// Errors surfaced by the external AI collaborators (compressor/summarizer/
/// embedder/reranker). These are always recoverable from the caller's
/// perspective — see "Compressor failure" / "Embedding failure" /
/// "Reranker failure".
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("provider call failed: {0}")]
    Failed(String),

    #[error("provider timed out")]
    Timeout,

    #[error("provider rate-limited")]
    RateLimited,
}

/// Errors surfaced by the MCP request loop.
#[derive(Debug, Error)]
pub enum McpError {
    #[error("parse error")]
    Parse,

    #[error("invalid request")]
    InvalidRequest,

    #[error("method not found: {0}")]
    MethodNotFound(String),

    #[error("unknown tool: {0}")]
    UnknownTool(String),

    #[error("invalid tool arguments: {0}")]
    InvalidArguments(String),
}

impl McpError {
    /// JSON-RPC 2.0 error code for this error kind.
    pub fn code(&self) -> i64 {
        match self {
            McpError::Parse => -32700,
            McpError::InvalidRequest => -32600,
            McpError::MethodNotFound(_) => -32601,
            McpError::UnknownTool(_) | McpError::InvalidArguments(_) => -32602,
        }
    }
}
