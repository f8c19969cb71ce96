// crates/server/src/fallback.rs
//! Null-object external collaborators used when the surrounding config
//! loader has not wired in a real compressor/embedder/reranker. The
//! compressor path mirrors what a genuine failure already does; these
//! types exist so the composition root never has to special-case "no
//! AI configured".

use async_trait::async_trait;

use agent_memory_core::error::ProviderError;
use agent_memory_core::provider::{Compressor, Embedder, ObservationDraft};

/// Always returns the same deterministic draft a real compressor
/// produces when it fails.
pub struct NullCompressor;

#[async_trait]
impl Compressor for NullCompressor {
    async fn compress(&self, tool_output: &str, tool_name: &str) -> Result<ObservationDraft, ProviderError> {
        Ok(ObservationDraft::fallback(tool_name, tool_output))
    }
}

/// Always returns `None` ("no embedding available"), never an error.
pub struct NullEmbedder {
    dimension: usize,
}

impl NullEmbedder {
    pub fn new(dimension: usize) -> Self {
        Self { dimension }
    }
}

#[async_trait]
impl Embedder for NullEmbedder {
    async fn embed(&self, _text: &str) -> Result<Option<Vec<f32>>, ProviderError> {
        Ok(None)
    }

    fn dimension(&self) -> usize {
        self.dimension
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn null_compressor_always_yields_the_fallback_draft() {
        let draft = NullCompressor.compress("raw output", "Bash").await.unwrap();
        assert_eq!(draft.title, "Bash execution");
    }

    #[tokio::test]
    async fn null_embedder_always_yields_none() {
        let result = NullEmbedder::new(384).embed("text").await.unwrap();
        assert!(result.is_none());
    }
}
