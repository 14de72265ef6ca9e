use anyhow::Result;
use async_trait::async_trait;

// =============================================================================
// ChatAgent Trait
// =============================================================================

/// A model that answers a single system + user prompt pair with text.
#[async_trait]
pub trait ChatAgent: Send + Sync {
    async fn answer(&self, system: &str, user: &str) -> Result<String>;
    /// Provider tag for reporting ("openai", "anthropic").
    fn provider(&self) -> &str;
}

// =============================================================================
// EmbedAgent Trait
// =============================================================================

#[async_trait]
pub trait EmbedAgent: Send + Sync {
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;
    /// Identifier of the embedding model, persisted alongside the vectors.
    fn embedding_model(&self) -> &str;
}

// =============================================================================
// TranscribeAgent Trait
// =============================================================================

/// Speech-to-text over a captured audio file.
#[async_trait]
pub trait TranscribeAgent: Send + Sync {
    async fn transcribe(&self, audio: Vec<u8>, file_name: &str) -> Result<String>;
    /// Identifier of the transcription model, recorded as transcript provenance.
    fn transcription_model(&self) -> &str;
    /// Provider tag recorded as transcript provenance.
    fn transcription_provider(&self) -> &str;
}
