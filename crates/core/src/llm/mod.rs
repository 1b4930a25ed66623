pub mod error;
pub mod narrative;
pub mod ollama;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Provider {
    Ollama,
}

/// One system + user exchange sent to a chat model.
#[derive(Debug, Clone)]
pub struct CompletionRequest {
    pub system: String,
    pub prompt: String,
    pub max_tokens: u32,
    pub temperature: f32,
}

#[async_trait::async_trait]
pub trait LlmClient: Send + Sync {
    fn provider(&self) -> Provider;

    /// Returns the model's reply text, trimmed.
    async fn complete(&self, req: CompletionRequest) -> anyhow::Result<String>;
}
