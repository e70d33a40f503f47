//! Summary model seam used by the backend endpoints.

pub mod ollama;
pub mod prompt;

pub use ollama::OllamaClient;
pub use prompt::build_prompt;

use async_trait::async_trait;
use futures_util::stream::BoxStream;

#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("Cannot connect to Ollama at {0}")]
    Connection(String),

    #[error("HTTP client error: {0}")]
    HttpClient(String),

    #[error("Ollama returned error (status {status}): {body}")]
    OllamaError { status: u16, body: String },

    #[error("Failed to parse model response: {0}")]
    ResponseParsing(String),

    #[error("Model error: {0}")]
    Model(String),
}

/// Generated text fragments in order.
pub type TokenStream = BoxStream<'static, Result<String, LlmError>>;

#[async_trait]
pub trait SummaryModel: Send + Sync {
    fn model_name(&self) -> &str;

    /// Stream the completion for `prompt`, at most `max_tokens` long.
    async fn stream(&self, prompt: &str, max_tokens: u32) -> Result<TokenStream, LlmError>;

    /// Whole completion in one response.
    async fn generate(&self, prompt: &str, max_tokens: u32) -> Result<String, LlmError>;
}

/// Model double that replays fixed tokens, or fails.
#[derive(Debug, Clone, Default)]
pub struct MockSummaryModel {
    tokens: Vec<String>,
    failure: Option<String>,
}

impl MockSummaryModel {
    pub fn new<I, S>(tokens: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            tokens: tokens.into_iter().map(Into::into).collect(),
            failure: None,
        }
    }

    pub fn failing(message: &str) -> Self {
        Self {
            tokens: Vec::new(),
            failure: Some(message.to_string()),
        }
    }
}

#[async_trait]
impl SummaryModel for MockSummaryModel {
    fn model_name(&self) -> &str {
        "mock"
    }

    async fn stream(&self, _prompt: &str, _max_tokens: u32) -> Result<TokenStream, LlmError> {
        if let Some(message) = &self.failure {
            return Err(LlmError::Model(message.clone()));
        }
        let tokens: Vec<Result<String, LlmError>> = self.tokens.iter().cloned().map(Ok).collect();
        Ok(Box::pin(futures_util::stream::iter(tokens)))
    }

    async fn generate(&self, _prompt: &str, _max_tokens: u32) -> Result<String, LlmError> {
        match &self.failure {
            Some(message) => Err(LlmError::Model(message.clone())),
            None => Ok(self.tokens.concat()),
        }
    }
}
