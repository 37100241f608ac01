use super::error::GenerationError;
use async_trait::async_trait;

/// One call's worth of input for the generative API.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationRequest {
    pub prompt: String,
    /// Sampling temperature
    pub temperature: f32,
    /// Ask the API for a JSON array of `{ "song_title": ... }` objects
    pub structured: bool,
}

#[async_trait]
pub trait TextGenerator: Send + Sync {
    /// Short name for logs
    fn name(&self) -> &str;

    /// Send `request` and return the raw response body.
    ///
    /// `Ok` only for a 2xx response; the body may still be empty or
    /// malformed, which is for the caller to judge.
    async fn generate(&self, request: &GenerationRequest) -> Result<String, GenerationError>;
}
