use thiserror::Error;

/// Why a generation call produced no usable body.
///
/// Kept separate from an empty-but-successful response, which the client
/// returns as `Ok`.
#[derive(Debug, Error)]
pub enum GenerationError {
    /// The request never got a response (DNS, connect, timeout, body read)
    #[error("Transport error: {0}")]
    Transport(String),

    /// The API answered with a non-2xx status
    #[error("HTTP {status}: {body}")]
    Status { status: u16, body: String },

    /// No API key configured
    #[error("Gemini API key is not configured")]
    MissingApiKey,
}

impl From<reqwest::Error> for GenerationError {
    fn from(err: reqwest::Error) -> Self {
        GenerationError::Transport(err.without_url().to_string())
    }
}
