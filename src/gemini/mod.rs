//! Generative text API boundary.
//!
//! The recommendation generator talks to a [`TextGenerator`]; the
//! production implementation is [`GeminiClient`], which calls the Gemini
//! `generateContent` endpoint.

pub mod client;
pub mod error;
pub mod models;
pub mod traits;

pub use client::GeminiClient;
pub use error::GenerationError;
pub use traits::{GenerationRequest, TextGenerator};
