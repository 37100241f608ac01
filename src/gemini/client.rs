use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;

use super::error::GenerationError;
use super::models::GenerateContentRequest;
use super::traits::{GenerationRequest, TextGenerator};
use crate::config::Config;

/// The key travels in this header, never in the request URL.
const API_KEY_HEADER: &str = "x-goog-api-key";

pub struct GeminiClient {
    client: Client,
    api_key: Option<String>,
    base_url: String,
    model: String,
}

impl GeminiClient {
    pub fn new(
        api_key: Option<String>,
        base_url: impl Into<String>,
        model: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, GenerationError> {
        let client = Client::builder().timeout(timeout).build()?;

        Ok(Self {
            client,
            api_key: api_key.filter(|k| !k.trim().is_empty()),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            model: model.into(),
        })
    }

    pub fn from_config(config: &Config) -> Result<Self, GenerationError> {
        Self::new(
            config.gemini_api_key.clone(),
            &config.gemini_base_url,
            &config.gemini_model,
            Duration::from_secs(config.request_timeout_secs),
        )
    }

    fn endpoint(&self) -> String {
        format!("{}/models/{}:generateContent", self.base_url, self.model)
    }
}

#[async_trait]
impl TextGenerator for GeminiClient {
    fn name(&self) -> &str {
        &self.model
    }

    async fn generate(&self, request: &GenerationRequest) -> Result<String, GenerationError> {
        let api_key = self.api_key.as_deref().ok_or(GenerationError::MissingApiKey)?;
        let body = GenerateContentRequest::from(request);

        log::debug!(
            "Calling {} (structured: {}, temperature: {})",
            self.model,
            request.structured,
            request.temperature
        );

        let response = self
            .client
            .post(self.endpoint())
            .header(API_KEY_HEADER, api_key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        let text = response.text().await?;

        if !status.is_success() {
            log::warn!("Gemini request failed ({}): {}", status, text);
            return Err(GenerationError::Status {
                status: status.as_u16(),
                body: text,
            });
        }

        log::debug!("Gemini responded with {} bytes", text.len());
        Ok(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client(api_key: Option<&str>) -> GeminiClient {
        GeminiClient::new(
            api_key.map(str::to_string),
            "https://example.test/v1beta/",
            "gemini-2.0-flash",
            Duration::from_secs(5),
        )
        .unwrap()
    }

    #[test]
    fn test_endpoint_format() {
        let c = client(Some("k123"));
        assert_eq!(
            c.endpoint(),
            "https://example.test/v1beta/models/gemini-2.0-flash:generateContent"
        );
    }

    #[tokio::test]
    async fn test_transport_error_does_not_leak_key() {
        let c = GeminiClient::new(
            Some("SECRETKEY123".to_string()),
            "http://127.0.0.1:9",
            "m",
            Duration::from_secs(2),
        )
        .unwrap();
        let request = GenerationRequest {
            prompt: "x".to_string(),
            temperature: 0.2,
            structured: true,
        };

        let err = c.generate(&request).await.unwrap_err();
        assert!(matches!(err, GenerationError::Transport(_)));
        assert!(!err.to_string().contains("SECRETKEY123"), "{}", err);
    }

    #[tokio::test]
    async fn test_missing_key_fails_without_request() {
        let request = GenerationRequest {
            prompt: "x".to_string(),
            temperature: 0.2,
            structured: true,
        };

        for key in [None, Some("  ")] {
            let err = client(key).generate(&request).await.unwrap_err();
            assert!(matches!(err, GenerationError::MissingApiKey));
        }
    }

    #[test]
    fn test_from_config_uses_defaults() {
        let c = GeminiClient::from_config(&Config::default()).unwrap();
        assert_eq!(c.name(), "gemini-2.0-flash");
        assert!(c.base_url.starts_with("https://generativelanguage.googleapis.com"));
    }
}
