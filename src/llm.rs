//! Generative text backend.
//!
//! Both services treat the model as a black-box text-completion function
//! behind [`TextGenerator`]. The production implementation talks to the
//! Gemini `generateContent` REST endpoint.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;

use crate::config::LlmSettings;
use crate::errors::LlmError;

/// Abstraction over text completion for testability.
/// Real implementation: `GeminiClient`. Test double: `fakes::ScriptedGenerator`.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn complete(&self, prompt: &str) -> Result<String, LlmError>;
}

#[derive(Debug, Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<Content>,
}

#[derive(Debug, Deserialize)]
struct Content {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Deserialize)]
struct Part {
    text: Option<String>,
}

impl GenerateContentResponse {
    /// Concatenated text of the first candidate.
    fn into_text(self) -> Option<String> {
        let content = self.candidates.into_iter().next()?.content?;
        let text: String = content.parts.into_iter().filter_map(|p| p.text).collect();
        if text.trim().is_empty() {
            None
        } else {
            Some(text)
        }
    }
}

pub struct GeminiClient {
    http: reqwest::Client,
    api_url: String,
    model: String,
    api_key: Option<String>,
}

impl GeminiClient {
    pub fn new(settings: &LlmSettings) -> Result<Self, LlmError> {
        let http = reqwest::Client::builder()
            .timeout(settings.request_timeout)
            .build()
            .map_err(LlmError::Transport)?;
        Ok(Self {
            http,
            api_url: settings.api_url.trim_end_matches('/').to_string(),
            model: settings.model.clone(),
            api_key: settings.api_key.clone(),
        })
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/v1beta/models/{}:generateContent",
            self.api_url, self.model
        )
    }
}

#[async_trait]
impl TextGenerator for GeminiClient {
    async fn complete(&self, prompt: &str) -> Result<String, LlmError> {
        let api_key = self.api_key.as_deref().ok_or(LlmError::NotConfigured)?;
        let body = json!({
            "contents": [{ "parts": [{ "text": prompt }] }]
        });

        let resp = self
            .http
            .post(self.endpoint())
            .header("x-goog-api-key", api_key)
            .json(&body)
            .send()
            .await
            .map_err(LlmError::Transport)?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(LlmError::Status {
                status: status.as_u16(),
                body: body.chars().take(500).collect(),
            });
        }

        let parsed: GenerateContentResponse = resp.json().await.map_err(LlmError::Transport)?;
        parsed.into_text().ok_or(LlmError::EmptyResponse)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GeneratorMode;
    use std::time::Duration;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn settings(api_url: &str, api_key: Option<&str>) -> LlmSettings {
        LlmSettings {
            api_url: api_url.to_string(),
            model: "gemini-2.0-flash".to_string(),
            api_key: api_key.map(str::to_string),
            mode: GeneratorMode::Model,
            request_timeout: Duration::from_secs(5),
        }
    }

    #[tokio::test]
    async fn test_complete_returns_candidate_text() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1beta/models/gemini-2.0-flash:generateContent"))
            .and(header("x-goog-api-key", "test-key"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "candidates": [{
                    "content": { "parts": [{ "text": "Hello " }, { "text": "world" }] }
                }]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = GeminiClient::new(&settings(&server.uri(), Some("test-key"))).unwrap();
        let text = client.complete("say hello").await.unwrap();
        assert_eq!(text, "Hello world");
    }

    #[tokio::test]
    async fn test_complete_maps_error_status() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(503).set_body_string("overloaded"))
            .mount(&server)
            .await;

        let client = GeminiClient::new(&settings(&server.uri(), Some("k"))).unwrap();
        match client.complete("x").await {
            Err(LlmError::Status { status, body }) => {
                assert_eq!(status, 503);
                assert_eq!(body, "overloaded");
            }
            other => panic!("Expected Status error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_complete_empty_candidates() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "candidates": [] })))
            .mount(&server)
            .await;

        let client = GeminiClient::new(&settings(&server.uri(), Some("k"))).unwrap();
        assert!(matches!(
            client.complete("x").await,
            Err(LlmError::EmptyResponse)
        ));
    }

    #[tokio::test]
    async fn test_complete_without_key_is_not_configured() {
        let client = GeminiClient::new(&settings("http://127.0.0.1:9", None)).unwrap();
        assert!(matches!(
            client.complete("x").await,
            Err(LlmError::NotConfigured)
        ));
    }

    #[tokio::test]
    async fn test_stalled_backend_times_out_as_transport_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({ "candidates": [] }))
                    .set_delay(Duration::from_secs(30)),
            )
            .mount(&server)
            .await;

        let mut settings = settings(&server.uri(), Some("k"));
        settings.request_timeout = Duration::from_millis(100);
        let client = GeminiClient::new(&settings).unwrap();

        let result = tokio::time::timeout(Duration::from_secs(10), client.complete("x"))
            .await
            .expect("client timeout should fire before the outer guard");
        match result {
            Err(LlmError::Transport(e)) => assert!(e.is_timeout()),
            other => panic!("Expected Transport timeout, got {:?}", other),
        }
    }

    #[test]
    fn test_trailing_slash_trimmed_from_endpoint() {
        let client = GeminiClient::new(&settings("https://example.test/", Some("k"))).unwrap();
        assert_eq!(
            client.endpoint(),
            "https://example.test/v1beta/models/gemini-2.0-flash:generateContent"
        );
    }
}
