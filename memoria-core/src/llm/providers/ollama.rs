//! Ollama model service (local, free, runs on your machine).
//!
//! Uses the raw completion endpoint (`/api/generate` with `raw: true`) so the
//! prompt builder's template reaches the model untouched.

use async_trait::async_trait;
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::io::AsyncBufReadExt;
use tokio_stream::wrappers::LinesStream;
use tracing::{debug, warn};

use crate::config::MemoriaConfig;
use crate::error::{MemoriaError, Result};
use crate::llm::retry::{RetryConfig, with_retry};
use crate::llm::{FragmentStream, ModelInfo, ModelService, StreamEvent};

/// Default Ollama endpoint
pub const DEFAULT_BASE_URL: &str = "http://localhost:11434";

/// Ollama model service.
pub struct OllamaService {
    client: reqwest::Client,
    model: String,
    base_url: String,
    temperature: Option<f32>,
    request_timeout: Duration,
    retry: RetryConfig,
}

impl OllamaService {
    /// Create a new Ollama service.
    ///
    /// # Arguments
    ///
    /// * `model` - Model name as known to Ollama (e.g., "llama2:13b")
    /// * `base_url` - Base URL for the Ollama API (defaults to "http://localhost:11434")
    pub fn new(model: impl Into<String>, base_url: Option<impl Into<String>>) -> Self {
        Self {
            client: reqwest::Client::new(),
            model: model.into(),
            base_url: base_url
                .map(|u| u.into())
                .unwrap_or_else(|| DEFAULT_BASE_URL.to_string())
                .trim_end_matches('/')
                .to_string(),
            temperature: None,
            request_timeout: Duration::from_secs(120),
            retry: RetryConfig::default(),
        }
    }

    /// Create from the client configuration.
    ///
    /// The model name sent to Ollama is `llm.model_name`, falling back to the
    /// configured prompt model id.
    pub fn from_config(config: &MemoriaConfig) -> Self {
        let model = config
            .llm
            .model_name
            .clone()
            .unwrap_or_else(|| config.model.clone());

        let mut service = Self::new(model, Some(config.llm.base_url.clone()));
        service.temperature = config.llm.temperature;
        service.request_timeout = config.llm.request_timeout;
        service
    }

    /// Builder: replace the retry policy for synchronous requests
    pub fn with_retry_config(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// Get the model name.
    pub fn model(&self) -> &str {
        &self.model
    }

    /// Get the base URL.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn generate_url(&self) -> String {
        format!("{}/api/generate", self.base_url)
    }

    fn build_request<'a>(&'a self, prompt: &'a str, stream: bool) -> GenerateRequest<'a> {
        GenerateRequest {
            model: &self.model,
            prompt,
            raw: true,
            stream,
            options: self.temperature.map(|temperature| GenerateOptions {
                temperature: Some(temperature),
            }),
        }
    }

    async fn request_once(
        &self,
        prompt: &str,
    ) -> std::result::Result<String, backoff::Error<MemoriaError>> {
        let response = self
            .client
            .post(self.generate_url())
            .timeout(self.request_timeout)
            .json(&self.build_request(prompt, false))
            .send()
            .await
            .map_err(|e| {
                let err = MemoriaError::Transport(format!(
                    "Failed to send request to Ollama: {}. Make sure Ollama is running.",
                    e
                ));
                if e.is_connect() || e.is_timeout() {
                    backoff::Error::transient(err)
                } else {
                    backoff::Error::permanent(err)
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            let err = MemoriaError::Transport(format!("Ollama API error ({}): {}", status, text));
            return Err(if self.retry.is_retryable_status(status.as_u16()) {
                backoff::Error::transient(err)
            } else {
                backoff::Error::permanent(err)
            });
        }

        let body: GenerateResponse = response.json().await.map_err(|e| {
            backoff::Error::permanent(MemoriaError::Transport(format!(
                "Failed to parse Ollama response: {}",
                e
            )))
        })?;

        Ok(body.response.trim().to_string())
    }
}

#[derive(Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    raw: bool,
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    options: Option<GenerateOptions>,
}

#[derive(Serialize)]
struct GenerateOptions {
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
}

#[derive(Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    response: String,
    #[serde(default)]
    done: bool,
    #[serde(default)]
    error: Option<String>,
}

/// Map one NDJSON line of a streamed `/api/generate` body to stream events.
///
/// A line carrying both text and `done: true` yields the text first.
fn parse_stream_line(line: &str) -> Vec<Result<StreamEvent>> {
    let line = line.trim();
    if line.is_empty() {
        return Vec::new();
    }

    let chunk: GenerateResponse = match serde_json::from_str(line) {
        Ok(chunk) => chunk,
        Err(e) => {
            return vec![Err(MemoriaError::Transport(format!(
                "Failed to parse stream chunk: {}",
                e
            )))];
        }
    };

    if let Some(error) = chunk.error {
        return vec![Err(MemoriaError::Transport(format!(
            "Ollama stream error: {}",
            error
        )))];
    }

    let mut events = Vec::new();
    if !chunk.response.is_empty() {
        events.push(Ok(StreamEvent::Fragment(chunk.response)));
    }
    if chunk.done {
        events.push(Ok(StreamEvent::End));
    }
    events
}

#[async_trait]
impl ModelService for OllamaService {
    async fn request(&self, prompt: &str) -> String {
        match with_retry(&self.retry, || self.request_once(prompt)).await {
            Ok(text) => text,
            Err(e) => {
                warn!(error = %e, model = %self.model, "Summarization request failed");
                String::new()
            }
        }
    }

    async fn stream(&self, prompt: &str) -> Result<FragmentStream> {
        debug!(model = %self.model, prompt_len = prompt.len(), "Dispatching streamed completion");

        let response = self
            .client
            .post(self.generate_url())
            .json(&self.build_request(prompt, true))
            .send()
            .await
            .map_err(|e| {
                MemoriaError::Transport(format!(
                    "Failed to send request to Ollama: {}. Make sure Ollama is running.",
                    e
                ))
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(MemoriaError::Transport(format!(
                "Ollama API error ({}): {}",
                status, text
            )));
        }

        // Convert response bytes to a stream of lines
        let bytes_stream = response.bytes_stream();
        let reader = tokio_util::io::StreamReader::new(
            bytes_stream.map(|r| r.map_err(std::io::Error::other)),
        );
        let lines = LinesStream::new(tokio::io::BufReader::new(reader).lines());

        let events = lines
            .map(|line| match line {
                Ok(line) => parse_stream_line(&line),
                Err(e) => vec![Err(MemoriaError::Transport(format!(
                    "Stream read error: {}",
                    e
                )))],
            })
            .flat_map(futures::stream::iter);

        Ok(Box::pin(events))
    }

    fn model_info(&self) -> ModelInfo {
        ModelInfo {
            provider: "ollama".to_string(),
            model_name: self.model.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ollama_service_creation() {
        let service = OllamaService::new("llama2", None::<String>);
        assert_eq!(service.model(), "llama2");
        assert_eq!(service.base_url(), DEFAULT_BASE_URL);

        let service = OllamaService::new("zephyr", Some("http://gpu-box:11434/"));
        assert_eq!(service.base_url(), "http://gpu-box:11434");
    }

    #[test]
    fn test_from_config_model_fallback() {
        let mut config = MemoriaConfig::default();
        config.model = "mistral".to_string();
        assert_eq!(OllamaService::from_config(&config).model(), "mistral");

        config.llm.model_name = Some("mistral:7b-instruct".to_string());
        assert_eq!(OllamaService::from_config(&config).model(), "mistral:7b-instruct");
    }

    #[test]
    fn test_request_body() {
        let service = OllamaService::new("llama2", None::<String>);
        let body = serde_json::to_value(service.build_request("[INST] hi [/INST]", true)).unwrap();
        assert_eq!(body["model"], "llama2");
        assert_eq!(body["prompt"], "[INST] hi [/INST]");
        assert_eq!(body["raw"], true);
        assert_eq!(body["stream"], true);
        assert!(body.get("options").is_none());
    }

    #[test]
    fn test_parse_stream_lines() {
        let events = parse_stream_line(r#"{"model":"llama2","response":"Hel","done":false}"#);
        assert_eq!(events.len(), 1);
        assert_eq!(
            events[0].as_ref().unwrap(),
            &StreamEvent::Fragment("Hel".to_string())
        );

        let events = parse_stream_line(r#"{"model":"llama2","response":"","done":true}"#);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].as_ref().unwrap(), &StreamEvent::End);

        let events = parse_stream_line(r#"{"response":"!","done":true}"#);
        assert_eq!(events.len(), 2);

        assert!(parse_stream_line("   ").is_empty());
        assert!(parse_stream_line("not json")[0].is_err());
        assert!(parse_stream_line(r#"{"error":"model not found"}"#)[0].is_err());
    }

    #[tokio::test]
    async fn test_request_against_unreachable_host_is_empty() {
        // Port 9 (discard) on localhost refuses connections
        let service = OllamaService::new("llama2", Some("http://127.0.0.1:9"))
            .with_retry_config(RetryConfig::no_retry());
        assert_eq!(service.request("hello").await, "");
    }
}
