//! Ollama Local LLM Provider
//!
//! Text-completion provider for locally-running Ollama models.
//! Returns Completion with token usage metrics reported by the server.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use super::{
    Completion, DecodingOptions, ProviderConfig, ResponseMetadata, ResponseTiming, TextCompletion,
    TokenUsage,
};
use crate::types::{LoreError, Result};

const DEFAULT_API_BASE: &str = "http://localhost:11434";
const DEFAULT_MODEL: &str = "llama3.1:8b-instruct-q8_0";

/// Ollama Local LLM Provider
pub struct OllamaProvider {
    api_base: String,
    model: String,
    client: reqwest::Client,
}

impl OllamaProvider {
    pub fn new(config: ProviderConfig) -> Result<Self> {
        let api_base = config
            .api_base
            .unwrap_or_else(|| DEFAULT_API_BASE.to_string());

        // Validate endpoint URL for security (SSRF prevention)
        let api_base = Self::validate_endpoint(&api_base)?;

        let model = config.model.unwrap_or_else(|| DEFAULT_MODEL.to_string());

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| LoreError::LlmApi(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            api_base,
            model,
            client,
        })
    }

    /// Validate endpoint URL for security (SSRF prevention)
    ///
    /// Only allows http/https schemes and warns for non-localhost endpoints.
    fn validate_endpoint(endpoint: &str) -> Result<String> {
        let url = url::Url::parse(endpoint).map_err(|e| {
            LoreError::Config(format!("Bad Ollama endpoint '{}': {}", endpoint, e))
        })?;

        if !matches!(url.scheme(), "http" | "https") {
            return Err(LoreError::Config(format!(
                "Ollama endpoint scheme must be http or https, got '{}'",
                url.scheme()
            )));
        }

        if let Some(host) = url.host_str()
            && !matches!(host, "localhost" | "127.0.0.1" | "::1")
        {
            warn!("Ollama endpoint {} is not local; make sure that is intended", host);
        }

        // Remove trailing slash for consistency
        let mut result = url.to_string();
        if result.ends_with('/') {
            result.pop();
        }
        Ok(result)
    }

    fn build_request(&self, prompt: &str, options: &DecodingOptions) -> OllamaRequest {
        OllamaRequest {
            model: self.model.clone(),
            prompt: prompt.to_string(),
            stream: false,
            options: OllamaOptions {
                num_predict: options.max_tokens,
                temperature: options.temperature,
                top_p: options.top_p,
                seed: options.seed,
            },
        }
    }
}

#[async_trait]
impl TextCompletion for OllamaProvider {
    async fn complete(&self, prompt: &str, options: &DecodingOptions) -> Result<Completion> {
        debug!(
            "Generating with Ollama (model: {}, max_tokens: {})",
            self.model, options.max_tokens
        );

        let start_time = Instant::now();
        let request = self.build_request(prompt, options);
        let url = format!("{}/api/generate", self.api_base);

        let response = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                if e.is_connect() {
                    LoreError::LlmApi(format!(
                        "Cannot connect to Ollama at {} (start it with: ollama serve)",
                        self.api_base
                    ))
                } else {
                    LoreError::LlmApi(format!("Ollama request failed: {}", e))
                }
            })?;

        let elapsed = start_time.elapsed();

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(LoreError::LlmApi(format!(
                "Ollama returned {}: {}",
                status, body
            )));
        }

        let response_body: OllamaResponse = response
            .json()
            .await
            .map_err(|e| LoreError::LlmApi(format!("Failed to parse Ollama response: {}", e)))?;

        // Ollama returns token counts in response
        let usage = TokenUsage::from_ollama(
            response_body.prompt_eval_count.unwrap_or(0),
            response_body.eval_count.unwrap_or(0),
        );

        Ok(Completion::with_metrics(
            response_body.response,
            usage,
            ResponseTiming::from_duration(elapsed),
            ResponseMetadata {
                model: self.model.clone(),
                provider: "ollama".to_string(),
            },
        ))
    }

    fn name(&self) -> &str {
        "ollama"
    }

    fn model(&self) -> &str {
        &self.model
    }

    async fn health_check(&self) -> Result<bool> {
        let url = format!("{}/api/tags", self.api_base);

        let response = match self.client.get(&url).send().await {
            Ok(resp) if resp.status().is_success() => resp,
            Ok(resp) => {
                warn!("Ollama health check returned {}", resp.status());
                return Ok(false);
            }
            Err(e) => {
                warn!("Ollama unreachable: {} (start it with: ollama serve)", e);
                return Ok(false);
            }
        };

        // A reachable server without the configured model still fails the
        // check: every completion call would 404.
        let Ok(tags) = response.json::<OllamaTagsResponse>().await else {
            info!("Ollama reachable at {}", self.api_base);
            return Ok(true);
        };

        let base_name = self.model.replace(":latest", "");
        let model_available = tags
            .models
            .iter()
            .any(|m| m.name == self.model || m.name.starts_with(&base_name));

        if model_available {
            info!("Ollama reachable, model '{}' present", self.model);
        } else {
            warn!(
                "Model '{}' missing on Ollama server (pull it with: ollama pull {})",
                self.model, self.model
            );
        }
        Ok(model_available)
    }
}

// Request/Response types

#[derive(Debug, Serialize)]
struct OllamaRequest {
    model: String,
    prompt: String,
    stream: bool,
    options: OllamaOptions,
}

#[derive(Debug, Serialize)]
struct OllamaOptions {
    num_predict: u32,
    temperature: f32,
    top_p: f32,
    seed: u64,
}

#[derive(Debug, Deserialize)]
struct OllamaResponse {
    response: String,
    #[serde(default)]
    prompt_eval_count: Option<u32>,
    #[serde(default)]
    eval_count: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct OllamaTagsResponse {
    models: Vec<OllamaModel>,
}

#[derive(Debug, Deserialize)]
struct OllamaModel {
    name: String,
}
