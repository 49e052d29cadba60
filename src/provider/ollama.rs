// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Ollama API client for local AI naming

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

use super::{classify_status, FailureKind, ImagePayload, NameProvider, ProposeError, ProposeOptions};

/// Ollama API client
pub struct OllamaProvider {
    client: Client,
    base_url: String,
    vision_model: String,
    text_model: String,
    vision: bool,
}

#[derive(Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: String,
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    images: Option<Vec<&'a str>>,
    options: GenerateOptions,
}

#[derive(Serialize)]
struct GenerateOptions {
    temperature: f32,
    num_predict: u32,
}

#[derive(Deserialize)]
struct GenerateResponse {
    response: String,
}

impl OllamaProvider {
    /// Create a new Ollama client
    pub fn new(
        base_url: &str,
        vision_model: &str,
        text_model: &str,
        vision: bool,
        timeout: Duration,
    ) -> Self {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_else(|_| Client::new());

        // Normalize URL
        let base_url = base_url
            .trim_end_matches('/')
            .replace("/api/generate", "")
            .replace("/api/chat", "");

        Self {
            client,
            base_url,
            vision_model: vision_model.to_string(),
            text_model: text_model.to_string(),
            vision,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

#[async_trait]
impl NameProvider for OllamaProvider {
    fn name(&self) -> &'static str {
        "ollama"
    }

    fn supports_vision(&self) -> bool {
        self.vision
    }

    async fn propose(
        &self,
        image: Option<&ImagePayload>,
        context: &str,
        options: &ProposeOptions,
    ) -> Result<String, ProposeError> {
        let url = format!("{}/api/generate", self.base_url);

        let image = image.filter(|_| self.vision);
        let model = if image.is_some() { &self.vision_model } else { &self.text_model };
        let request = GenerateRequest {
            model,
            prompt: options.render(context),
            stream: false,
            images: image.map(|img| vec![img.base64.as_str()]),
            options: GenerateOptions {
                temperature: options.temperature,
                num_predict: options.max_tokens,
            },
        };

        debug!("Sending request to Ollama: model={} vision={}", model, image.is_some());

        let response = self.client.post(&url).json(&request).send().await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(classify_status(status, &body));
        }

        let result: GenerateResponse = response
            .json()
            .await
            .map_err(|e| ProposeError::new(FailureKind::Malformed, e.to_string()))?;
        let text = result.response.trim().to_string();
        if text.is_empty() {
            return Err(ProposeError::new(FailureKind::Malformed, "empty response"));
        }
        Ok(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_url_is_normalized() {
        let provider = OllamaProvider::new(
            "http://localhost:11434/api/generate/",
            "moondream",
            "llama3.2:3b",
            true,
            Duration::from_secs(5),
        );
        assert_eq!(provider.base_url(), "http://localhost:11434");
        assert!(provider.supports_vision());
    }

    #[test]
    fn test_request_serialization_omits_images() {
        let request = GenerateRequest {
            model: "llama3.2:3b",
            prompt: "p".to_string(),
            stream: false,
            images: None,
            options: GenerateOptions { temperature: 0.3, num_predict: 20 },
        };
        let json = serde_json::to_value(&request).unwrap();
        assert!(json.get("images").is_none());
        assert_eq!(json["options"]["num_predict"], 20);
    }
}
