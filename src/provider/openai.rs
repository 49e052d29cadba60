// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! OpenAI-compatible chat completions client
//!
//! Serves both the OpenAI API and compatible endpoints such as ECNU's.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::time::Duration;
use tracing::debug;

use super::{classify_status, FailureKind, ImagePayload, NameProvider, ProposeError, ProposeOptions};

pub struct OpenAiProvider {
    client: Client,
    base_url: String,
    api_key: String,
    vision_model: String,
    text_model: String,
    vision: bool,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<serde_json::Value>,
    max_tokens: u32,
    temperature: f32,
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: Message,
}

#[derive(Deserialize)]
struct Message {
    #[serde(default)]
    content: Option<String>,
}

impl OpenAiProvider {
    pub fn new(
        base_url: &str,
        api_key: String,
        vision_model: &str,
        text_model: &str,
        vision: bool,
        timeout: Duration,
    ) -> Self {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_else(|_| Client::new());

        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
            vision_model: vision_model.to_string(),
            text_model: text_model.to_string(),
            vision,
        }
    }

    fn build_request<'a>(
        &'a self,
        image: Option<&ImagePayload>,
        prompt: String,
        options: &ProposeOptions,
    ) -> ChatRequest<'a> {
        let (model, content) = match image {
            Some(img) => (
                &self.vision_model,
                json!([
                    { "type": "text", "text": prompt },
                    {
                        "type": "image_url",
                        "image_url": { "url": format!("data:{};base64,{}", img.mime, img.base64) }
                    }
                ]),
            ),
            None => (&self.text_model, json!(prompt)),
        };

        ChatRequest {
            model,
            messages: vec![json!({ "role": "user", "content": content })],
            max_tokens: options.max_tokens,
            temperature: options.temperature,
        }
    }
}

#[async_trait]
impl NameProvider for OpenAiProvider {
    fn name(&self) -> &'static str {
        "openai"
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
        let image = image.filter(|_| self.vision);
        let request = self.build_request(image, options.render(context), options);

        debug!("Sending chat completion: model={} vision={}", request.model, image.is_some());

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(classify_status(status, &body));
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| ProposeError::new(FailureKind::Malformed, e.to_string()))?;

        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .map(|c| c.trim().to_string())
            .filter(|c| !c.is_empty())
            .ok_or_else(|| ProposeError::new(FailureKind::Malformed, "response has no content"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn provider(vision: bool) -> OpenAiProvider {
        OpenAiProvider::new(
            "https://api.example.com/v1/",
            "key".to_string(),
            "vision-model",
            "text-model",
            vision,
            Duration::from_secs(5),
        )
    }

    fn options() -> ProposeOptions {
        ProposeOptions {
            prompt: "{context}".to_string(),
            max_tokens: 50,
            temperature: 0.3,
        }
    }

    #[test]
    fn test_vision_request_carries_data_url() {
        let p = provider(true);
        let image = ImagePayload { base64: "AAAA".to_string(), mime: "image/png" };
        let request = p.build_request(Some(&image), "describe".to_string(), &options());

        assert_eq!(request.model, "vision-model");
        let json = serde_json::to_value(&request).unwrap();
        let url = json["messages"][0]["content"][1]["image_url"]["url"].as_str().unwrap();
        assert_eq!(url, "data:image/png;base64,AAAA");
    }

    #[test]
    fn test_text_request_uses_text_model() {
        let p = provider(false);
        let request = p.build_request(None, "context words".to_string(), &options());
        assert_eq!(request.model, "text-model");

        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["messages"][0]["content"], "context words");
        assert_eq!(p.base_url, "https://api.example.com/v1");
    }
}
