// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! AI naming providers
//!
//! A provider is anything that can turn optional image bytes plus context
//! text into a short name. The engine only sees [`NameProvider`]; concrete
//! clients are picked from configuration by [`build_provider`].

pub mod ollama;
pub mod openai;

use async_trait::async_trait;
use reqwest::StatusCode;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crate::config::{AiConfig, ProviderKind};

/// Why a proposal failed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// Timeouts, rate limiting, server errors: worth retrying
    Transient,
    /// Invalid or missing credentials
    Auth,
    /// Quota or billing exhausted
    Quota,
    /// Response could not be used
    Malformed,
    /// The provider cannot serve this kind of request
    Unsupported,
    /// A local strategy found nothing to propose
    NoCandidate,
}

impl FailureKind {
    pub fn is_transient(&self) -> bool {
        matches!(self, FailureKind::Transient)
    }
}

/// Failure of a single `propose` call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProposeError {
    pub kind: FailureKind,
    pub message: String,
}

impl ProposeError {
    pub fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

impl fmt::Display for ProposeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}: {}", self.kind, self.message)
    }
}

impl std::error::Error for ProposeError {}

impl From<reqwest::Error> for ProposeError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() || e.is_connect() || e.is_request() {
            ProposeError::new(FailureKind::Transient, e.to_string())
        } else if e.is_decode() {
            ProposeError::new(FailureKind::Malformed, e.to_string())
        } else if let Some(status) = e.status() {
            classify_status(status, &e.to_string())
        } else {
            ProposeError::new(FailureKind::Transient, e.to_string())
        }
    }
}

/// Image data handed to vision-capable providers
#[derive(Debug, Clone)]
pub struct ImagePayload {
    pub base64: String,
    pub mime: &'static str,
}

/// Per-call options
#[derive(Debug, Clone)]
pub struct ProposeOptions {
    /// Prompt template; `{context}` is replaced by the context text
    pub prompt: String,
    pub max_tokens: u32,
    pub temperature: f32,
}

impl ProposeOptions {
    pub fn render(&self, context: &str) -> String {
        if self.prompt.contains("{context}") {
            self.prompt.replace("{context}", context)
        } else if context.is_empty() {
            self.prompt.clone()
        } else {
            format!("{}\n\n{}", self.prompt, context)
        }
    }
}

/// Capability: propose a name for an image from its bytes and/or context
#[async_trait]
pub trait NameProvider: Send + Sync {
    /// Name of this provider, for logs
    fn name(&self) -> &'static str;

    /// Whether `propose` makes use of image bytes
    fn supports_vision(&self) -> bool;

    /// Propose a raw name. Text-only providers ignore `image`.
    async fn propose(
        &self,
        image: Option<&ImagePayload>,
        context: &str,
        options: &ProposeOptions,
    ) -> std::result::Result<String, ProposeError>;
}

/// Build the configured provider, or `None` when AI naming is unavailable
pub fn build_provider(config: &AiConfig) -> Option<Arc<dyn NameProvider>> {
    let timeout = Duration::from_secs(config.timeout_secs.max(1));
    match config.provider {
        ProviderKind::None => None,
        ProviderKind::Ollama => {
            let provider = ollama::OllamaProvider::new(
                &config.endpoint(),
                &config.vision_model(),
                &config.text_model(),
                config.supports_vision(),
                timeout,
            );
            Some(Arc::new(provider))
        }
        ProviderKind::OpenAi | ProviderKind::Ecnu => {
            let Some(api_key) = config.resolve_api_key() else {
                tracing::info!("No API key configured, AI naming disabled");
                return None;
            };
            let provider = openai::OpenAiProvider::new(
                &config.endpoint(),
                api_key,
                &config.vision_model(),
                &config.text_model(),
                config.supports_vision(),
                timeout,
            );
            Some(Arc::new(provider))
        }
    }
}

/// Map an HTTP status and body to a failure kind
pub fn classify_status(status: StatusCode, body: &str) -> ProposeError {
    let lowered = body.to_lowercase();
    let kind = if lowered.contains("insufficient_quota") || status == StatusCode::PAYMENT_REQUIRED {
        FailureKind::Quota
    } else if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
        FailureKind::Auth
    } else if status == StatusCode::TOO_MANY_REQUESTS
        || status == StatusCode::REQUEST_TIMEOUT
        || status.is_server_error()
    {
        FailureKind::Transient
    } else {
        FailureKind::Malformed
    };
    let snippet: String = body.chars().take(200).collect();
    ProposeError::new(kind, format!("status {}: {}", status, snippet))
}

/// MIME type inferred from an image extension
pub fn mime_for_extension(ext: &str) -> &'static str {
    match ext.to_ascii_lowercase().as_str() {
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "bmp" => "image/bmp",
        "webp" => "image/webp",
        "svg" => "image/svg+xml",
        _ => "image/png",
    }
}
