// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! AI-backed naming strategies

use async_trait::async_trait;
use base64::{engine::general_purpose, Engine as _};
use image::GenericImageView;
use std::path::Path;
use std::sync::Arc;
use tracing::debug;

use super::{NamingRequest, NamingStrategy, Proposal};
use crate::config::{AppConfig, StrategyKind};
use crate::provider::{mime_for_extension, FailureKind, ImagePayload, NameProvider, ProposeError, ProposeOptions};

/// Sends the image itself to a vision-capable model
pub struct AiVisionStrategy {
    provider: Arc<dyn NameProvider>,
    options: ProposeOptions,
    max_size: u64,
    max_dimension: u32,
}

impl AiVisionStrategy {
    pub fn new(provider: Arc<dyn NameProvider>, config: &AppConfig) -> Self {
        Self {
            provider,
            options: ProposeOptions {
                prompt: config.prompts.vision.clone(),
                max_tokens: config.ai.max_tokens,
                temperature: config.ai.temperature,
            },
            max_size: config.image.max_size_bytes(),
            max_dimension: config.image.max_dimension.max(1),
        }
    }
}

#[async_trait]
impl NamingStrategy for AiVisionStrategy {
    fn kind(&self) -> StrategyKind {
        StrategyKind::AiVision
    }

    fn is_applicable(&self, request: &NamingRequest) -> bool {
        self.provider.supports_vision()
            && request.size <= self.max_size
            && !request.extension.eq_ignore_ascii_case("svg")
    }

    async fn propose(&self, request: &NamingRequest) -> Result<Proposal, ProposeError> {
        let path = request.image_path.clone();
        let extension = request.extension.clone();
        let max_dimension = self.max_dimension;

        let payload = tokio::task::spawn_blocking(move || prepare_image(&path, &extension, max_dimension))
            .await
            .map_err(|e| ProposeError::new(FailureKind::Unsupported, e.to_string()))??;

        let name = self
            .provider
            .propose(Some(&payload), &request.context, &self.options)
            .await?;

        Ok(Proposal {
            name,
            rationale: format!("{} vision model", self.provider.name()),
        })
    }
}

/// Sends only the context text to a text model
pub struct AiTextStrategy {
    provider: Arc<dyn NameProvider>,
    options: ProposeOptions,
}

impl AiTextStrategy {
    pub fn new(provider: Arc<dyn NameProvider>, config: &AppConfig) -> Self {
        Self {
            provider,
            options: ProposeOptions {
                prompt: config.prompts.text.clone(),
                max_tokens: config.ai.max_tokens,
                temperature: config.ai.temperature,
            },
        }
    }
}

#[async_trait]
impl NamingStrategy for AiTextStrategy {
    fn kind(&self) -> StrategyKind {
        StrategyKind::AiText
    }

    fn is_applicable(&self, request: &NamingRequest) -> bool {
        request.has_context_text()
    }

    async fn propose(&self, request: &NamingRequest) -> Result<Proposal, ProposeError> {
        let name = self.provider.propose(None, &request.context, &self.options).await?;
        Ok(Proposal {
            name,
            rationale: format!("{} text model from note context", self.provider.name()),
        })
    }
}

/// Load an image for upload, downscaling rasters larger than
/// `max_dimension` on their longest side and re-encoding them as JPEG.
fn prepare_image(path: &Path, extension: &str, max_dimension: u32) -> Result<ImagePayload, ProposeError> {
    let data = std::fs::read(path).map_err(|e| unsupported(path, e))?;

    if let Ok(img) = image::load_from_memory(&data) {
        let (width, height) = img.dimensions();
        if width > max_dimension || height > max_dimension {
            debug!("Downscaling {:?} from {}x{}", path, width, height);
            let resized = img.resize(max_dimension, max_dimension, image::imageops::FilterType::Triangle);
            let rgb = image::DynamicImage::ImageRgb8(resized.to_rgb8());

            let mut buffer = Vec::new();
            let mut cursor = std::io::Cursor::new(&mut buffer);
            rgb.write_to(&mut cursor, image::ImageFormat::Jpeg)
                .map_err(|e| unsupported(path, e))?;

            return Ok(ImagePayload {
                base64: general_purpose::STANDARD.encode(&buffer),
                mime: "image/jpeg",
            });
        }
    }

    Ok(ImagePayload {
        base64: general_purpose::STANDARD.encode(&data),
        mime: mime_for_extension(extension),
    })
}

fn unsupported(path: &Path, e: impl std::fmt::Display) -> ProposeError {
    ProposeError::new(FailureKind::Unsupported, format!("{}: {}", path.display(), e))
}
