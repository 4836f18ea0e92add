//! # Image Generator Client
//!
//! Talks to the proxy route, never to the upstream API directly, so the key
//! stays server side. A generation yields either a URL or inline base64 data;
//! [`ImageGenClient::download`] turns both into an [`Asset`].

use base64::{Engine as _, engine::general_purpose::STANDARD};
use bytes::Bytes;
use serde_json::{Value, json};
use tracing::info;

use crate::codec::bulk::sanitize_stem;
use crate::error::{ToolkitError, ToolkitResult};
use crate::export::{Asset, parse_data_url};
use crate::imaging::sniff_format;
use crate::proxy::GENERATE_ROUTE;

pub const NO_VALID_IMAGE: &str = "Image generation failed to return a valid image.";
pub const UNREADABLE_RESPONSE: &str = "The image service returned a response that could not be read.";

/// Where the generated pixels live.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImageSource {
    Url(String),
    Inline(Bytes),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedImage {
    pub prompt: String,
    pub source: ImageSource,
}

impl GeneratedImage {
    /// Download name: the first 50 characters of the prompt, sanitized.
    pub fn filename(&self) -> String {
        let stem = sanitize_stem(&self.prompt, 50);
        if stem.is_empty() {
            "generated-image.png".to_string()
        } else {
            format!("{}.png", stem)
        }
    }

    /// Message attached when the image is shared.
    pub fn share_text(&self) -> String {
        format!("Image generated from prompt: \"{}\"", self.prompt)
    }
}

#[derive(Debug, Clone)]
pub struct ImageGenClient {
    http: reqwest::Client,
    endpoint: String,
}

impl ImageGenClient {
    /// `proxy_base` is the proxy's origin, e.g. `http://127.0.0.1:8787`.
    pub fn new(http: reqwest::Client, proxy_base: &str) -> Self {
        Self {
            http,
            endpoint: format!("{}{}", proxy_base.trim_end_matches('/'), GENERATE_ROUTE),
        }
    }

    pub async fn generate(&self, prompt: &str) -> ToolkitResult<GeneratedImage> {
        if prompt.trim().is_empty() {
            return Err(ToolkitError::invalid_options("prompt", "Please enter a prompt."));
        }

        info!(chars = prompt.chars().count(), "Requesting image generation");
        let response = self
            .http
            .post(&self.endpoint)
            .json(&json!({ "prompt": prompt }))
            .send()
            .await
            .map_err(|e| ToolkitError::network(e.to_string()).with_operation("generate image"))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| ToolkitError::network(e.to_string()).with_operation("generate image"))?;
        let parsed = serde_json::from_str::<Value>(&text);
        if !status.is_success() {
            let message = parsed
                .as_ref()
                .ok()
                .and_then(|body| body.get("error"))
                .and_then(Value::as_str)
                .unwrap_or("An unknown error occurred.");
            return Err(ToolkitError::upstream(
                status.as_u16(),
                format!("Failed to generate image. {}", message),
            ));
        }
        let body = parsed.map_err(|e| {
            ToolkitError::decode_failed(UNREADABLE_RESPONSE)
                .with_operation("generate image")
                .with_context(e.to_string())
        })?;

        let source = extract_image(&body)?;
        Ok(GeneratedImage {
            prompt: prompt.to_string(),
            source,
        })
    }

    /// Fetch the pixels and name the result after the prompt.
    pub async fn download(&self, image: &GeneratedImage) -> ToolkitResult<Asset> {
        let bytes = match &image.source {
            ImageSource::Inline(bytes) => bytes.clone(),
            ImageSource::Url(url) if url.starts_with("data:") => Bytes::from(parse_data_url(url)?.1),
            ImageSource::Url(url) => {
                let response = self
                    .http
                    .get(url)
                    .send()
                    .await
                    .and_then(|r| r.error_for_status())?;
                response.bytes().await?
            }
        };

        let mime = sniff_format(&bytes)
            .map(|f| f.to_mime_type())
            .ok_or_else(|| ToolkitError::decode_failed(NO_VALID_IMAGE))?;
        Ok(Asset::new(image.filename(), mime, bytes))
    }
}

/// First image of an OpenAI-style `{"data": [{"url"|"b64_json": ...}]}` answer.
pub fn extract_image(body: &Value) -> ToolkitResult<ImageSource> {
    let first = body
        .get("data")
        .and_then(|d| d.get(0))
        .ok_or_else(|| ToolkitError::decode_failed(NO_VALID_IMAGE))?;

    if let Some(url) = first.get("url").and_then(Value::as_str).filter(|u| !u.is_empty()) {
        return Ok(ImageSource::Url(url.to_string()));
    }
    if let Some(b64) = first.get("b64_json").and_then(Value::as_str) {
        let bytes = STANDARD
            .decode(b64)
            .map_err(|e| ToolkitError::decode_failed(NO_VALID_IMAGE).with_context(e.to_string()))?;
        return Ok(ImageSource::Inline(Bytes::from(bytes)));
    }
    Err(ToolkitError::decode_failed(NO_VALID_IMAGE))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_prefers_url() {
        let body = json!({"data": [{"url": "https://img.example/1.png", "b64_json": "AAAA"}]});
        assert_eq!(
            extract_image(&body).unwrap(),
            ImageSource::Url("https://img.example/1.png".to_string())
        );

        let inline = json!({"data": [{"b64_json": STANDARD.encode(b"png")}]});
        assert_eq!(
            extract_image(&inline).unwrap(),
            ImageSource::Inline(Bytes::from_static(b"png"))
        );
    }

    #[test]
    fn test_extract_rejects_empty_answers() {
        for body in [json!({}), json!({"data": []}), json!({"data": [{"url": ""}]})] {
            let err = extract_image(&body).unwrap_err();
            assert_eq!(err.user_message(), NO_VALID_IMAGE);
        }
    }

    #[test]
    fn test_filename_from_prompt() {
        let image = GeneratedImage {
            prompt: "A Cat, on Mars!".to_string(),
            source: ImageSource::Inline(Bytes::new()),
        };
        assert_eq!(image.filename(), "a_cat__on_mars_.png");

        let long = GeneratedImage {
            prompt: "x".repeat(80),
            ..image.clone()
        };
        assert_eq!(long.filename().len(), 54);
    }

    #[tokio::test]
    async fn test_empty_prompt_is_rejected_before_any_request() {
        let client = ImageGenClient::new(reqwest::Client::new(), "http://127.0.0.1:9");
        let err = client.generate("   ").await.unwrap_err();
        assert_eq!(err.category(), "encode_invalid_options");
        assert_eq!(err.user_message(), "Please enter a prompt.");
    }
}
