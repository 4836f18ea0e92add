//! Encoded assets, data URLs and download names.

use std::path::{Path, PathBuf};

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use bytes::Bytes;

use crate::camera::CapturedFrame;
use crate::codec::EncodedImage;
use crate::error::{ToolkitError, ToolkitResult};

/// A named blob ready to download, share or archive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Asset {
    pub filename: String,
    pub mime: String,
    pub bytes: Bytes,
}

impl Asset {
    pub fn new(filename: impl Into<String>, mime: impl Into<String>, bytes: impl Into<Bytes>) -> Self {
        Self {
            filename: filename.into(),
            mime: mime.into(),
            bytes: bytes.into(),
        }
    }

    pub fn from_encoded(filename: impl Into<String>, image: &EncodedImage) -> Self {
        Self::new(filename, image.mime(), image.bytes.clone())
    }

    pub fn from_capture(frame: &CapturedFrame) -> Self {
        Self::new(
            timestamped_name("capture", frame.format.extension()),
            frame.format.mime(),
            frame.bytes.clone(),
        )
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn to_data_url(&self) -> String {
        data_url(&self.mime, &self.bytes)
    }

    /// Write into `dir` under the asset's own name. Returns the full path.
    pub async fn save_to(&self, dir: &Path) -> ToolkitResult<PathBuf> {
        let path = dir.join(&self.filename);
        tokio::fs::write(&path, &self.bytes)
            .await
            .map_err(|e| ToolkitError::io("save asset", e).with_context(path.display().to_string()))?;
        Ok(path)
    }
}

pub fn data_url(mime: &str, bytes: &[u8]) -> String {
    format!("data:{};base64,{}", mime, STANDARD.encode(bytes))
}

/// Split a base64 data URL into its MIME type and payload.
pub fn parse_data_url(url: &str) -> ToolkitResult<(String, Vec<u8>)> {
    let invalid = || ToolkitError::decode_failed("Not a valid base64 data URL.");
    let rest = url.strip_prefix("data:").ok_or_else(invalid)?;
    let (meta, payload) = rest.split_once(',').ok_or_else(invalid)?;
    let mime = meta.strip_suffix(";base64").ok_or_else(invalid)?;
    let bytes = STANDARD
        .decode(payload.trim())
        .map_err(|e| invalid().with_context(e.to_string()))?;
    let mime = if mime.is_empty() { "text/plain" } else { mime };
    Ok((mime.to_string(), bytes))
}

/// `{prefix}-{unix millis}.{ext}`.
pub fn timestamped_name(prefix: &str, extension: &str) -> String {
    format!("{}-{}.{}", prefix, chrono::Utc::now().timestamp_millis(), extension)
}

/// Keep a name safe to use as a single path component.
pub fn sanitize_filename(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();
    let trimmed = cleaned.trim().trim_start_matches('.');
    if trimmed.is_empty() {
        "file".to_string()
    } else {
        trimmed.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_data_url_parse() {
        let url = data_url("image/png", &[1, 2, 3]);
        assert_eq!(url, "data:image/png;base64,AQID");
        let (mime, bytes) = parse_data_url(&url).unwrap();
        assert_eq!(mime, "image/png");
        assert_eq!(bytes, vec![1, 2, 3]);
        assert!(parse_data_url("https://example.com/a.png").is_err());
        assert!(parse_data_url("data:image/png,raw").is_err());
    }

    #[test]
    fn test_timestamped_name() {
        let name = timestamped_name("capture", "png");
        let millis = name
            .strip_prefix("capture-")
            .and_then(|s| s.strip_suffix(".png"))
            .unwrap();
        assert!(millis.parse::<i64>().unwrap() > 0);
    }

    #[test]
    fn test_sanitize_filename() {
        assert_eq!(sanitize_filename("../etc/passwd"), "_etc_passwd");
        assert_eq!(sanitize_filename("a:b?.png"), "a_b_.png");
        assert_eq!(sanitize_filename("   "), "file");
    }

    #[tokio::test]
    async fn test_save_to() {
        let dir = tempfile::tempdir().unwrap();
        let asset = Asset::new("out.txt", "text/plain", &b"hi"[..]);
        let path = asset.save_to(dir.path()).await.unwrap();
        assert_eq!(std::fs::read(path).unwrap(), b"hi");
    }
}
