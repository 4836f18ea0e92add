//! Zip archives for bulk downloads.

use std::collections::HashSet;
use std::io::{Cursor, Write};

use bytes::Bytes;
use tracing::debug;
use zip::CompressionMethod;
use zip::write::{SimpleFileOptions, ZipWriter};

use super::asset::{Asset, sanitize_filename, timestamped_name};
use crate::error::ToolkitResult;

/// Pack `assets` into a zip. Names are sanitized; duplicates get a ` (n)` suffix.
pub fn build_zip(assets: &[Asset]) -> ToolkitResult<Bytes> {
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
    let mut used = HashSet::new();

    for asset in assets {
        let name = unique_name(&sanitize_filename(&asset.filename), &mut used);
        writer.start_file(name.as_str(), options)?;
        writer.write_all(&asset.bytes)?;
    }

    let cursor = writer.finish()?;
    let bytes = cursor.into_inner();
    debug!(entries = assets.len(), bytes = bytes.len(), "Archive built");
    Ok(Bytes::from(bytes))
}

/// Build a zip named `{prefix}-{unix millis}.zip`.
pub fn archive_asset(prefix: &str, assets: &[Asset]) -> ToolkitResult<Asset> {
    Ok(Asset::new(
        timestamped_name(prefix, "zip"),
        "application/zip",
        build_zip(assets)?,
    ))
}

fn unique_name(name: &str, used: &mut HashSet<String>) -> String {
    if used.insert(name.to_string()) {
        return name.to_string();
    }
    let (stem, ext) = match name.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() => (stem, Some(ext)),
        _ => (name, None),
    };
    let mut n = 2;
    loop {
        let candidate = match ext {
            Some(ext) => format!("{} ({}).{}", stem, n, ext),
            None => format!("{} ({})", stem, n),
        };
        if used.insert(candidate.clone()) {
            return candidate;
        }
        n += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;

    #[test]
    fn test_duplicate_names_are_suffixed() {
        let assets = vec![
            Asset::new("a.png", "image/png", &b"one"[..]),
            Asset::new("a.png", "image/png", &b"two"[..]),
            Asset::new("b", "image/png", &b"three"[..]),
        ];
        let zip = build_zip(&assets).unwrap();

        let mut archive = zip::ZipArchive::new(Cursor::new(zip.to_vec())).unwrap();
        assert_eq!(archive.len(), 3);
        let mut second = String::new();
        archive
            .by_name("a (2).png")
            .unwrap()
            .read_to_string(&mut second)
            .unwrap();
        assert_eq!(second, "two");
        assert!(archive.by_name("b").is_ok());
    }

    #[test]
    fn test_archive_asset_name() {
        let asset = archive_asset("qrcodes", &[]).unwrap();
        assert!(asset.filename.starts_with("qrcodes-"));
        assert!(asset.filename.ends_with(".zip"));
        assert_eq!(asset.mime, "application/zip");
    }
}
