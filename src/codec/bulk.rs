//! # Bulk Generation
//!
//! Encodes every element of a JSON array. The body is parsed and shape-checked
//! before any encoder runs. Items are encoded concurrently on the blocking
//! pool; the output keeps input order and every item succeeds or fails on its
//! own.
//!
//! ## Item Text
//!
//! Strings are encoded as-is. Objects, arrays, numbers, booleans and `null`
//! are encoded as their JSON text.
//!
//! ## Filenames
//!
//! - Barcodes: the first value of an object (or the string itself), first 50
//!   characters, anything outside `[a-z0-9]` replaced by `_`, lowercased.
//!   Falls back to `barcode_{n}` when that leaves nothing usable.
//! - QR codes: `qrcode_{n}_{first 20 characters, sanitized}`.
//!
//! `n` is 1-based.

use std::sync::Arc;

use futures_util::future::join_all;
use serde_json::Value;
use tracing::info;

use super::barcode::{BarcodeOptions, encode_barcode};
use super::qr::{QrOptions, encode_qr};
use super::{EncodedImage, OutputFormat};
use crate::error::{ToolkitError, ToolkitResult};

/// One input element, ready to encode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BulkItem {
    pub index: usize,
    pub text: String,
    pub filename: String,
}

#[derive(Debug)]
pub struct BulkOutcome {
    pub item: BulkItem,
    pub result: ToolkitResult<EncodedImage>,
}

impl BulkOutcome {
    pub fn is_ok(&self) -> bool {
        self.result.is_ok()
    }
}

/// How bulk filenames are derived.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Naming {
    Barcode,
    Qr,
}

/// Parse `input` as a JSON array.
pub fn parse_bulk_json(input: &str) -> ToolkitResult<Vec<Value>> {
    if input.trim().is_empty() {
        return Err(ToolkitError::invalid_json("Please enter a valid JSON array."));
    }
    let value: Value = serde_json::from_str(input)
        .map_err(|e| ToolkitError::invalid_json(format!("Failed to process JSON. {}", e)))?;
    match value {
        Value::Array(items) => Ok(items),
        _ => Err(ToolkitError::invalid_json("Input is not a JSON array.")),
    }
}

pub fn item_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Replace everything outside `[a-zA-Z0-9]` with `_` and lowercase, keeping at most `max` characters.
pub fn sanitize_stem(s: &str, max: usize) -> String {
    s.chars()
        .take(max)
        .map(|c| {
            if c.is_ascii_alphanumeric() {
                c.to_ascii_lowercase()
            } else {
                '_'
            }
        })
        .collect()
}

pub fn barcode_filename(index: usize, value: &Value) -> String {
    let source = match value {
        Value::String(s) => Some(s.clone()),
        Value::Object(map) => map.values().next().map(item_text),
        Value::Array(items) => items.first().map(item_text),
        _ => None,
    };
    let stem = source
        .map(|s| sanitize_stem(&s, 50))
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| format!("barcode_{}", index + 1));
    format!("{}.png", stem)
}

pub fn qr_filename(index: usize, text: &str) -> String {
    format!("qrcode_{}_{}.png", index + 1, sanitize_stem(text, 20))
}

/// Parse and name every item without encoding anything.
pub fn prepare_items(input: &str, naming: Naming) -> ToolkitResult<Vec<BulkItem>> {
    let values = parse_bulk_json(input)?;
    Ok(values
        .iter()
        .enumerate()
        .map(|(index, value)| {
            let text = item_text(value);
            let filename = match naming {
                Naming::Barcode => barcode_filename(index, value),
                Naming::Qr => qr_filename(index, &text),
            };
            BulkItem {
                index,
                text,
                filename,
            }
        })
        .collect())
}

/// Run `encode` over every item concurrently. Output order matches `items`.
pub async fn encode_items<F>(items: Vec<BulkItem>, encode: F) -> Vec<BulkOutcome>
where
    F: Fn(&str) -> ToolkitResult<EncodedImage> + Send + Sync + 'static,
{
    let encode = Arc::new(encode);
    let tasks = items.into_iter().map(|item| {
        let encode = Arc::clone(&encode);
        async move {
            let text = item.text.clone();
            let result = crate::run_blocking("bulk encode", move || encode(&text)).await;
            BulkOutcome { item, result }
        }
    });
    let outcomes = join_all(tasks).await;
    let failed = outcomes.iter().filter(|o| !o.is_ok()).count();
    info!(total = outcomes.len(), failed, "Bulk generation finished");
    outcomes
}

/// Parse `input`, then encode each item with `encode`. Shape errors fail the
/// whole call before `encode` is invoked.
pub async fn generate_bulk_with<F>(input: &str, naming: Naming, encode: F) -> ToolkitResult<Vec<BulkOutcome>>
where
    F: Fn(&str) -> ToolkitResult<EncodedImage> + Send + Sync + 'static,
{
    let items = prepare_items(input, naming)?;
    Ok(encode_items(items, encode).await)
}

pub async fn generate_qr_bulk(input: &str, options: &QrOptions) -> ToolkitResult<Vec<BulkOutcome>> {
    let options = options.clone();
    generate_bulk_with(input, Naming::Qr, move |text| encode_qr(text, &options, OutputFormat::Png)).await
}

pub async fn generate_barcode_bulk(
    input: &str,
    options: &BarcodeOptions,
) -> ToolkitResult<Vec<BulkOutcome>> {
    let options = options.clone();
    generate_bulk_with(input, Naming::Barcode, move |text| {
        encode_barcode(text, &options, OutputFormat::Png)
    })
    .await
}
