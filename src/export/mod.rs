//! # Export
//!
//! Everything that leaves the toolkit: named assets and data URLs, object URLs
//! with explicit revocation, zip archives for bulk results, and share and
//! clipboard delivery.

pub mod archive;
pub mod asset;
pub mod object_url;
pub mod share;

pub use archive::{archive_asset, build_zip};
pub use asset::{Asset, data_url, parse_data_url, timestamped_name};
pub use object_url::ObjectUrlRegistry;
pub use share::{Clipboard, CommandClipboard, DirectoryShare, SharePayload, ShareTarget};
