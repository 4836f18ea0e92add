//! Process-local URLs for in-memory assets.
//!
//! A registry owns every URL it issued. URLs are released explicitly with
//! [`ObjectUrlRegistry::revoke`], implicitly by [`ObjectUrlRegistry::replace`],
//! and all at once when the registry is dropped.

use std::collections::HashMap;

use tracing::debug;
use uuid::Uuid;

use super::asset::Asset;

const SCHEME: &str = "blob:media-toolkit/";

#[derive(Debug, Default)]
pub struct ObjectUrlRegistry {
    entries: HashMap<String, Asset>,
}

impl ObjectUrlRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn create(&mut self, asset: Asset) -> String {
        let url = format!("{}{}", SCHEME, Uuid::new_v4());
        debug!(%url, filename = %asset.filename, bytes = asset.len(), "Object URL created");
        self.entries.insert(url.clone(), asset);
        url
    }

    pub fn resolve(&self, url: &str) -> Option<&Asset> {
        self.entries.get(url)
    }

    /// Returns false when `url` was not live.
    pub fn revoke(&mut self, url: &str) -> bool {
        let removed = self.entries.remove(url).is_some();
        if removed {
            debug!(%url, "Object URL revoked");
        }
        removed
    }

    /// Revoke `previous` (if any) and issue a URL for `asset`.
    pub fn replace(&mut self, previous: Option<&str>, asset: Asset) -> String {
        if let Some(prev) = previous {
            self.revoke(prev);
        }
        self.create(asset)
    }

    pub fn revoke_all(&mut self) {
        if !self.entries.is_empty() {
            debug!(count = self.entries.len(), "Revoking all object URLs");
            self.entries.clear();
        }
    }

    pub fn live_count(&self) -> usize {
        self.entries.len()
    }
}

impl Drop for ObjectUrlRegistry {
    fn drop(&mut self) {
        self.revoke_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn asset(name: &str) -> Asset {
        Asset::new(name, "image/png", vec![0u8; 4])
    }

    #[test]
    fn test_create_resolve_revoke() {
        let mut registry = ObjectUrlRegistry::new();
        let url = registry.create(asset("a.png"));
        assert!(url.starts_with("blob:media-toolkit/"));
        assert_eq!(registry.resolve(&url).unwrap().filename, "a.png");
        assert!(registry.revoke(&url));
        assert!(!registry.revoke(&url));
        assert!(registry.resolve(&url).is_none());
    }

    #[test]
    fn test_replace_revokes_previous() {
        let mut registry = ObjectUrlRegistry::new();
        let first = registry.create(asset("a.png"));
        let second = registry.replace(Some(&first), asset("b.png"));
        assert_ne!(first, second);
        assert_eq!(registry.live_count(), 1);
        assert!(registry.resolve(&first).is_none());
    }
}
