//! # Host Capabilities
//!
//! What the host can do, detected once at startup and passed to whoever needs
//! it. Callers branch on these flags instead of probing the host themselves.
//!
//! | Capability | Detected from |
//! |------------|---------------|
//! | Native camera | `native-camera` build feature |
//! | Share | `TOOLKIT_SHARE_DIR` names a directory to share into |
//! | Clipboard | A clipboard command (`wl-copy`, `xclip`, `xsel`, `pbcopy`, `clip.exe`) on `PATH` |

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::debug;

use crate::export::{Clipboard, CommandClipboard, DirectoryShare, ShareTarget};

pub const ENV_SHARE_DIR: &str = "TOOLKIT_SHARE_DIR";

#[derive(Debug, Clone, Default)]
pub struct Capabilities {
    pub native_camera: bool,
    pub share_dir: Option<PathBuf>,
    pub clipboard: Option<CommandClipboard>,
}

impl Capabilities {
    /// Detect from the process environment.
    pub fn detect() -> Self {
        Self::detect_with(|key| std::env::var(key).ok(), |path| path.is_file())
    }

    /// Detect using `lookup` for environment variables and `exists` for files on `PATH`.
    pub fn detect_with<L, E>(lookup: L, exists: E) -> Self
    where
        L: Fn(&str) -> Option<String>,
        E: Fn(&Path) -> bool,
    {
        let share_dir = lookup(ENV_SHARE_DIR)
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .map(PathBuf::from);

        let wayland = lookup("WAYLAND_DISPLAY").is_some_and(|v| !v.is_empty());
        let mut candidates: Vec<(&str, &[&str])> = Vec::new();
        if wayland {
            candidates.push(("wl-copy", &[][..]));
        }
        candidates.extend([
            ("xclip", &["-selection", "clipboard"][..]),
            ("xsel", &["--clipboard", "--input"][..]),
            ("pbcopy", &[][..]),
            ("clip.exe", &[][..]),
        ]);

        let path_var = lookup("PATH").unwrap_or_default();
        let on_path = |program: &str| {
            std::env::split_paths(&path_var).any(|dir| exists(&dir.join(program)))
        };
        let clipboard = candidates
            .into_iter()
            .find(|(program, _)| on_path(program))
            .map(|(program, args)| CommandClipboard::new(program, args));

        let caps = Self {
            native_camera: cfg!(feature = "native-camera"),
            share_dir,
            clipboard,
        };
        debug!(
            native_camera = caps.native_camera,
            share = caps.can_share(),
            clipboard = caps.can_copy(),
            "Detected host capabilities"
        );
        caps
    }

    pub fn can_share(&self) -> bool {
        self.share_dir.is_some()
    }

    pub fn can_copy(&self) -> bool {
        self.clipboard.is_some()
    }

    pub fn share_target(&self) -> Option<Arc<dyn ShareTarget>> {
        self.share_dir
            .as_ref()
            .map(|dir| Arc::new(DirectoryShare::new(dir.clone())) as Arc<dyn ShareTarget>)
    }

    pub fn clipboard(&self) -> Option<Arc<dyn Clipboard>> {
        self.clipboard
            .as_ref()
            .map(|c| Arc::new(c.clone()) as Arc<dyn Clipboard>)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nothing_available() {
        let caps = Capabilities::detect_with(|_| None, |_| false);
        assert!(!caps.can_share());
        assert!(!caps.can_copy());
        assert!(caps.share_target().is_none());
        assert!(caps.clipboard().is_none());
    }

    #[cfg(unix)]
    #[test]
    fn test_detects_share_dir_and_clipboard() {
        let caps = Capabilities::detect_with(
            |key| match key {
                ENV_SHARE_DIR => Some("/tmp/shared".to_string()),
                "PATH" => Some("/usr/bin:/opt/bin".to_string()),
                _ => None,
            },
            |path| path == Path::new("/opt/bin/xsel"),
        );
        assert_eq!(caps.share_dir, Some(PathBuf::from("/tmp/shared")));
        assert_eq!(caps.clipboard.as_ref().map(|c| c.program()), Some("xsel"));
    }

    #[cfg(unix)]
    #[test]
    fn test_wayland_prefers_wl_copy() {
        let caps = Capabilities::detect_with(
            |key| match key {
                "WAYLAND_DISPLAY" => Some("wayland-0".to_string()),
                "PATH" => Some("/usr/bin".to_string()),
                _ => None,
            },
            |path| path.starts_with("/usr/bin"),
        );
        assert_eq!(caps.clipboard.as_ref().map(|c| c.program()), Some("wl-copy"));
    }
}
