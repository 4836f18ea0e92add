//! Delivery of assets and text to the host: share targets and the clipboard.
//!
//! Both are traits so callers only see them when [`crate::capability::Capabilities`]
//! reports them available.

use std::path::{Path, PathBuf};
use std::process::Stdio;

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::{debug, info};

use super::asset::{Asset, sanitize_filename};
use crate::error::{ToolkitError, ToolkitResult};

/// Title and message attached to a share.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SharePayload {
    pub title: String,
    pub text: String,
}

#[async_trait]
pub trait ShareTarget: Send + Sync {
    fn name(&self) -> &str;

    /// Hand `asset` to the target. Returns where it ended up.
    async fn share(&self, asset: &Asset, payload: &SharePayload) -> ToolkitResult<String>;
}

#[async_trait]
pub trait Clipboard: Send + Sync {
    async fn write_text(&self, text: &str) -> ToolkitResult<()>;
}

/// Shares by dropping the asset, plus a `.txt` note with the message, into a directory.
#[derive(Debug, Clone)]
pub struct DirectoryShare {
    dir: PathBuf,
}

impl DirectoryShare {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

#[async_trait]
impl ShareTarget for DirectoryShare {
    fn name(&self) -> &str {
        "directory"
    }

    async fn share(&self, asset: &Asset, payload: &SharePayload) -> ToolkitResult<String> {
        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(|e| ToolkitError::io("create share directory", e))?;

        let asset = Asset {
            filename: sanitize_filename(&asset.filename),
            ..asset.clone()
        };
        let path = asset.save_to(&self.dir).await?;
        let note = path.with_extension(format!(
            "{}.txt",
            path.extension().and_then(|e| e.to_str()).unwrap_or("asset")
        ));
        tokio::fs::write(&note, format!("{}\n{}\n", payload.title, payload.text))
            .await
            .map_err(|e| ToolkitError::io("write share note", e))?;

        info!(path = %path.display(), "Shared asset");
        Ok(path.display().to_string())
    }
}

/// Clipboard backed by a command that reads the text on stdin (`wl-copy`, `pbcopy`, ...).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandClipboard {
    program: String,
    args: Vec<String>,
}

impl CommandClipboard {
    pub fn new(program: impl Into<String>, args: &[&str]) -> Self {
        Self {
            program: program.into(),
            args: args.iter().map(|a| a.to_string()).collect(),
        }
    }

    pub fn program(&self) -> &str {
        &self.program
    }
}

#[async_trait]
impl Clipboard for CommandClipboard {
    async fn write_text(&self, text: &str) -> ToolkitResult<()> {
        let mut child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| ToolkitError::io("start clipboard command", e).with_context(self.program.clone()))?;

        let written = match child.stdin.take() {
            Some(mut stdin) => stdin.write_all(text.as_bytes()).await,
            None => Ok(()),
        };
        if let Err(e) = &written {
            // The command stopped reading. Reap it so it does not linger.
            debug!(program = %self.program, error = %e, "Clipboard command closed its input");
            let _ = child.start_kill();
        }

        let status = child
            .wait()
            .await
            .map_err(|e| ToolkitError::io("wait for clipboard command", e))?;
        if !status.success() {
            return Err(ToolkitError::unsupported_feature("Clipboard")
                .with_context(format!("{} exited with {}", self.program, status)));
        }
        written.map_err(|e| ToolkitError::io("write clipboard", e))?;
        Ok(())
    }
}
