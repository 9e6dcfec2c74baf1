//! Audio output backends

use crate::session::AudioClip;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;
use thiserror::Error;
use tokio::process::Command;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Error)]
pub enum PlaybackError {
    #[error("Player command is empty")]
    InvalidCommand,
    #[error("Audio I/O failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("Player failed: {0}")]
    Player(String),
}

/// Plays one clip to completion, or until `cancel` fires.
///
/// Cancellation is a normal end of stream and returns `Ok`.
#[async_trait]
pub trait AudioOutput: Send + Sync + 'static {
    async fn play(&self, clip: AudioClip, cancel: CancellationToken) -> Result<(), PlaybackError>;
}

#[async_trait]
impl<T: AudioOutput + ?Sized> AudioOutput for Arc<T> {
    async fn play(&self, clip: AudioClip, cancel: CancellationToken) -> Result<(), PlaybackError> {
        (**self).play(clip, cancel).await
    }
}

/// Plays WAV clips through an external command such as `aplay -q`.
///
/// The clip is written to a temporary file whose path is appended to the
/// command line; the file is removed once the command exits.
pub struct CommandPlayer {
    program: String,
    args: Vec<String>,
    scratch_dir: PathBuf,
}

impl CommandPlayer {
    pub fn new(command: &str) -> Result<Self, PlaybackError> {
        let mut parts = command.split_whitespace().map(str::to_string);
        let program = parts.next().ok_or(PlaybackError::InvalidCommand)?;
        Ok(Self {
            program,
            args: parts.collect(),
            scratch_dir: std::env::temp_dir(),
        })
    }

    #[cfg(test)]
    fn with_scratch_dir(mut self, dir: &Path) -> Self {
        self.scratch_dir = dir.to_path_buf();
        self
    }

    async fn run(&self, path: &Path, cancel: &CancellationToken) -> Result<(), PlaybackError> {
        let mut child = Command::new(&self.program)
            .args(&self.args)
            .arg(path)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()?;

        tokio::select! {
            () = cancel.cancelled() => {
                if let Err(e) = child.kill().await {
                    tracing::debug!(error = %e, "Player already exited");
                }
                Ok(())
            }
            status = child.wait() => {
                let status = status?;
                if status.success() {
                    Ok(())
                } else {
                    Err(PlaybackError::Player(format!("{} exited with {status}", self.program)))
                }
            }
        }
    }
}

#[async_trait]
impl AudioOutput for CommandPlayer {
    async fn play(&self, clip: AudioClip, cancel: CancellationToken) -> Result<(), PlaybackError> {
        let path = self
            .scratch_dir
            .join(format!("talkback-{}.wav", uuid::Uuid::new_v4()));
        tokio::fs::write(&path, clip.as_bytes()).await?;

        let result = self.run(&path, &cancel).await;

        if let Err(e) = tokio::fs::remove_file(&path).await {
            tracing::warn!(
                path = %path.display(),
                error = %e,
                "Failed to remove audio scratch file"
            );
        }
        result
    }
}
