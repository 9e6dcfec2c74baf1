//! Playback controller: at most one stream at a time

use super::AudioOutput;
use crate::runtime::Notice;
use crate::session::AudioClip;
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;

/// What to play and which message it belongs to
#[derive(Debug, Clone)]
pub struct PlaybackSource {
    pub chat_id: String,
    pub message_id: String,
    pub clip: AudioClip,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum PlaybackState {
    Idle,
    Playing {
        stream_id: u64,
        chat_id: String,
        message_id: String,
    },
}

struct ActiveStream {
    id: u64,
    chat_id: String,
    message_id: String,
    cancel: CancellationToken,
}

#[derive(Default)]
struct Slot {
    active: Option<ActiveStream>,
    /// Cancelled once the most recently started stream has released the output
    last_done: Option<CancellationToken>,
}

struct Inner<O> {
    output: O,
    current: Mutex<Slot>,
    next_id: AtomicU64,
    notices: broadcast::Sender<Notice>,
}

impl<O> Inner<O> {
    fn lock(&self) -> std::sync::MutexGuard<'_, Slot> {
        // The guarded value is replaced wholesale, so a poisoned lock is still consistent
        self.current.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn notify(&self, notice: Notice) {
        // No subscribers is fine
        let _ = self.notices.send(notice);
    }
}

/// Handle to the single playback slot. Clones share the slot.
pub struct PlaybackController<O> {
    inner: Arc<Inner<O>>,
}

impl<O> Clone for PlaybackController<O> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<O: AudioOutput> PlaybackController<O> {
    pub fn new(output: O, notices: broadcast::Sender<Notice>) -> Self {
        Self {
            inner: Arc::new(Inner {
                output,
                current: Mutex::new(Slot::default()),
                next_id: AtomicU64::new(1),
                notices,
            }),
        }
    }

    /// Stop whatever is playing and start `source`. Returns the new stream id.
    ///
    /// The new stream only reaches the output once the previous one has
    /// released it.
    pub fn play(&self, source: PlaybackSource) -> u64 {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        let cancel = CancellationToken::new();
        let done = CancellationToken::new();
        let previous_done = {
            let mut slot = self.inner.lock();
            if let Some(previous) = slot.active.take() {
                tracing::debug!(stream_id = previous.id, "Stopping previous stream");
                previous.cancel.cancel();
            }
            slot.active = Some(ActiveStream {
                id,
                chat_id: source.chat_id.clone(),
                message_id: source.message_id.clone(),
                cancel: cancel.clone(),
            });
            slot.last_done.replace(done.clone())
        };

        tracing::info!(
            stream_id = id,
            chat_id = %source.chat_id,
            message_id = %source.message_id,
            bytes = source.clip.len(),
            "Playback started"
        );
        self.inner.notify(Notice::PlaybackStarted {
            stream_id: id,
            chat_id: source.chat_id,
            message_id: source.message_id,
        });

        let inner = Arc::clone(&self.inner);
        tokio::spawn(async move {
            let _done = done.drop_guard();
            if let Some(previous) = previous_done {
                previous.cancelled().await;
            }
            // Superseded or stopped while waiting for the output
            if cancel.is_cancelled() {
                return;
            }
            let result = inner.output.play(source.clip, cancel).await;
            Self::finish(&inner, id, result);
        });
        id
    }

    /// Stream end or stream error; only the current stream moves the slot to idle
    fn finish(inner: &Inner<O>, id: u64, result: Result<(), super::PlaybackError>) {
        let was_current = {
            let mut slot = inner.lock();
            if slot.active.as_ref().is_some_and(|s| s.id == id) {
                slot.active = None;
                true
            } else {
                false
            }
        };
        if !was_current {
            return;
        }

        match result {
            Ok(()) => {
                tracing::debug!(stream_id = id, "Playback finished");
                inner.notify(Notice::PlaybackFinished { stream_id: id });
            }
            Err(e) => {
                tracing::warn!(stream_id = id, error = %e, "Playback failed");
                inner.notify(Notice::PlaybackFailed {
                    stream_id: id,
                    error: e.to_string(),
                });
            }
        }
    }

    /// Stop the active stream. Returns `false` if nothing was playing.
    pub fn stop(&self) -> bool {
        let Some(stream) = self.inner.lock().active.take() else {
            return false;
        };
        stream.cancel.cancel();
        tracing::info!(stream_id = stream.id, "Playback stopped");
        self.inner
            .notify(Notice::PlaybackFinished { stream_id: stream.id });
        true
    }

    pub fn state(&self) -> PlaybackState {
        match self.inner.lock().active.as_ref() {
            Some(stream) => PlaybackState::Playing {
                stream_id: stream.id,
                chat_id: stream.chat_id.clone(),
                message_id: stream.message_id.clone(),
            },
            None => PlaybackState::Idle,
        }
    }
}
