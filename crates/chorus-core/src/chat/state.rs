//! Per-session mutable state outside the chat data.
//!
//! Holds the chat mode, the buffered user message, playback timing for
//! interruption math, and the handle of the active generation. All of it is
//! small and updated without awaiting, so a synchronous mutex guards it.

use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

/// Ratios at or below this leave history untouched: the user heard nothing.
pub const MIN_INTERRUPTION_RATIO: f64 = 0.05;
/// Ratios at or above this leave history untouched: the user heard it all.
pub const MAX_INTERRUPTION_RATIO: f64 = 0.95;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChatMode {
    Live,
    Paused,
    Analysis,
}

#[derive(Debug, Clone, Copy)]
struct Playback {
    started: Instant,
    duration: Duration,
    /// First barge-in while the clip was playing.
    interrupted_at: Option<Instant>,
}

struct ActiveGeneration {
    abort: CancellationToken,
    done: watch::Receiver<bool>,
}

/// Held by the work unit running a generation.
///
/// Dropping the ticket signals completion to anyone waiting in
/// [`ChatSessionState::abort_generation_and_wait`], whether the unit
/// finished, failed, was cancelled, or never ran.
pub struct GenerationTicket {
    cancel: CancellationToken,
    done: watch::Sender<bool>,
}

impl GenerationTicket {
    /// Cancelled by session shutdown or by a newer generation.
    pub fn token(&self) -> &CancellationToken {
        &self.cancel
    }
}

impl Drop for GenerationTicket {
    fn drop(&mut self) {
        self.done.send_replace(true);
    }
}

struct Inner {
    mode: ChatMode,
    pending_user_message: Option<Uuid>,
    playback: Option<Playback>,
    stt_paused_for_playback: bool,
    generation: Option<ActiveGeneration>,
}

pub struct ChatSessionState {
    inner: Mutex<Inner>,
}

impl Default for ChatSessionState {
    fn default() -> Self {
        Self::new()
    }
}

impl ChatSessionState {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner {
                mode: ChatMode::Live,
                pending_user_message: None,
                playback: None,
                stt_paused_for_playback: false,
                generation: None,
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn mode(&self) -> ChatMode {
        self.lock().mode
    }

    /// Switch mode, returning the previous one.
    pub fn set_mode(&self, mode: ChatMode) -> ChatMode {
        std::mem::replace(&mut self.lock().mode, mode)
    }

    /// User message saved but not yet answered.
    pub fn pending_user_message(&self) -> Option<Uuid> {
        self.lock().pending_user_message
    }

    pub fn set_pending_user_message(&self, id: Option<Uuid>) {
        self.lock().pending_user_message = id;
    }

    pub fn start_playback(&self, duration: Duration) {
        self.lock().playback = Some(Playback {
            started: Instant::now(),
            duration,
            interrupted_at: None,
        });
    }

    /// Clear playback. Returns whether speech recognition was paused for it
    /// and should be resumed.
    pub fn complete_playback(&self) -> bool {
        let mut inner = self.lock();
        inner.playback = None;
        std::mem::take(&mut inner.stt_paused_for_playback)
    }

    /// Record that the user started speaking over the current clip.
    pub fn mark_barge_in(&self) {
        if let Some(playback) = self.lock().playback.as_mut() {
            playback.interrupted_at.get_or_insert_with(Instant::now);
        }
    }

    /// Consume the playback record and return the heard fraction of the clip.
    pub fn take_interruption_ratio(&self) -> Option<f64> {
        let playback = self.lock().playback.take()?;
        let at = playback.interrupted_at.unwrap_or_else(Instant::now);
        interruption_ratio(at.duration_since(playback.started), playback.duration)
    }

    pub fn set_stt_paused_for_playback(&self, paused: bool) {
        self.lock().stt_paused_for_playback = paused;
    }

    pub fn stt_paused_for_playback(&self) -> bool {
        self.lock().stt_paused_for_playback
    }

    /// Register a new generation under `shutdown`.
    ///
    /// The returned ticket's token is a child of `shutdown`: cancelling it
    /// aborts only this generation.
    pub fn begin_generation(&self, shutdown: &CancellationToken) -> GenerationTicket {
        let cancel = shutdown.child_token();
        let (done_tx, done_rx) = watch::channel(false);
        self.lock().generation = Some(ActiveGeneration {
            abort: cancel.clone(),
            done: done_rx,
        });
        GenerationTicket {
            cancel,
            done: done_tx,
        }
    }

    /// Cancel the active generation, if any, and wait until its work unit
    /// has released its ticket.
    pub async fn abort_generation_and_wait(&self) {
        let active = self.lock().generation.take();
        let Some(mut active) = active else {
            return;
        };
        active.abort.cancel();
        // Err means the ticket is gone, which is completion too.
        let _ = active.done.wait_for(|done| *done).await;
    }
}

/// Heard fraction of a clip. `None` without a usable duration.
pub fn interruption_ratio(elapsed: Duration, duration: Duration) -> Option<f64> {
    if duration.is_zero() {
        return None;
    }
    Some(elapsed.as_secs_f64() / duration.as_secs_f64())
}

/// Truncate an interrupted reply to what the user heard.
///
/// Returns `None` when history should be left alone: the ratio is outside
/// the open interval between the bounds, or the text is too short to cut.
/// Lengths count characters, not bytes.
pub fn truncate_for_interruption(text: &str, ratio: f64) -> Option<String> {
    if ratio <= MIN_INTERRUPTION_RATIO || ratio >= MAX_INTERRUPTION_RATIO {
        return None;
    }
    let len = text.chars().count();
    if len < 3 {
        return None;
    }
    let keep = ((len as f64 * ratio).round() as usize).clamp(1, len - 2);
    let mut truncated: String = text.chars().take(keep).collect();
    truncated.push_str("...");
    Some(truncated)
}
