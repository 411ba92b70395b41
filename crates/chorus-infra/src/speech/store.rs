//! Local speech clip storage under `{data_dir}/speech`.
//!
//! One-off clips are deleted by a single janitor task after a configurable
//! delay. Deadlines live in a `DashMap`; the janitor sleeps until the
//! earliest one and is woken through a `Notify` whenever an earlier deadline
//! is registered.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use futures_util::FutureExt;
use futures_util::future::BoxFuture;
use tokio::sync::Notify;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use chorus_core::speech::SpeechFileStore;
use chorus_types::error::SpeechError;

/// Route prefix under which local clips are served.
pub const LOCAL_SPEECH_ROUTE: &str = "/speech/local";

pub struct LocalSpeechFileStore {
    dir: PathBuf,
    url_prefix: String,
    janitor: Arc<Janitor>,
}

struct Janitor {
    dir: PathBuf,
    delay: Duration,
    deadlines: DashMap<String, Instant>,
    wake: Notify,
}

impl LocalSpeechFileStore {
    /// Create the speech directory and spawn the deletion janitor.
    ///
    /// The janitor exits when `shutdown` is cancelled; pending deletions are
    /// abandoned at that point.
    pub async fn open(
        dir: impl Into<PathBuf>,
        public_base_url: &str,
        deletion_delay: Duration,
        shutdown: CancellationToken,
    ) -> Result<Self, SpeechError> {
        let dir = dir.into();
        tokio::fs::create_dir_all(&dir).await?;

        let janitor = Arc::new(Janitor {
            dir: dir.clone(),
            delay: deletion_delay,
            deadlines: DashMap::new(),
            wake: Notify::new(),
        });
        tokio::spawn(Arc::clone(&janitor).run(shutdown));

        info!(dir = %dir.display(), delay_secs = deletion_delay.as_secs(), "speech file store ready");
        Ok(Self {
            dir,
            url_prefix: format!("{}{}", public_base_url.trim_end_matches('/'), LOCAL_SPEECH_ROUTE),
            janitor,
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of a stored clip, or `None` for names that could escape the
    /// speech directory.
    pub fn path_for(&self, file: &str) -> Option<PathBuf> {
        is_safe_file_name(file).then(|| self.dir.join(file))
    }

    /// Read a stored clip for serving.
    pub async fn read(&self, file: &str) -> Result<Vec<u8>, SpeechError> {
        let path = self
            .path_for(file)
            .ok_or_else(|| SpeechError::NotFound(file.to_string()))?;
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(SpeechError::NotFound(file.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Number of clips waiting for deletion.
    pub fn scheduled_deletions(&self) -> usize {
        self.janitor.deadlines.len()
    }
}

impl SpeechFileStore for LocalSpeechFileStore {
    fn exists<'a>(&'a self, file: &'a str) -> BoxFuture<'a, bool> {
        async move {
            match self.path_for(file) {
                Some(path) => tokio::fs::try_exists(path).await.unwrap_or(false),
                None => false,
            }
        }
        .boxed()
    }

    fn write<'a>(&'a self, file: &'a str, audio: Vec<u8>) -> BoxFuture<'a, Result<(), SpeechError>> {
        async move {
            let path = self
                .path_for(file)
                .ok_or_else(|| SpeechError::NotFound(file.to_string()))?;
            // Write then rename so readers never see a partial clip.
            let partial = self.dir.join(format!("{file}.part"));
            tokio::fs::write(&partial, &audio).await?;
            tokio::fs::rename(&partial, &path).await?;
            debug!(file, bytes = audio.len(), "speech clip written");
            Ok(())
        }
        .boxed()
    }

    fn url_for(&self, file: &str) -> String {
        format!("{}/{}", self.url_prefix, file)
    }

    fn schedule_deletion(&self, file: &str) {
        self.janitor.schedule(file);
    }

    fn retain(&self, file: &str) {
        if self.janitor.deadlines.remove(file).is_some() {
            debug!(file, "speech clip deletion cancelled");
        }
    }
}

impl Janitor {
    fn schedule(&self, file: &str) {
        let deadline = Instant::now() + self.delay;
        let earliest = self.deadlines.iter().map(|entry| *entry.value()).min();
        self.deadlines.insert(file.to_string(), deadline);
        if earliest.is_none_or(|earliest| deadline < earliest) {
            self.wake.notify_one();
        }
    }

    async fn run(self: Arc<Self>, shutdown: CancellationToken) {
        loop {
            let next = self.deadlines.iter().map(|entry| *entry.value()).min();
            match next {
                Some(deadline) => {
                    tokio::select! {
                        biased;
                        _ = shutdown.cancelled() => break,
                        _ = self.wake.notified() => continue,
                        _ = tokio::time::sleep_until(deadline) => self.purge_expired().await,
                    }
                }
                None => {
                    tokio::select! {
                        biased;
                        _ = shutdown.cancelled() => break,
                        _ = self.wake.notified() => continue,
                    }
                }
            }
        }
        debug!(pending = self.deadlines.len(), "speech janitor stopped");
    }

    async fn purge_expired(&self) {
        let now = Instant::now();
        let expired: Vec<String> = self
            .deadlines
            .iter()
            .filter(|entry| *entry.value() <= now)
            .map(|entry| entry.key().clone())
            .collect();

        for file in expired {
            // A clip re-scheduled since the scan keeps its newer deadline.
            if self.deadlines.remove_if(&file, |_, deadline| *deadline <= now).is_none() {
                continue;
            }
            match tokio::fs::remove_file(self.dir.join(&file)).await {
                Ok(()) => debug!(%file, "speech clip deleted"),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => warn!(%file, error = %e, "could not delete speech clip"),
            }
        }
    }
}

fn is_safe_file_name(file: &str) -> bool {
    !file.is_empty()
        && !file.starts_with('.')
        && file
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_'))
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn open_store(delay: Duration) -> (tempfile::TempDir, LocalSpeechFileStore, CancellationToken) {
        let tmp = tempfile::tempdir().unwrap();
        let shutdown = CancellationToken::new();
        let store = LocalSpeechFileStore::open(
            tmp.path().join("speech"),
            "http://localhost:5151/",
            delay,
            shutdown.clone(),
        )
        .await
        .unwrap();
        (tmp, store, shutdown)
    }

    #[tokio::test]
    async fn test_write_then_exists_and_read() {
        let (_tmp, store, shutdown) = open_store(Duration::from_secs(60)).await;

        assert!(!store.exists("a.wav").await);
        store.write("a.wav", vec![1, 2, 3]).await.unwrap();
        assert!(store.exists("a.wav").await);
        assert_eq!(store.read("a.wav").await.unwrap(), vec![1, 2, 3]);
        assert!(!store.dir().join("a.wav.part").exists());
        assert_eq!(store.url_for("a.wav"), "http://localhost:5151/speech/local/a.wav");

        shutdown.cancel();
    }

    #[tokio::test]
    async fn test_unsafe_names_are_rejected() {
        let (_tmp, store, shutdown) = open_store(Duration::from_secs(60)).await;

        assert!(store.path_for("../config.toml").is_none());
        assert!(store.path_for("a/b.wav").is_none());
        assert!(store.path_for(".hidden").is_none());
        assert!(store.write("../x.wav", vec![0]).await.is_err());
        assert!(matches!(store.read("missing.wav").await, Err(SpeechError::NotFound(_))));

        shutdown.cancel();
    }

    #[tokio::test]
    async fn test_scheduled_clip_is_deleted_after_delay() {
        let (_tmp, store, shutdown) = open_store(Duration::from_millis(50)).await;
        store.write("once.wav", vec![9]).await.unwrap();
        store.schedule_deletion("once.wav");
        assert_eq!(store.scheduled_deletions(), 1);

        let deadline = std::time::Instant::now() + Duration::from_secs(5);
        while store.exists("once.wav").await {
            assert!(std::time::Instant::now() < deadline, "clip was never deleted");
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        assert_eq!(store.scheduled_deletions(), 0);

        shutdown.cancel();
    }

    #[tokio::test]
    async fn test_retained_clip_survives() {
        let (_tmp, store, shutdown) = open_store(Duration::from_millis(30)).await;
        store.write("keep.wav", vec![1]).await.unwrap();
        store.schedule_deletion("keep.wav");
        store.retain("keep.wav");

        tokio::time::sleep(Duration::from_millis(150)).await;
        assert!(store.exists("keep.wav").await);

        shutdown.cancel();
    }
}
