//! Transient download artifacts
//!
//! An artifact is a temp file owned by exactly one download request. Every
//! terminal event funnels into [`TransientArtifact::release`], a single
//! `Live -> Released` compare-and-set: the first caller removes the file and
//! records its reason, every later call is a no-op. A fallback timer releases
//! the artifact with [`ReleaseReason::Expired`] if nothing else does first.

use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use tokio::runtime::Handle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::core::config::ARTIFACT_PREFIX;
use crate::error::RelayError;

/// Why an artifact was released
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReleaseReason {
    /// The file was relayed to the client in full
    Delivered,
    /// The tool never started
    SpawnFailed,
    /// The tool exited with a failure
    ProcessFailed,
    /// Reading or relaying the file failed
    StreamFailed,
    /// The fallback timer fired
    Expired,
    /// The last handle went away (e.g. client disconnect)
    Dropped,
}

impl fmt::Display for ReleaseReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ReleaseReason::Delivered => "delivered",
            ReleaseReason::SpawnFailed => "spawn failed",
            ReleaseReason::ProcessFailed => "process failed",
            ReleaseReason::StreamFailed => "stream failed",
            ReleaseReason::Expired => "expired",
            ReleaseReason::Dropped => "dropped",
        };
        f.write_str(name)
    }
}

/// Removes an artifact from storage
pub trait ArtifactRemover: Send + Sync {
    /// Remove the artifact at `path`. A missing file is not an error.
    ///
    /// Called by the releasing caller, which may be polling a response body,
    /// so implementations must not block the runtime.
    fn remove(&self, path: &Path) -> io::Result<()>;
}

/// Removes the artifact file and companion files sharing its unique stem.
///
/// Inside a tokio runtime the filesystem work runs on the blocking pool and
/// failures are logged there; outside one it runs inline.
#[derive(Debug, Default, Clone, Copy)]
pub struct FsRemover;

impl ArtifactRemover for FsRemover {
    fn remove(&self, path: &Path) -> io::Result<()> {
        let Ok(handle) = Handle::try_current() else {
            return remove_with_companions(path);
        };

        let path = path.to_path_buf();
        handle.spawn_blocking(move || {
            if let Err(e) = remove_with_companions(&path) {
                warn!("Failed to remove artifact {}: {}", path.display(), e);
            }
        });
        Ok(())
    }
}

/// Remove `path` and every sibling named `{stem}.*`. Blocking.
pub(crate) fn remove_with_companions(path: &Path) -> io::Result<()> {
    ignore_missing(std::fs::remove_file(path))?;

    let (Some(dir), Some(stem)) = (path.parent(), path.file_stem().and_then(|s| s.to_str()))
    else {
        return Ok(());
    };

    // The tool leaves `.part` files and intermediate formats next to the target
    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(()),
        Err(e) => return Err(e),
    };
    let companion_prefix = format!("{}.", stem);
    for entry in entries.flatten() {
        if entry.file_name().to_string_lossy().starts_with(&companion_prefix) {
            ignore_missing(std::fs::remove_file(entry.path()))?;
        }
    }
    Ok(())
}

fn ignore_missing(result: io::Result<()>) -> io::Result<()> {
    match result {
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        other => other,
    }
}

struct ArtifactInner {
    path: PathBuf,
    released: AtomicBool,
    remover: Arc<dyn ArtifactRemover>,
    /// Cancelled when the fallback timer releases the artifact
    expired: CancellationToken,
    /// Cancelled on release, stops the fallback timer
    done: CancellationToken,
}

impl ArtifactInner {
    fn release(&self, reason: ReleaseReason) -> bool {
        if self
            .released
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return false;
        }
        self.done.cancel();

        if reason == ReleaseReason::Expired {
            warn!(
                "Fallback cleanup of stale artifact {}",
                self.path.display()
            );
        } else {
            info!("Releasing artifact {} ({})", self.path.display(), reason);
        }

        if let Err(e) = self.remover.remove(&self.path) {
            warn!("Failed to remove artifact {}: {}", self.path.display(), e);
        }
        true
    }
}

impl Drop for ArtifactInner {
    fn drop(&mut self) {
        self.release(ReleaseReason::Dropped);
    }
}

/// Handle to a transient artifact. Clones share the same artifact.
#[derive(Clone)]
pub struct TransientArtifact {
    inner: Arc<ArtifactInner>,
}

impl fmt::Debug for TransientArtifact {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransientArtifact")
            .field("path", &self.inner.path)
            .field("released", &self.is_released())
            .finish()
    }
}

impl TransientArtifact {
    /// Create a uniquely named artifact file in `dir` and arm its fallback timer.
    ///
    /// Must be called inside a tokio runtime.
    pub fn create(
        dir: &Path,
        suffix: &str,
        remover: Arc<dyn ArtifactRemover>,
        fallback: Duration,
    ) -> Result<Self, RelayError> {
        let file = tempfile::Builder::new()
            .prefix(ARTIFACT_PREFIX)
            .suffix(suffix)
            .tempfile_in(dir)
            .map_err(|e| RelayError::ArtifactCreation(format!("{}: {}", dir.display(), e)))?;
        let (_, path) = file
            .keep()
            .map_err(|e| RelayError::ArtifactCreation(e.to_string()))?;

        debug!("Created artifact {}", path.display());
        Ok(Self::from_path(path, remover, fallback))
    }

    /// Take ownership of an existing path and arm its fallback timer
    pub fn from_path(path: PathBuf, remover: Arc<dyn ArtifactRemover>, fallback: Duration) -> Self {
        let inner = Arc::new(ArtifactInner {
            path,
            released: AtomicBool::new(false),
            remover,
            expired: CancellationToken::new(),
            done: CancellationToken::new(),
        });
        spawn_fallback_timer(Arc::downgrade(&inner), inner.done.clone(), fallback);
        Self { inner }
    }

    /// Path of the artifact file
    pub fn path(&self) -> &Path {
        &self.inner.path
    }

    /// Release the artifact. Returns `true` only for the call that performed the release.
    pub fn release(&self, reason: ReleaseReason) -> bool {
        self.inner.release(reason)
    }

    pub fn is_released(&self) -> bool {
        self.inner.released.load(Ordering::Acquire)
    }

    /// Token cancelled when the fallback timer fires
    pub fn expired(&self) -> CancellationToken {
        self.inner.expired.clone()
    }
}

fn spawn_fallback_timer(inner: Weak<ArtifactInner>, done: CancellationToken, fallback: Duration) {
    tokio::spawn(async move {
        tokio::select! {
            _ = done.cancelled() => {}
            _ = tokio::time::sleep(fallback) => {
                if let Some(inner) = inner.upgrade() {
                    if inner.release(ReleaseReason::Expired) {
                        inner.expired.cancel();
                    }
                }
            }
        }
    });
}


#[cfg(test)]
mod tests {
    use super::testing::CountingRemover;
    use super::*;

    const LONG: Duration = Duration::from_secs(60);

    #[tokio::test]
    async fn test_create_and_release_once() {
        let dir = tempfile::tempdir().unwrap();
        let remover = Arc::new(CountingRemover::default());

        let artifact = TransientArtifact::create(dir.path(), ".mp3", remover.clone(), LONG).unwrap();
        let name = artifact.path().file_name().unwrap().to_string_lossy().to_string();
        assert!(name.starts_with(ARTIFACT_PREFIX));
        assert!(name.ends_with(".mp3"));
        assert!(artifact.path().exists());

        assert!(artifact.release(ReleaseReason::Delivered));
        assert!(!artifact.release(ReleaseReason::StreamFailed));
        assert!(!artifact.clone().release(ReleaseReason::Expired));
        assert!(artifact.is_released());
        assert!(!artifact.path().exists());

        drop(artifact);
        assert_eq!(remover.calls(), 1);
    }

    #[tokio::test]
    async fn test_drop_releases() {
        let dir = tempfile::tempdir().unwrap();
        let remover = Arc::new(CountingRemover::default());

        let artifact = TransientArtifact::create(dir.path(), ".mp4", remover.clone(), LONG).unwrap();
        let path = artifact.path().to_path_buf();
        let clone = artifact.clone();
        drop(artifact);
        assert_eq!(remover.calls(), 0);
        drop(clone);

        assert_eq!(remover.calls(), 1);
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn test_fallback_timer_expires() {
        let dir = tempfile::tempdir().unwrap();
        let remover = Arc::new(CountingRemover::default());

        let artifact = TransientArtifact::create(
            dir.path(),
            ".mp4",
            remover.clone(),
            Duration::from_millis(50),
        )
        .unwrap();
        let expired = artifact.expired();

        tokio::time::timeout(Duration::from_secs(5), expired.cancelled())
            .await
            .unwrap();
        assert!(artifact.is_released());
        assert!(!artifact.path().exists());
        assert!(!artifact.release(ReleaseReason::Delivered));

        drop(artifact);
        assert_eq!(remover.calls(), 1);
    }

    #[tokio::test]
    async fn test_release_disarms_timer() {
        let dir = tempfile::tempdir().unwrap();
        let remover = Arc::new(CountingRemover::default());

        let artifact = TransientArtifact::create(
            dir.path(),
            ".mp3",
            remover.clone(),
            Duration::from_millis(30),
        )
        .unwrap();
        assert!(artifact.release(ReleaseReason::Delivered));

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(!artifact.expired().is_cancelled());
        assert_eq!(remover.calls(), 1);
    }

    #[test]
    fn test_fs_remover_removes_companions() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("media-relay-abc123.mp3");
        let part = dir.path().join("media-relay-abc123.mp3.part");
        let intermediate = dir.path().join("media-relay-abc123.webm");
        let unrelated = dir.path().join("media-relay-abc1234.mp3");
        for path in [&target, &part, &intermediate, &unrelated] {
            std::fs::write(path, b"x").unwrap();
        }

        FsRemover.remove(&target).unwrap();

        assert!(!target.exists());
        assert!(!part.exists());
        assert!(!intermediate.exists());
        assert!(unrelated.exists());

        // Already gone is fine
        FsRemover.remove(&target).unwrap();
    }

    #[tokio::test]
    async fn test_fs_remover_runs_off_the_runtime() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("media-relay-def456.mp4");
        let part = dir.path().join("media-relay-def456.mp4.part");
        std::fs::write(&target, b"x").unwrap();
        std::fs::write(&part, b"x").unwrap();

        let artifact = TransientArtifact::from_path(target.clone(), Arc::new(FsRemover), LONG);
        assert!(artifact.release(ReleaseReason::Delivered));

        let gone = async {
            while target.exists() || part.exists() {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        };
        tokio::time::timeout(Duration::from_secs(5), gone).await.unwrap();
        assert!(!artifact.release(ReleaseReason::Dropped));
    }

    #[test]
    fn test_release_reason_display() {
        assert_eq!(ReleaseReason::Delivered.to_string(), "delivered");
        assert_eq!(ReleaseReason::Expired.to_string(), "expired");
    }
}
