//! Download coordination: artifact acquisition, tool spawn, and relay

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use futures::stream::{self, StreamExt};
use tokio_util::io::ReaderStream;
use tracing::{info, warn};

use crate::core::config::RelayConfig;
use crate::core::media_info::{DownloadKind, DownloadRequest};
use crate::download::artifact::{ArtifactRemover, FsRemover, ReleaseReason, TransientArtifact};
use crate::download::process::{StdoutMode, ToolProcess};
use crate::download::relay::{pipe_body, ArtifactBody, RelayResponse};
use crate::error::RelayError;
use crate::platform::ytdlp::YtDlp;
use crate::utils::attachment_disposition;

/// Runs downloads through the extraction tool
#[derive(Clone)]
pub struct DownloadCoordinator {
    ytdlp: YtDlp,
    temp_dir: PathBuf,
    fallback_cleanup: Duration,
    remover: Arc<dyn ArtifactRemover>,
}

impl DownloadCoordinator {
    /// Create a coordinator writing artifacts into `temp_dir`
    pub fn new(ytdlp: YtDlp, temp_dir: impl Into<PathBuf>, fallback_cleanup: Duration) -> Self {
        Self {
            ytdlp,
            temp_dir: temp_dir.into(),
            fallback_cleanup,
            remover: Arc::new(FsRemover),
        }
    }

    /// Create a coordinator from service configuration
    pub fn from_config(config: &RelayConfig) -> Self {
        Self::new(
            YtDlp::from_config(config),
            config.temp_dir.clone(),
            config.fallback_cleanup,
        )
    }

    /// Replace the artifact remover
    pub fn with_remover(mut self, remover: Arc<dyn ArtifactRemover>) -> Self {
        self.remover = remover;
        self
    }

    /// Run a download. Errors are returned before any header is committed.
    pub async fn download(&self, request: &DownloadRequest) -> Result<RelayResponse, RelayError> {
        info!(
            "Starting {:?} download of {} as {}",
            request.kind, request.url, request.filename
        );
        match request.kind {
            DownloadKind::Audio => {
                self.via_artifact(request, false, |path| {
                    self.ytdlp.audio_args(&request.url, path)
                })
                .await
            }
            DownloadKind::GenericMedia => {
                self.via_artifact(request, true, |path| {
                    self.ytdlp
                        .media_args(&request.url, &request.format_id, path)
                })
                .await
            }
            DownloadKind::Video { height } => self.via_pipe(request, height).await,
        }
    }

    /// Download into a transient artifact, then relay the finished file.
    ///
    /// `strict` treats an `ERROR:` line on stderr as failure even on exit code 0.
    async fn via_artifact<F>(
        &self,
        request: &DownloadRequest,
        strict: bool,
        build_args: F,
    ) -> Result<RelayResponse, RelayError>
    where
        F: FnOnce(&Path) -> Vec<String>,
    {
        let suffix = format!(".{}", request.kind.extension());
        let artifact = TransientArtifact::create(
            &self.temp_dir,
            &suffix,
            self.remover.clone(),
            self.fallback_cleanup,
        )?;

        let args = build_args(artifact.path());
        let mut process = match ToolProcess::spawn(
            self.ytdlp.command(&args),
            &self.ytdlp.program_name(),
            StdoutMode::Discard,
        ) {
            Ok(process) => process,
            Err(e) => {
                artifact.release(ReleaseReason::SpawnFailed);
                return Err(e);
            }
        };

        let expired = artifact.expired();
        let waited = tokio::select! {
            outcome = process.wait() => Some(outcome),
            _ = expired.cancelled() => None,
        };
        let Some(outcome) = waited else {
            warn!("Killing {} after the artifact expired", self.ytdlp.program_name());
            process.kill().await;
            return Err(RelayError::Timeout(format!(
                "no result within {}",
                humantime::format_duration(self.fallback_cleanup)
            )));
        };

        if let Err(e) = outcome.and_then(|outcome| outcome.into_result(strict)) {
            warn!("Download of {} failed: {}", request.url, e);
            artifact.release(ReleaseReason::ProcessFailed);
            return Err(e);
        }

        let opened = async {
            let file = tokio::fs::File::open(artifact.path()).await?;
            let length = file.metadata().await?.len();
            Ok::<_, std::io::Error>((file, length))
        };
        let (file, length) = match opened.await {
            Ok(opened) => opened,
            Err(e) => {
                warn!("Cannot open finished artifact {}: {}", artifact.path().display(), e);
                artifact.release(ReleaseReason::StreamFailed);
                return Err(RelayError::Stream(e.to_string()));
            }
        };

        info!("Relaying {} bytes for {}", length, request.filename);
        Ok(RelayResponse {
            content_type: request.kind.content_type(),
            disposition: attachment_disposition(&request.filename, request.kind.extension()),
            content_length: Some(length),
            body: ArtifactBody::new(file, artifact).boxed(),
        })
    }

    /// Relay the tool's stdout directly. Headers wait for the first chunk so
    /// an early failure can still be reported as an error status.
    async fn via_pipe(
        &self,
        request: &DownloadRequest,
        height: u32,
    ) -> Result<RelayResponse, RelayError> {
        let args = self.ytdlp.video_args(&request.url, height);
        let mut process = ToolProcess::spawn(
            self.ytdlp.command(&args),
            &self.ytdlp.program_name(),
            StdoutMode::Piped,
        )?;
        let stdout = process
            .take_stdout()
            .ok_or_else(|| RelayError::Stream("tool stdout was not captured".to_string()))?;
        let mut reader = ReaderStream::new(stdout);

        let body = match reader.next().await {
            Some(Ok(first)) => pipe_body(first, reader, process),
            Some(Err(e)) => {
                process.kill().await;
                return Err(RelayError::Stream(e.to_string()));
            }
            None => {
                process.wait().await?.into_result(false)?;
                stream::empty::<std::io::Result<Bytes>>().boxed()
            }
        };

        Ok(RelayResponse {
            content_type: request.kind.content_type(),
            disposition: attachment_disposition(&request.filename, request.kind.extension()),
            content_length: None,
            body,
        })
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::core::config::ToolCommand;
    use crate::download::artifact::testing::CountingRemover;

    /// Stand-in tool: writes to the `-o` target, or to stdout for `-o -`
    const WRITE_OUTPUT: &str = r#"
out=""; prev=""
for a in "$@"; do
  if [ "$prev" = "-o" ]; then out="$a"; fi
  prev="$a"
done
if [ "$out" = "-" ]; then printf 'video-bytes'; else printf 'media-bytes' > "$out"; fi
"#;

    struct Harness {
        dir: tempfile::TempDir,
        remover: Arc<CountingRemover>,
        coordinator: DownloadCoordinator,
    }

    fn harness_with(tool: ToolCommand, fallback: Duration) -> Harness {
        let dir = tempfile::tempdir().unwrap();
        let remover = Arc::new(CountingRemover::default());
        let coordinator = DownloadCoordinator::new(YtDlp::new(tool, "ffmpeg"), dir.path(), fallback)
            .with_remover(remover.clone());
        Harness {
            dir,
            remover,
            coordinator,
        }
    }

    fn harness(script: &str) -> Harness {
        let tool = ToolCommand::new("sh").with_prefix_args(["-c", script, "yt-dlp"]);
        harness_with(tool, Duration::from_secs(60))
    }

    impl Harness {
        fn leftover_files(&self) -> usize {
            std::fs::read_dir(self.dir.path()).unwrap().count()
        }
    }

    fn request(kind: DownloadKind) -> DownloadRequest {
        DownloadRequest {
            url: "https://www.youtube.com/watch?v=dQw4w9WgXcQ".to_string(),
            format_id: "best".to_string(),
            kind,
            filename: "My Video".to_string(),
        }
    }

    async fn collect(response: RelayResponse) -> std::io::Result<Vec<u8>> {
        let mut body = response.body;
        let mut bytes = Vec::new();
        while let Some(chunk) = body.next().await {
            bytes.extend_from_slice(&chunk?);
        }
        Ok(bytes)
    }

    #[tokio::test]
    async fn test_audio_success_releases_once() {
        let h = harness(WRITE_OUTPUT);
        let response = h.coordinator.download(&request(DownloadKind::Audio)).await.unwrap();

        assert_eq!(response.content_type, "audio/mpeg");
        assert_eq!(response.disposition, "attachment; filename=\"My Video.mp3\"");
        assert_eq!(response.content_length, Some(11));
        assert_eq!(h.remover.calls(), 0);

        assert_eq!(collect(response).await.unwrap(), b"media-bytes");
        assert_eq!(h.remover.calls(), 1);
        assert_eq!(h.leftover_files(), 0);
    }

    #[tokio::test]
    async fn test_non_zero_exit_releases_once() {
        let h = harness("echo 'ERROR: Video unavailable' >&2; exit 1");
        let err = h
            .coordinator
            .download(&request(DownloadKind::Audio))
            .await
            .unwrap_err();

        match err {
            RelayError::ProcessExecution { code, detail } => {
                assert_eq!(code, Some(1));
                assert_eq!(detail, "ERROR: Video unavailable");
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(h.remover.calls(), 1);
        assert_eq!(h.leftover_files(), 0);
    }

    #[tokio::test]
    async fn test_spawn_failure_releases_once() {
        let h = harness_with(ToolCommand::new("/nonexistent/yt-dlp"), Duration::from_secs(60));
        let err = h
            .coordinator
            .download(&request(DownloadKind::GenericMedia))
            .await
            .unwrap_err();

        assert!(matches!(err, RelayError::ProcessSpawn { .. }));
        assert_eq!(h.remover.calls(), 1);
        assert_eq!(h.leftover_files(), 0);
    }

    #[tokio::test]
    async fn test_forced_timeout_releases_once() {
        let tool = ToolCommand::new("sh").with_prefix_args(["-c", "exec sleep 30", "yt-dlp"]);
        let h = harness_with(tool, Duration::from_millis(100));

        let err = tokio::time::timeout(
            Duration::from_secs(10),
            h.coordinator.download(&request(DownloadKind::Audio)),
        )
        .await
        .unwrap()
        .unwrap_err();

        assert!(matches!(err, RelayError::Timeout(_)));
        assert_eq!(err.status_code(), 504);
        assert_eq!(h.remover.calls(), 1);
        assert_eq!(h.leftover_files(), 0);
    }

    #[tokio::test]
    async fn test_client_disconnect_releases_once() {
        let h = harness(WRITE_OUTPUT);
        let response = h
            .coordinator
            .download(&request(DownloadKind::GenericMedia))
            .await
            .unwrap();
        assert_eq!(response.content_type, "video/mp4");

        drop(response);
        assert_eq!(h.remover.calls(), 1);
        assert_eq!(h.leftover_files(), 0);
    }

    #[tokio::test]
    async fn test_generic_media_error_line_fails_on_zero_exit() {
        let h = harness("echo 'ERROR: Requested format is not available' >&2; exit 0");
        let err = h
            .coordinator
            .download(&request(DownloadKind::GenericMedia))
            .await
            .unwrap_err();

        assert!(matches!(err, RelayError::ProcessExecution { code: Some(0), .. }));
        assert_eq!(h.remover.calls(), 1);
    }

    #[tokio::test]
    async fn test_no_late_release_after_delivery() {
        let tool = ToolCommand::new("sh").with_prefix_args(["-c", WRITE_OUTPUT, "yt-dlp"]);
        let h = harness_with(tool, Duration::from_millis(200));

        let response = h.coordinator.download(&request(DownloadKind::Audio)).await.unwrap();
        collect(response).await.unwrap();
        tokio::time::sleep(Duration::from_millis(400)).await;

        assert_eq!(h.remover.calls(), 1);
    }

    #[tokio::test]
    async fn test_video_pipe_streams_stdout() {
        let h = harness(WRITE_OUTPUT);
        let response = h
            .coordinator
            .download(&request(DownloadKind::Video { height: 720 }))
            .await
            .unwrap();

        assert_eq!(response.content_type, "video/mp4");
        assert_eq!(response.content_length, None);
        assert_eq!(response.disposition, "attachment; filename=\"My Video.mp4\"");
        assert_eq!(collect(response).await.unwrap(), b"video-bytes");
        assert_eq!(h.remover.calls(), 0);
        assert_eq!(h.leftover_files(), 0);
    }

    #[tokio::test]
    async fn test_video_pipe_disconnect_kills_tool() {
        let dir = tempfile::tempdir().unwrap();
        let marker = dir.path().join("finished");
        let script = format!("printf 'x'; sleep 1; touch '{}'", marker.display());
        let h = harness(&script);

        let mut response = h
            .coordinator
            .download(&request(DownloadKind::Video { height: 720 }))
            .await
            .unwrap();
        assert_eq!(&response.body.next().await.unwrap().unwrap()[..], b"x");
        drop(response);

        tokio::time::sleep(Duration::from_millis(1500)).await;
        assert!(!marker.exists());
        assert_eq!(h.remover.calls(), 0);
    }

    #[tokio::test]
    async fn test_video_pipe_failure_before_bytes() {
        let h = harness("echo 'ERROR: Requested format is not available' >&2; exit 1");
        let err = h
            .coordinator
            .download(&request(DownloadKind::Video { height: 4320 }))
            .await
            .unwrap_err();
        assert!(matches!(err, RelayError::ProcessExecution { code: Some(1), .. }));
    }

    #[tokio::test]
    async fn test_video_pipe_failure_after_bytes_aborts_stream() {
        let h = harness("printf 'partial'; exit 1");
        let response = h
            .coordinator
            .download(&request(DownloadKind::Video { height: 720 }))
            .await
            .unwrap();
        assert!(collect(response).await.is_err());
    }
}
