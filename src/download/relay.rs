//! Response bodies relaying tool output to the client

use std::fmt;
use std::io;
use std::pin::Pin;
use std::task::{Context, Poll};

use bytes::Bytes;
use futures::stream::{self, BoxStream, Stream, StreamExt};
use tokio::fs::File;
use tokio::process::ChildStdout;
use tokio_util::io::ReaderStream;
use tracing::{debug, warn};

use crate::download::artifact::{ReleaseReason, TransientArtifact};
use crate::download::process::ToolProcess;

/// A download ready to be sent: headers plus a byte stream
pub struct RelayResponse {
    pub content_type: &'static str,
    /// `Content-Disposition` header value
    pub disposition: String,
    /// Known body length, sent as `Content-Length`
    pub content_length: Option<u64>,
    pub body: BoxStream<'static, io::Result<Bytes>>,
}

impl fmt::Debug for RelayResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RelayResponse")
            .field("content_type", &self.content_type)
            .field("disposition", &self.disposition)
            .field("content_length", &self.content_length)
            .finish_non_exhaustive()
    }
}

/// Streams a finished artifact and releases it on every way the stream can end:
/// EOF (`Delivered`), read error (`StreamFailed`), or drop before EOF (`Dropped`).
pub struct ArtifactBody<S = ReaderStream<File>> {
    inner: S,
    artifact: Option<TransientArtifact>,
}

impl ArtifactBody {
    /// Stream an opened artifact file
    pub fn new(file: File, artifact: TransientArtifact) -> Self {
        Self::from_stream(ReaderStream::new(file), artifact)
    }
}

impl<S> ArtifactBody<S> {
    /// Stream arbitrary chunks on behalf of an artifact
    pub fn from_stream(inner: S, artifact: TransientArtifact) -> Self {
        Self {
            inner,
            artifact: Some(artifact),
        }
    }

    fn finish(&mut self, reason: ReleaseReason) {
        if let Some(artifact) = self.artifact.take() {
            artifact.release(reason);
        }
    }
}

impl<S> Stream for ArtifactBody<S>
where
    S: Stream<Item = io::Result<Bytes>> + Unpin,
{
    type Item = io::Result<Bytes>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = &mut *self;
        match Pin::new(&mut this.inner).poll_next(cx) {
            Poll::Ready(None) => {
                this.finish(ReleaseReason::Delivered);
                Poll::Ready(None)
            }
            Poll::Ready(Some(Err(e))) => {
                warn!("Artifact stream failed: {}", e);
                this.finish(ReleaseReason::StreamFailed);
                Poll::Ready(Some(Err(e)))
            }
            other => other,
        }
    }
}

impl<S> Drop for ArtifactBody<S> {
    fn drop(&mut self) {
        if self.artifact.is_some() {
            debug!("Artifact body dropped before completion");
        }
        self.finish(ReleaseReason::Dropped);
    }
}

/// Relay a running process's stdout, starting with an already-read first chunk.
///
/// After stdout ends the exit status is checked: a failed exit ends the stream
/// with an I/O error so the connection is aborted instead of looking complete.
/// Dropping the stream kills the process.
pub fn pipe_body(
    first: Bytes,
    stdout: ReaderStream<ChildStdout>,
    process: ToolProcess,
) -> BoxStream<'static, io::Result<Bytes>> {
    let rest = stream::unfold(Some((stdout, process)), |state| async move {
        let (mut stdout, mut process) = state?;
        match stdout.next().await {
            Some(Ok(chunk)) => Some((Ok(chunk), Some((stdout, process)))),
            Some(Err(e)) => {
                warn!("Reading tool output failed: {}", e);
                process.kill().await;
                Some((Err(e), None))
            }
            None => match process.wait().await {
                Ok(outcome) if outcome.succeeded(false) => None,
                Ok(outcome) => {
                    let message = outcome
                        .error_line
                        .unwrap_or_else(|| format!("tool exited with {}", outcome.status));
                    warn!("Pipe download failed after output started: {}", message);
                    Some((Err(io::Error::other(message)), None))
                }
                Err(e) => Some((Err(io::Error::other(e.to_string())), None)),
            },
        }
    });

    stream::once(async move { Ok(first) }).chain(rest).boxed()
}
