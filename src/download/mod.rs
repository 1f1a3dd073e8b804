//! Download system: transient artifacts, tool processes, relay bodies, and cleanup

pub mod artifact;
pub mod coordinator;
pub mod process;
pub mod relay;
pub mod sweeper;

pub use artifact::{ArtifactRemover, FsRemover, ReleaseReason, TransientArtifact};
pub use coordinator::DownloadCoordinator;
pub use process::{ProcessOutcome, StdoutMode, ToolProcess};
pub use relay::{ArtifactBody, RelayResponse};
pub use sweeper::{sweep_once, SweepConfig, SweepReport, Sweeper};
