//! Periodic removal of stale files left behind by the extraction tool

use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use glob::Pattern;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::core::config::{RelayConfig, ARTIFACT_PREFIX};

/// What the sweeper looks at
#[derive(Debug, Clone)]
pub struct SweepConfig {
    /// Directory holding auxiliary leftovers
    pub sweep_dir: PathBuf,
    pub patterns: Vec<Pattern>,
    /// Directory holding artifacts
    pub temp_dir: PathBuf,
    /// Artifacts older than this are orphans
    pub stale_after: Duration,
    pub interval: Duration,
}

impl SweepConfig {
    /// Build from service configuration; invalid patterns are skipped with a warning
    pub fn from_config(config: &RelayConfig) -> Self {
        let patterns = config
            .sweep_patterns
            .iter()
            .filter_map(|raw| match Pattern::new(raw) {
                Ok(pattern) => Some(pattern),
                Err(e) => {
                    warn!("Ignoring invalid sweep pattern {:?}: {}", raw, e);
                    None
                }
            })
            .collect();

        Self {
            sweep_dir: config.sweep_dir.clone(),
            patterns,
            temp_dir: config.temp_dir.clone(),
            stale_after: config.stale_artifact_age(),
            interval: config.sweep_interval,
        }
    }
}

/// Outcome of one sweep pass
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SweepReport {
    pub found: usize,
    pub deleted: usize,
    pub failed: usize,
}

impl SweepReport {
    fn record(&mut self, path: &Path) {
        self.found += 1;
        match std::fs::remove_file(path) {
            Ok(()) => {
                debug!("Swept {}", path.display());
                self.deleted += 1;
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => self.deleted += 1,
            Err(e) => {
                warn!("Failed to sweep {}: {}", path.display(), e);
                self.failed += 1;
            }
        }
    }
}

/// Run one pass synchronously
pub fn sweep_once(config: &SweepConfig) -> SweepReport {
    let mut report = SweepReport::default();

    for path in files_in(&config.sweep_dir) {
        let matched = path
            .file_name()
            .and_then(|name| name.to_str())
            .is_some_and(|name| config.patterns.iter().any(|p| p.matches(name)));
        if matched {
            report.record(&path);
        }
    }

    let now = SystemTime::now();
    for path in files_in(&config.temp_dir) {
        let is_artifact = path
            .file_name()
            .and_then(|name| name.to_str())
            .is_some_and(|name| name.starts_with(ARTIFACT_PREFIX));
        if is_artifact && is_older_than(&path, now, config.stale_after) {
            report.record(&path);
        }
    }

    report
}

fn files_in(dir: &Path) -> impl Iterator<Item = PathBuf> {
    WalkDir::new(dir)
        .min_depth(1)
        .max_depth(1)
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_file())
        .map(|entry| entry.into_path())
}

fn is_older_than(path: &Path, now: SystemTime, age: Duration) -> bool {
    std::fs::metadata(path)
        .and_then(|meta| meta.modified())
        .ok()
        .and_then(|modified| now.duration_since(modified).ok())
        .is_some_and(|elapsed| elapsed > age)
}

/// Background sweeper with an explicit start/stop lifecycle
pub struct Sweeper {
    token: CancellationToken,
    handle: JoinHandle<()>,
}

impl Sweeper {
    /// Start sweeping: once immediately, then every `config.interval`
    pub fn start(config: SweepConfig) -> Self {
        let token = CancellationToken::new();
        let stop = token.clone();

        info!(
            "Starting sweeper every {} over {}",
            humantime::format_duration(config.interval),
            config.sweep_dir.display()
        );

        let handle = tokio::spawn(async move {
            let mut ticker = interval(config.interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = stop.cancelled() => break,
                    _ = ticker.tick() => {
                        let pass = config.clone();
                        match tokio::task::spawn_blocking(move || sweep_once(&pass)).await {
                            Ok(report) => info!(
                                "Sweep found {} stale files, deleted {}, failed {}",
                                report.found, report.deleted, report.failed
                            ),
                            Err(e) => warn!("Sweep task failed: {}", e),
                        }
                    }
                }
            }
            debug!("Sweeper stopped");
        });

        Self { token, handle }
    }

    /// Stop the sweeper and wait for it to finish
    pub async fn stop(self) {
        self.token.cancel();
        if let Err(e) = self.handle.await {
            warn!("Sweeper task ended abnormally: {}", e);
        }
    }
}
