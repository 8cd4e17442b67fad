//! The acquisition pipeline, split into one submodule per stage.
//!
//! The `Pipeline` struct and its methods are organized by stage:
//! - `resolve` - Campaign names to deployment ids
//! - `enumerate` - Deployment ids to (image, deployment) pairs
//! - `metadata` - Parallel pose lookups assembled into the manifest
//! - `download` - Parallel image download into the deployment tree
//!
//! Stages run strictly one after another; each returns an owned result the
//! next stage consumes. Only the metadata and download stages fan out.
//!
//! Failure policy is the same in every stage: an error that cannot affect
//! other units (bad response for one campaign, one deployment, one image) is
//! recorded as an [`ItemFailure`] and the stage continues; a systemic error
//! (see [`crate::Error::is_systemic`]) stops queued work and is returned. In
//! the download stage only errors from the catalog host count as systemic.

mod download;
mod enumerate;
mod metadata;
mod resolve;

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
pub(crate) mod test_helpers;
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests;

pub use download::DownloadReport;
pub use enumerate::Enumeration;
pub use metadata::MetadataReport;
pub use resolve::Resolution;

use crate::catalog::{CatalogClient, HttpCatalog};
use crate::config::Config;
use crate::error::{Error, Result};
use crate::manifest::write_failures;
use crate::types::{Event, ItemFailure, RunSummary, Stage};
use crate::utils::ensure_dir;
use std::sync::Arc;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;

/// Capacity of the event broadcast channel
const EVENT_CHANNEL_CAPACITY: usize = 1024;

/// Dataset acquisition pipeline (cloneable - all fields are Arc-wrapped)
#[derive(Clone)]
pub struct Pipeline {
    /// Catalog access shared by every stage and worker
    pub(crate) catalog: Arc<dyn CatalogClient>,
    /// Run configuration
    pub(crate) config: Arc<Config>,
    /// Event broadcast channel sender (multiple subscribers supported)
    pub(crate) event_tx: broadcast::Sender<Event>,
    /// Cancelled on shutdown request; queued units observe it before starting
    pub(crate) cancel: CancellationToken,
}

impl Pipeline {
    /// Create a pipeline talking to the configured catalog server
    ///
    /// # Errors
    /// Returns [`crate::Error::Config`] if the configuration is invalid.
    pub fn new(config: Config) -> Result<Self> {
        config.validate()?;
        let catalog = HttpCatalog::new(&config)?;
        Self::with_catalog(config, Arc::new(catalog))
    }

    /// Create a pipeline over any catalog implementation
    pub fn with_catalog(config: Config, catalog: Arc<dyn CatalogClient>) -> Result<Self> {
        config.validate()?;
        let (event_tx, _rx) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Ok(Self {
            catalog,
            config: Arc::new(config),
            event_tx,
            cancel: CancellationToken::new(),
        })
    }

    /// Subscribe to run events
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.event_tx.subscribe()
    }

    /// Token that cancels this pipeline's queued work when triggered
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Stop starting new units; in-flight units finish normally
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Run configuration
    pub fn config(&self) -> &Config {
        &self.config
    }

    pub(crate) fn emit(&self, event: Event) {
        self.event_tx.send(event).ok();
    }

    pub(crate) fn record_failure(&self, failure: &ItemFailure) {
        self.emit(Event::ItemFailed {
            failure: failure.clone(),
        });
    }

    /// Run every stage for `campaigns` and write the manifest and images
    ///
    /// The manifest is written once, after the metadata stage has fully
    /// drained, and before any image is downloaded. If any unit failed, a
    /// failure report is written next to it, also when a systemic error ends
    /// the run early.
    ///
    /// # Errors
    ///
    /// Returns an error for systemic failures (unreachable server, rejected
    /// credentials) and for failures writing the manifest. Per-item failures
    /// are reported in [`RunSummary::failures`] instead.
    pub async fn run(&self, campaigns: &[String]) -> Result<RunSummary> {
        let output_dir = self.config.output_dir.clone();
        ensure_dir(&output_dir).await?;

        let mut summary = RunSummary::default();

        let (resolution, systemic) = self.resolve_stage(campaigns).await;
        summary.failures.extend(resolution.failures);
        summary.deployments = resolution.deployments;
        if let Some(e) = systemic {
            return Err(self.abort(summary, e).await);
        }

        let (enumeration, systemic) = self.enumerate_stage(&summary.deployments).await;
        summary.failures.extend(enumeration.failures);
        summary.media_enumerated = enumeration.media.len();
        if let Some(e) = systemic {
            return Err(self.abort(summary, e).await);
        }

        tracing::info!("getting image poses and URLs (not downloading data yet)");
        let (metadata, systemic) = self.metadata_stage(enumeration.media).await;
        summary.failures.extend(metadata.failures);
        if let Some(e) = systemic {
            return Err(self.abort(summary, e).await);
        }

        let manifest_path = self.config.manifest_path();
        metadata.manifest.write(&manifest_path).await?;
        summary.manifest_rows = metadata.manifest.len();
        summary.manifest_path = Some(manifest_path.clone());
        self.emit(Event::ManifestWritten {
            path: manifest_path,
            rows: metadata.manifest.len(),
        });

        if self.cancel.is_cancelled() {
            tracing::warn!("run cancelled, skipping image download");
        } else if self.config.metadata_only {
            tracing::info!("metadata only, skipping image download");
        } else {
            tracing::info!("downloading images");
            let (report, systemic) = self.download_stage(&metadata.manifest).await;
            summary.images_downloaded = report.downloaded;
            summary.failures.extend(report.failures);
            if let Some(e) = systemic {
                return Err(self.abort(summary, e).await);
            }
        }

        summary.cancelled = self.cancel.is_cancelled();
        self.finish(&summary).await?;
        Ok(summary)
    }

    /// Write what failed so far and hand back the error that ended the run
    async fn abort(&self, mut summary: RunSummary, error: Error) -> Error {
        summary.cancelled = self.cancel.is_cancelled();
        if let Err(e) = self.finish(&summary).await {
            tracing::warn!(error = %e, "could not write failure report");
        }
        tracing::error!(error = %error, code = error.code(), "run aborted");
        error
    }

    async fn finish(&self, summary: &RunSummary) -> Result<()> {
        if !summary.failures.is_empty() {
            let path = self.config.failures_path();
            write_failures(&path, &summary.failures).await?;
            tracing::warn!(
                resolve = summary.failed_in(Stage::Resolve),
                enumerate = summary.failed_in(Stage::Enumerate),
                metadata = summary.failed_in(Stage::Metadata),
                download = summary.failed_in(Stage::Download),
                report = %path.display(),
                "some items failed"
            );
        }

        tracing::info!(
            deployments = summary.deployments.len(),
            media = summary.media_enumerated,
            manifest_rows = summary.manifest_rows,
            downloaded = summary.images_downloaded,
            failed = summary.failures.len(),
            cancelled = summary.cancelled,
            "run finished"
        );
        Ok(())
    }
}

