//! Parallel pose lookups and manifest assembly

use super::Pipeline;
use crate::error::{Error, Result};
use crate::manifest::{Manifest, ManifestRow};
use crate::parallel::map_unordered;
use crate::types::{Event, ItemFailure, MediaRef, Stage};
use std::sync::Arc;

/// Manifest assembled from pose lookups
#[derive(Clone, Debug, Default)]
pub struct MetadataReport {
    /// One row per successful lookup
    pub manifest: Manifest,
    /// Lookups that failed or never started
    pub failures: Vec<ItemFailure>,
}

impl Pipeline {
    /// Look up pose and image URL for every media item, `workers` at a time
    ///
    /// Results are joined on the [`MediaRef`] each unit carries, never on
    /// completion order. Every input ends up either as a manifest row or as
    /// a failure. Units still queued when the run is cancelled are reported
    /// with code `cancelled`.
    ///
    /// # Errors
    ///
    /// If any unit hits a systemic error, queued units are cancelled and the
    /// first such error is returned once in-flight units have drained.
    pub async fn collect_metadata(&self, media: Vec<MediaRef>) -> Result<MetadataReport> {
        match self.metadata_stage(media).await {
            (report, None) => Ok(report),
            (_, Some(e)) => Err(e),
        }
    }

    pub(super) async fn metadata_stage(
        &self,
        media: Vec<MediaRef>,
    ) -> (MetadataReport, Option<Error>) {
        let total = media.len();
        self.emit(Event::StageStarted {
            stage: Stage::Metadata,
            total,
        });

        let catalog = Arc::clone(&self.catalog);
        let cancel = self.cancel.clone();
        let event_tx = self.event_tx.clone();

        let results = map_unordered(
            media,
            self.config.workers,
            move |item: MediaRef| {
                let catalog = Arc::clone(&catalog);
                let cancel = cancel.clone();
                async move {
                    if cancel.is_cancelled() {
                        return (item, Err(Error::Cancelled));
                    }
                    let row = match catalog.media_pose(item.image_id).await {
                        Ok(response) => ManifestRow::from_pose(item, response),
                        Err(e) => Err(e),
                    };
                    if let Err(e) = &row
                        && e.is_systemic()
                    {
                        cancel.cancel();
                    }
                    (item, row)
                }
            },
            |completed| {
                event_tx
                    .send(Event::Progress {
                        stage: Stage::Metadata,
                        completed,
                        total,
                    })
                    .ok();
            },
        )
        .await;

        let mut report = MetadataReport::default();
        let mut systemic: Option<Error> = None;

        for result in results {
            let (item, error) = match result {
                Ok((item, Ok(row))) => {
                    if report.manifest.insert(row) {
                        continue;
                    }
                    (item, Error::Other("duplicate media item".to_string()))
                }
                Ok((item, Err(e))) => (item, e),
                Err(panic) => (
                    panic.input,
                    Error::Other(format!("metadata worker failed: {}", panic.message)),
                ),
            };

            match &error {
                Error::Cancelled => tracing::debug!(
                    image_id = item.image_id.get(),
                    "metadata lookup cancelled before start"
                ),
                e => tracing::warn!(
                    image_id = item.image_id.get(),
                    deployment_id = item.deployment_id.get(),
                    error = %e,
                    "metadata lookup failed"
                ),
            }

            let failure = ItemFailure::media(Stage::Metadata, item, &error);
            self.record_failure(&failure);
            report.failures.push(failure);
            if error.is_systemic() && systemic.is_none() {
                systemic = Some(error);
            }
        }

        self.emit(Event::StageFinished {
            stage: Stage::Metadata,
            succeeded: report.manifest.len(),
            failed: report.failures.len(),
        });

        if systemic.is_none() {
            tracing::info!(
                rows = report.manifest.len(),
                failed = report.failures.len(),
                "metadata collected"
            );
        }
        (report, systemic)
    }
}
