//! Parallel image download

use super::Pipeline;
use crate::catalog::CatalogClient;
use crate::error::{Error, Result};
use crate::manifest::Manifest;
use crate::parallel::map_unordered;
use crate::types::{Event, ItemFailure, MediaRef, Stage};
use crate::utils::{ensure_dir, image_path};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Outcome of the download stage
#[derive(Clone, Debug, Default)]
pub struct DownloadReport {
    /// Images written to disk
    pub downloaded: usize,
    /// Downloads that failed or never started
    pub failures: Vec<ItemFailure>,
}

/// One image to fetch
#[derive(Clone, Debug)]
struct DownloadJob {
    media: MediaRef,
    url: String,
    path: PathBuf,
}

impl Pipeline {
    /// Download the image behind every manifest row, `workers` at a time
    ///
    /// Each image lands at `<output>/<deployment_id>/<image_id>.<ext>`,
    /// overwriting any existing file. Bytes are written to a sibling `.part`
    /// file first and renamed into place, so a failed unit never leaves a
    /// truncated image under its final name.
    ///
    /// Image URLs often point at a separate object store, which answers 403
    /// for a missing object. Such errors only fail their own image. The stage
    /// stops only when the catalog host itself refuses the connection or the
    /// credentials (see [`CatalogClient::is_catalog_url`]).
    ///
    /// # Errors
    ///
    /// Returns the first systemic error from the catalog host after in-flight
    /// units have drained.
    pub async fn download_images(&self, manifest: &Manifest) -> Result<DownloadReport> {
        match self.download_stage(manifest).await {
            (report, None) => Ok(report),
            (_, Some(e)) => Err(e),
        }
    }

    pub(super) async fn download_stage(
        &self,
        manifest: &Manifest,
    ) -> (DownloadReport, Option<Error>) {
        let extension = self.config.extension().to_string();
        let jobs: Vec<DownloadJob> = manifest
            .rows()
            .map(|row| DownloadJob {
                media: row.media_ref(),
                url: row.image_url.clone(),
                path: image_path(
                    &self.config.output_dir,
                    row.deployment_id,
                    row.image_id,
                    &extension,
                ),
            })
            .collect();

        let total = jobs.len();
        self.emit(Event::StageStarted {
            stage: Stage::Download,
            total,
        });

        let catalog = Arc::clone(&self.catalog);
        let cancel = self.cancel.clone();
        let event_tx = self.event_tx.clone();

        let results = map_unordered(
            jobs,
            self.config.workers,
            move |job: DownloadJob| {
                let catalog = Arc::clone(&catalog);
                let cancel = cancel.clone();
                async move {
                    if cancel.is_cancelled() {
                        return (job.media, Err(Error::Cancelled), false);
                    }
                    let result = fetch_to_file(catalog.as_ref(), &job.url, &job.path).await;
                    let aborts = matches!(&result, Err(e) if e.is_systemic())
                        && catalog.is_catalog_url(&job.url);
                    if aborts {
                        cancel.cancel();
                    }
                    (job.media, result.map(|_| job.path), aborts)
                }
            },
            |completed| {
                event_tx
                    .send(Event::Progress {
                        stage: Stage::Download,
                        completed,
                        total,
                    })
                    .ok();
            },
        )
        .await;

        let mut report = DownloadReport::default();
        let mut systemic: Option<Error> = None;

        for result in results {
            let (media, error, aborts) = match result {
                Ok((media, Ok(path), _)) => {
                    tracing::debug!(image_id = media.image_id.get(), path = %path.display(), "image saved");
                    report.downloaded += 1;
                    continue;
                }
                Ok((media, Err(e), aborts)) => (media, e, aborts),
                Err(panic) => (
                    panic.input.media,
                    Error::Other(format!("download worker failed: {}", panic.message)),
                    false,
                ),
            };

            if !matches!(error, Error::Cancelled) {
                tracing::warn!(
                    image_id = media.image_id.get(),
                    deployment_id = media.deployment_id.get(),
                    error = %error,
                    "image download failed"
                );
            }

            let failure = ItemFailure::media(Stage::Download, media, &error);
            self.record_failure(&failure);
            report.failures.push(failure);
            if aborts && systemic.is_none() {
                systemic = Some(error);
            }
        }

        self.emit(Event::StageFinished {
            stage: Stage::Download,
            succeeded: report.downloaded,
            failed: report.failures.len(),
        });

        if systemic.is_none() {
            tracing::info!(
                downloaded = report.downloaded,
                failed = report.failures.len(),
                "images downloaded"
            );
        }
        (report, systemic)
    }
}

async fn fetch_to_file(catalog: &dyn CatalogClient, url: &str, path: &Path) -> Result<()> {
    if let Some(dir) = path.parent() {
        ensure_dir(dir).await?;
    }

    let bytes = catalog.fetch_bytes(url).await?;

    let mut partial = path.as_os_str().to_owned();
    partial.push(".part");
    let partial = PathBuf::from(partial);

    if let Err(e) = tokio::fs::write(&partial, &bytes).await {
        tokio::fs::remove_file(&partial).await.ok();
        return Err(Error::io_at(&partial, e));
    }
    tokio::fs::rename(&partial, path)
        .await
        .map_err(|e| Error::io_at(path, e))
}
