//! Media enumeration per deployment

use super::Pipeline;
use crate::catalog::{Collection, Query, fetch_all};
use crate::error::{Error, Result};
use crate::types::{DeploymentId, Event, ItemFailure, MediaId, MediaRef, Stage};
use std::collections::HashSet;

/// Media items found for a list of deployments
#[derive(Clone, Debug, Default)]
pub struct Enumeration {
    /// Unique (image, deployment) pairs, grouped by deployment in input order
    pub media: Vec<MediaRef>,
    /// Deployments whose listing failed
    pub failures: Vec<ItemFailure>,
}

impl Pipeline {
    /// List every media item of every deployment
    ///
    /// Each pair is attributed to the deployment it was listed under. A
    /// deployment id that appears more than once in `deployments` is only
    /// listed the first time, so every pair is unique.
    ///
    /// # Errors
    ///
    /// Returns systemic errors (see [`crate::Error::is_systemic`]).
    pub async fn enumerate_media(&self, deployments: &[DeploymentId]) -> Result<Enumeration> {
        match self.enumerate_stage(deployments).await {
            (enumeration, None) => Ok(enumeration),
            (_, Some(e)) => Err(e),
        }
    }

    /// List deployments, stopping at the first systemic error
    pub(super) async fn enumerate_stage(
        &self,
        deployments: &[DeploymentId],
    ) -> (Enumeration, Option<Error>) {
        let mut enumeration = Enumeration::default();
        let mut systemic = None;
        let mut listed: HashSet<DeploymentId> = HashSet::new();
        let unique = deployments.iter().collect::<HashSet<_>>().len();

        self.emit(Event::StageStarted {
            stage: Stage::Enumerate,
            total: unique,
        });

        for &deployment_id in deployments {
            if self.cancel.is_cancelled() {
                tracing::warn!(
                    deployment_id = deployment_id.get(),
                    "cancelled before listing deployment"
                );
                break;
            }
            if !listed.insert(deployment_id) {
                tracing::debug!(deployment_id = deployment_id.get(), "deployment already listed");
                continue;
            }

            tracing::info!(deployment_id = deployment_id.get(), "listing deployment media");
            let query = Query::deployment_media(deployment_id.get());
            match fetch_all(
                self.catalog.as_ref(),
                Collection::Media,
                &query,
                self.config.results_per_page,
            )
            .await
            {
                Ok(records) => {
                    let mut ids: HashSet<MediaId> = HashSet::with_capacity(records.len());
                    for record in records {
                        if let Some(reported) = record.deployment_id
                            && reported != deployment_id.get()
                        {
                            tracing::warn!(
                                image_id = record.id,
                                deployment_id = deployment_id.get(),
                                reported,
                                "media record names a different deployment"
                            );
                        }
                        let image_id = MediaId(record.id);
                        if !ids.insert(image_id) {
                            tracing::warn!(
                                image_id = record.id,
                                deployment_id = deployment_id.get(),
                                "media listed twice, keeping first"
                            );
                            continue;
                        }
                        enumeration.media.push(MediaRef {
                            image_id,
                            deployment_id,
                        });
                    }
                    tracing::info!(
                        deployment_id = deployment_id.get(),
                        media = ids.len(),
                        "deployment listed"
                    );
                }
                Err(e) if e.is_systemic() => {
                    tracing::error!(
                        deployment_id = deployment_id.get(),
                        error = %e,
                        "deployment listing aborted the run"
                    );
                    self.cancel.cancel();
                    let failure = ItemFailure::deployment(deployment_id, &e);
                    self.record_failure(&failure);
                    enumeration.failures.push(failure);
                    systemic = Some(e);
                    break;
                }
                Err(e) => {
                    tracing::warn!(
                        deployment_id = deployment_id.get(),
                        error = %e,
                        "deployment listing failed"
                    );
                    let failure = ItemFailure::deployment(deployment_id, &e);
                    self.record_failure(&failure);
                    enumeration.failures.push(failure);
                }
            }

            self.emit(Event::Progress {
                stage: Stage::Enumerate,
                completed: listed.len(),
                total: unique,
            });
        }

        self.emit(Event::StageFinished {
            stage: Stage::Enumerate,
            succeeded: listed.len().saturating_sub(enumeration.failures.len()),
            failed: enumeration.failures.len(),
        });
        (enumeration, systemic)
    }
}
