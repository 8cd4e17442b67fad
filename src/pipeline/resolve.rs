//! Campaign name resolution

use super::Pipeline;
use crate::catalog::{Collection, Query, fetch_all};
use crate::error::{Error, Result};
use crate::types::{DeploymentId, Event, ItemFailure, Stage};
use std::collections::HashSet;

/// Deployments found for a list of campaigns
#[derive(Clone, Debug, Default)]
pub struct Resolution {
    /// Deployment ids in discovery order (campaign order, then server order)
    pub deployments: Vec<DeploymentId>,
    /// Campaigns whose lookup failed
    pub failures: Vec<ItemFailure>,
}

impl Pipeline {
    /// Look up every deployment of every named campaign
    ///
    /// Campaigns are resolved one at a time, in input order. A campaign that
    /// matches nothing contributes zero deployments and is only logged. A
    /// campaign whose lookup fails is recorded as a failure and skipped.
    /// Ids repeated across campaigns are kept; later stages enumerate each
    /// deployment once.
    ///
    /// # Errors
    ///
    /// Returns systemic errors (see [`crate::Error::is_systemic`]).
    pub async fn resolve_deployments(&self, campaigns: &[String]) -> Result<Resolution> {
        match self.resolve_stage(campaigns).await {
            (resolution, None) => Ok(resolution),
            (_, Some(e)) => Err(e),
        }
    }

    /// Resolve campaigns, stopping at the first systemic error
    ///
    /// The campaign that hit the error is recorded as a failure like any
    /// other, so the caller can still report it.
    pub(super) async fn resolve_stage(
        &self,
        campaigns: &[String],
    ) -> (Resolution, Option<Error>) {
        let mut resolution = Resolution::default();
        let mut systemic = None;
        self.emit(Event::StageStarted {
            stage: Stage::Resolve,
            total: campaigns.len(),
        });

        for (index, name) in campaigns.iter().enumerate() {
            if self.cancel.is_cancelled() {
                tracing::warn!(campaign = %name, "cancelled before resolving campaign");
                break;
            }

            tracing::info!(campaign = %name, "looking up campaign");
            let query = Query::campaign_deployments(name);
            match fetch_all(
                self.catalog.as_ref(),
                Collection::Deployment,
                &query,
                self.config.results_per_page,
            )
            .await
            {
                Ok(records) => {
                    let ids: Vec<DeploymentId> =
                        records.iter().map(|r| DeploymentId(r.id)).collect();
                    if ids.is_empty() {
                        tracing::warn!(campaign = %name, "no deployments found for campaign");
                    } else {
                        tracing::info!(
                            campaign = %name,
                            deployments = ?ids,
                            "found deployments"
                        );
                    }
                    resolution.deployments.extend(ids);
                }
                Err(e) if e.is_systemic() => {
                    tracing::error!(campaign = %name, error = %e, "campaign lookup aborted the run");
                    self.cancel.cancel();
                    let failure = ItemFailure::campaign(name, &e);
                    self.record_failure(&failure);
                    resolution.failures.push(failure);
                    systemic = Some(e);
                    break;
                }
                Err(e) => {
                    tracing::warn!(campaign = %name, error = %e, "campaign lookup failed");
                    let failure = ItemFailure::campaign(name, &e);
                    self.record_failure(&failure);
                    resolution.failures.push(failure);
                }
            }

            self.emit(Event::Progress {
                stage: Stage::Resolve,
                completed: index + 1,
                total: campaigns.len(),
            });
        }

        let mut seen = HashSet::new();
        for id in &resolution.deployments {
            if !seen.insert(*id) {
                tracing::warn!(deployment_id = id.get(), "deployment listed by more than one campaign");
            }
        }

        self.emit(Event::StageFinished {
            stage: Stage::Resolve,
            succeeded: campaigns.len().saturating_sub(resolution.failures.len()),
            failed: resolution.failures.len(),
        });
        (resolution, systemic)
    }
}
