//! Core types and events for squidle-dl

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

macro_rules! integer_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub i64);

        impl $name {
            /// Get the inner i64 value
            pub fn get(&self) -> i64 {
                self.0
            }
        }

        impl From<i64> for $name {
            fn from(id: i64) -> Self {
                Self(id)
            }
        }

        impl From<$name> for i64 {
            fn from(id: $name) -> Self {
                id.0
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl std::str::FromStr for $name {
            type Err = std::num::ParseIntError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Ok(Self(s.trim().parse()?))
            }
        }
    };
}

integer_id!(
    /// Server-assigned deployment identifier
    DeploymentId
);

integer_id!(
    /// Server-assigned media (image) identifier
    MediaId
);

/// A media item together with the deployment it was enumerated under
///
/// This pair is the identity every later stage joins on.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct MediaRef {
    /// Media id
    pub image_id: MediaId,
    /// Owning deployment
    pub deployment_id: DeploymentId,
}

impl MediaRef {
    /// Create a new pair
    pub fn new(image_id: impl Into<MediaId>, deployment_id: impl Into<DeploymentId>) -> Self {
        Self {
            image_id: image_id.into(),
            deployment_id: deployment_id.into(),
        }
    }
}

/// Pipeline stage
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    /// Campaign name to deployment ids
    Resolve,
    /// Deployment id to media ids
    Enumerate,
    /// Per-image pose and URL lookup
    Metadata,
    /// Per-image byte download
    Download,
}

impl Stage {
    /// Lowercase name, as written in reports
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Resolve => "resolve",
            Stage::Enumerate => "enumerate",
            Stage::Metadata => "metadata",
            Stage::Download => "download",
        }
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A unit of work that did not produce its result
///
/// Campaign and deployment failures leave the ids they could not reach empty.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ItemFailure {
    /// Stage the failure happened in
    pub stage: Stage,
    /// Campaign name (resolve stage only)
    #[serde(default)]
    pub campaign: Option<String>,
    /// Media id, when the unit was an image
    pub image_id: Option<MediaId>,
    /// Deployment id, when known
    pub deployment_id: Option<DeploymentId>,
    /// Machine-readable error code (see [`crate::Error::code`])
    pub code: String,
    /// Rendered error
    pub error: String,
}

impl ItemFailure {
    /// Failure of a per-image unit
    pub fn media(stage: Stage, media: MediaRef, error: &crate::Error) -> Self {
        Self {
            stage,
            campaign: None,
            image_id: Some(media.image_id),
            deployment_id: Some(media.deployment_id),
            code: error.code().to_string(),
            error: error.to_string(),
        }
    }

    /// Failure to resolve a campaign
    pub fn campaign(name: &str, error: &crate::Error) -> Self {
        Self {
            stage: Stage::Resolve,
            campaign: Some(name.to_string()),
            image_id: None,
            deployment_id: None,
            code: error.code().to_string(),
            error: error.to_string(),
        }
    }

    /// Failure to list a deployment's media
    pub fn deployment(deployment_id: DeploymentId, error: &crate::Error) -> Self {
        Self {
            stage: Stage::Enumerate,
            campaign: None,
            image_id: None,
            deployment_id: Some(deployment_id),
            code: error.code().to_string(),
            error: error.to_string(),
        }
    }
}

/// Event emitted during a run
///
/// Subscribers receive these through [`crate::Pipeline::subscribe`].
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    /// A stage started with a known amount of work
    StageStarted {
        /// Stage
        stage: Stage,
        /// Number of units in the stage
        total: usize,
    },

    /// One unit of a parallel stage finished (successfully or not)
    Progress {
        /// Stage
        stage: Stage,
        /// Units finished so far
        completed: usize,
        /// Units in the stage
        total: usize,
    },

    /// One unit failed
    ItemFailed {
        /// Failure details
        failure: ItemFailure,
    },

    /// A stage finished
    StageFinished {
        /// Stage
        stage: Stage,
        /// Units that produced a result
        succeeded: usize,
        /// Units that failed
        failed: usize,
    },

    /// The manifest was written
    ManifestWritten {
        /// Manifest path
        path: PathBuf,
        /// Rows written
        rows: usize,
    },
}

/// Outcome of a full run
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct RunSummary {
    /// Deployment ids resolved, in discovery order
    pub deployments: Vec<DeploymentId>,
    /// Media items enumerated
    pub media_enumerated: usize,
    /// Manifest rows written
    pub manifest_rows: usize,
    /// Images written to disk
    pub images_downloaded: usize,
    /// Every unit that failed, across stages
    pub failures: Vec<ItemFailure>,
    /// Where the manifest was written
    pub manifest_path: Option<PathBuf>,
    /// Whether the run was cancelled before finishing
    pub cancelled: bool,
}

impl RunSummary {
    /// Count failures recorded for one stage
    pub fn failed_in(&self, stage: Stage) -> usize {
        self.failures.iter().filter(|f| f.stage == stage).count()
    }

    /// True if no unit failed and the run was not cancelled
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty() && !self.cancelled
    }
}
