//! The dataset manifest: one row per image joining identity, pose and URL.
//!
//! The manifest is assembled in memory from unordered worker results, keyed by
//! `(deployment_id, image_id)`, and written once as CSV. Rows are written
//! sorted by deployment and then image id so repeated runs produce identical
//! files for identical catalogs.

use crate::catalog::MediaPoseResponse;
use crate::error::{Error, Result};
use crate::types::{DeploymentId, ItemFailure, MediaId, MediaRef};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

/// Column order of the manifest file
pub const MANIFEST_COLUMNS: [&str; 8] = [
    "timestamp",
    "lat",
    "lon",
    "dep",
    "alt",
    "image_url",
    "image_id",
    "deployment_id",
];

/// One manifest row
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ManifestRow {
    /// Capture time as reported by the catalog
    ///
    /// An empty timestamp is stored as `None`, since CSV cannot tell the two apart.
    pub timestamp: Option<String>,
    /// Latitude
    pub lat: f64,
    /// Longitude
    pub lon: f64,
    /// Depth
    pub dep: f64,
    /// Altitude
    pub alt: f64,
    /// Best-quality image URL
    pub image_url: String,
    /// Media id
    pub image_id: MediaId,
    /// Deployment the image was enumerated under
    pub deployment_id: DeploymentId,
}

impl ManifestRow {
    /// Build a row from a pose lookup
    ///
    /// Identity comes from `media`, never from the response body. Every
    /// coordinate and the image URL are required; a missing or non-numeric
    /// value is an [`Error::InvalidRecord`] naming the field.
    pub fn from_pose(media: MediaRef, response: MediaPoseResponse) -> Result<Self> {
        let invalid = |message: &str| Error::InvalidRecord {
            image_id: media.image_id.get(),
            message: message.to_string(),
        };

        let image_url = response
            .media
            .and_then(|m| m.path_best)
            .map(|p| p.trim().to_string())
            .filter(|p| !p.is_empty())
            .ok_or_else(|| invalid("media.path_best is missing"))?;
        let pose = response
            .pose
            .ok_or_else(|| invalid("response has no pose object"))?;

        let require = |value: Option<f64>, field: &str| {
            value
                .filter(|v| v.is_finite())
                .ok_or_else(|| invalid(&format!("pose.{} is missing or not numeric", field)))
        };

        Ok(Self {
            timestamp: pose.timestamp.filter(|t| !t.trim().is_empty()),
            lat: require(pose.lat, "lat")?,
            lon: require(pose.lon, "lon")?,
            dep: require(pose.dep, "dep")?,
            alt: require(pose.alt, "alt")?,
            image_url,
            image_id: media.image_id,
            deployment_id: media.deployment_id,
        })
    }

    /// Identity of the row
    pub fn media_ref(&self) -> MediaRef {
        MediaRef {
            image_id: self.image_id,
            deployment_id: self.deployment_id,
        }
    }
}

/// Manifest table keyed by `(deployment_id, image_id)`
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Manifest {
    rows: BTreeMap<(DeploymentId, MediaId), ManifestRow>,
}

impl Manifest {
    /// Empty manifest
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a row; returns false (and keeps the existing row) if the key is taken
    pub fn insert(&mut self, row: ManifestRow) -> bool {
        let key = (row.deployment_id, row.image_id);
        if self.rows.contains_key(&key) {
            tracing::warn!(
                image_id = row.image_id.get(),
                deployment_id = row.deployment_id.get(),
                "duplicate manifest row ignored"
            );
            return false;
        }
        self.rows.insert(key, row);
        true
    }

    /// Row for one media item
    pub fn get(&self, media: MediaRef) -> Option<&ManifestRow> {
        self.rows.get(&(media.deployment_id, media.image_id))
    }

    /// Whether a media item has a row
    pub fn contains(&self, media: MediaRef) -> bool {
        self.get(media).is_some()
    }

    /// Number of rows
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// True if there are no rows
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Rows ordered by deployment, then image id
    pub fn rows(&self) -> impl Iterator<Item = &ManifestRow> {
        self.rows.values()
    }

    /// Encode as CSV with a header line
    pub fn to_csv(&self) -> Result<Vec<u8>> {
        let mut writer = csv::Writer::from_writer(Vec::new());
        if self.rows.is_empty() {
            writer.write_record(MANIFEST_COLUMNS)?;
        }
        for row in self.rows() {
            writer.serialize(row)?;
        }
        writer
            .into_inner()
            .map_err(|e| Error::Io(std::io::Error::other(e.to_string())))
    }

    /// Decode from CSV produced by [`Manifest::to_csv`]
    pub fn from_csv(data: &[u8]) -> Result<Self> {
        let mut reader = csv::Reader::from_reader(data);
        let mut manifest = Self::new();
        for row in reader.deserialize::<ManifestRow>() {
            manifest.insert(row?);
        }
        Ok(manifest)
    }

    /// Write the manifest to `path`
    pub async fn write(&self, path: &Path) -> Result<()> {
        let data = self.to_csv()?;
        tokio::fs::write(path, data)
            .await
            .map_err(|e| Error::io_at(path, e))?;
        tracing::info!(path = %path.display(), rows = self.len(), "manifest written");
        Ok(())
    }

    /// Read a manifest written by [`Manifest::write`]
    pub async fn read(path: &Path) -> Result<Self> {
        let data = tokio::fs::read(path)
            .await
            .map_err(|e| Error::io_at(path, e))?;
        Self::from_csv(&data)
    }
}

impl FromIterator<ManifestRow> for Manifest {
    fn from_iter<I: IntoIterator<Item = ManifestRow>>(iter: I) -> Self {
        let mut manifest = Self::new();
        for row in iter {
            manifest.insert(row);
        }
        manifest
    }
}

/// Write the failure report as CSV (`stage, campaign, image_id, deployment_id, code, error`)
pub async fn write_failures(path: &Path, failures: &[ItemFailure]) -> Result<()> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    for failure in failures {
        writer.serialize(failure)?;
    }
    let data = writer
        .into_inner()
        .map_err(|e| Error::Io(std::io::Error::other(e.to_string())))?;
    tokio::fs::write(path, data)
        .await
        .map_err(|e| Error::io_at(path, e))
}
