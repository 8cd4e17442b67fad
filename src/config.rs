//! Configuration types for squidle-dl

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::{path::PathBuf, time::Duration};

/// Main configuration for a dataset download run
///
/// All fields have defaults, so `Config::default()` talks to the public
/// SQUIDLE+ instance anonymously and writes to `./squidle_download`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Config {
    /// Catalog server base URL (default: "https://soi.squidle.org")
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// API token for private datasets (None = public access)
    #[serde(default)]
    pub api_token: Option<String>,

    /// Output directory for the manifest and image tree (default: "./squidle_download")
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,

    /// Worker count for the metadata and download phases (default: 8)
    #[serde(default = "default_workers")]
    pub workers: usize,

    /// Results requested per listing page (default: 100)
    #[serde(default = "default_results_per_page")]
    pub results_per_page: u32,

    /// Per-request timeout (default: 30 seconds)
    #[serde(default = "default_request_timeout", with = "duration_serde")]
    pub request_timeout: Duration,

    /// File extension given to every downloaded image (default: "png")
    ///
    /// Applied regardless of the source format.
    #[serde(default = "default_image_extension")]
    pub image_extension: String,

    /// Manifest file name inside `output_dir` (default: "filelist.csv")
    #[serde(default = "default_manifest_name")]
    pub manifest_name: String,

    /// Failure report file name inside `output_dir` (default: "failures.csv")
    #[serde(default = "default_failures_name")]
    pub failures_name: String,

    /// Stop after writing the manifest (default: false)
    #[serde(default)]
    pub metadata_only: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            api_token: None,
            output_dir: default_output_dir(),
            workers: default_workers(),
            results_per_page: default_results_per_page(),
            request_timeout: default_request_timeout(),
            image_extension: default_image_extension(),
            manifest_name: default_manifest_name(),
            failures_name: default_failures_name(),
            metadata_only: false,
        }
    }
}

impl Config {
    /// Check settings that would otherwise fail deep inside the pipeline
    pub fn validate(&self) -> Result<()> {
        if self.workers == 0 {
            return Err(config_error("workers must be at least 1", "workers"));
        }
        if self.results_per_page == 0 {
            return Err(config_error(
                "results_per_page must be at least 1",
                "results_per_page",
            ));
        }
        if self.request_timeout.is_zero() {
            return Err(config_error(
                "request_timeout must be non-zero",
                "request_timeout",
            ));
        }
        let ext = self.image_extension.trim_start_matches('.');
        if ext.is_empty() || ext.contains(['/', '\\']) {
            return Err(config_error(
                format!("invalid image extension '{}'", self.image_extension),
                "image_extension",
            ));
        }
        url::Url::parse(&self.base_url).map_err(|e| Error::Config {
            message: format!("invalid base_url '{}': {}", self.base_url, e),
            key: Some("base_url".into()),
        })?;
        Ok(())
    }

    /// Image extension without a leading dot
    pub fn extension(&self) -> &str {
        self.image_extension.trim_start_matches('.')
    }

    /// Full path of the manifest file
    pub fn manifest_path(&self) -> PathBuf {
        self.output_dir.join(&self.manifest_name)
    }

    /// Full path of the failure report
    pub fn failures_path(&self) -> PathBuf {
        self.output_dir.join(&self.failures_name)
    }

    /// API token, treating an empty string as absent
    pub fn token(&self) -> Option<&str> {
        self.api_token.as_deref().filter(|t| !t.is_empty())
    }
}

fn config_error(message: impl Into<String>, key: &str) -> Error {
    Error::Config {
        message: message.into(),
        key: Some(key.to_string()),
    }
}

fn default_base_url() -> String {
    "https://soi.squidle.org".to_string()
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("./squidle_download")
}

fn default_workers() -> usize {
    8
}

fn default_results_per_page() -> u32 {
    100
}

fn default_request_timeout() -> Duration {
    Duration::from_secs(30)
}

fn default_image_extension() -> String {
    "png".to_string()
}

fn default_manifest_name() -> String {
    "filelist.csv".to_string()
}

fn default_failures_name() -> String {
    "failures.csv".to_string()
}

// Duration serialization helper
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_secs())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}
