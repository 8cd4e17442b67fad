//! Test configuration helpers

use squidle_dl::Config;
use std::time::Duration;
use tempfile::TempDir;

/// Config pointed at `base_url`, writing into a fresh temporary directory
pub fn test_config(base_url: &str, workers: usize) -> (Config, TempDir) {
    let temp_dir = tempfile::tempdir().unwrap();
    let config = Config {
        base_url: base_url.to_string(),
        api_token: Some("test-token".to_string()),
        output_dir: temp_dir.path().join("squidle_download"),
        workers,
        results_per_page: 100,
        request_timeout: Duration::from_secs(5),
        ..Config::default()
    };
    (config, temp_dir)
}

/// Whether live catalog settings are available
///
/// Reads `.env` if present. Requires:
/// - `SQUIDLE_API_TOKEN` - API token for the catalog
/// - `SQUIDLE_TEST_CAMPAIGN` - A small campaign to download
///
/// Optional:
/// - `SQUIDLE_URL` - Catalog base URL (default: https://soi.squidle.org)
pub fn has_live_credentials() -> bool {
    dotenvy::dotenv().ok();
    std::env::var("SQUIDLE_API_TOKEN").is_ok() && std::env::var("SQUIDLE_TEST_CAMPAIGN").is_ok()
}

/// Config and campaign for the live catalog
pub fn live_config() -> Option<(Config, String, TempDir)> {
    if !has_live_credentials() {
        return None;
    }
    let temp_dir = tempfile::tempdir().ok()?;
    let config = Config {
        base_url: std::env::var("SQUIDLE_URL")
            .unwrap_or_else(|_| "https://soi.squidle.org".to_string()),
        api_token: std::env::var("SQUIDLE_API_TOKEN").ok(),
        output_dir: temp_dir.path().join("squidle_download"),
        workers: 4,
        ..Config::default()
    };
    let campaign = std::env::var("SQUIDLE_TEST_CAMPAIGN").ok()?;
    Some((config, campaign, temp_dir))
}

/// Skip the current test when live credentials are missing
#[macro_export]
macro_rules! skip_if_no_credentials {
    () => {
        if !$crate::common::has_live_credentials() {
            eprintln!("Skipping test: SQUIDLE_API_TOKEN / SQUIDLE_TEST_CAMPAIGN not set");
            return;
        }
    };
}
