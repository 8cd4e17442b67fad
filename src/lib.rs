//! # squidle-dl
//!
//! Dataset acquisition from a SQUIDLE+ style marine imagery catalog.
//!
//! Given one or more campaign names, the pipeline:
//! 1. resolves each campaign to its deployments,
//! 2. lists every media item of every deployment (walking all pages),
//! 3. looks up pose and image URL for every item in parallel and writes a
//!    CSV manifest,
//! 4. downloads every image in parallel into `<output>/<deployment>/<image>.<ext>`.
//!
//! Units that fail are isolated and reported; only systemic errors (server
//! unreachable, credentials rejected) abort the run.
//!
//! ## Quick Start
//!
//! ```no_run
//! use squidle_dl::{Config, Pipeline};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config {
//!         api_token: Some("my-token".to_string()),
//!         output_dir: "squidle_download".into(),
//!         ..Default::default()
//!     };
//!
//!     let pipeline = Pipeline::new(config)?;
//!
//!     // Subscribe to events
//!     let mut events = pipeline.subscribe();
//!     tokio::spawn(async move {
//!         while let Ok(event) = events.recv().await {
//!             println!("Event: {:?}", event);
//!         }
//!     });
//!
//!     let summary = pipeline.run(&["demo_campaign".to_string()]).await?;
//!     println!("{} images downloaded", summary.images_downloaded);
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

/// Catalog API access
pub mod catalog;
/// Configuration types
pub mod config;
/// Error types
pub mod error;
/// Manifest table and CSV encoding
pub mod manifest;
/// Bounded unordered parallel map
pub mod parallel;
/// Acquisition pipeline (decomposed into one submodule per stage)
pub mod pipeline;
/// Core types and events
pub mod types;
/// Utility functions
pub mod utils;

// Re-export commonly used types
pub use catalog::{CatalogClient, HttpCatalog};
pub use config::Config;
pub use error::{Error, Result};
pub use manifest::{Manifest, ManifestRow};
pub use pipeline::Pipeline;
pub use types::{DeploymentId, Event, ItemFailure, MediaId, MediaRef, RunSummary, Stage};

use tokio_util::sync::CancellationToken;

/// Cancel `token` when a termination signal arrives.
///
/// Spawns a task that waits for a signal and then cancels the token, so a
/// running pipeline stops starting new units, lets in-flight units finish and
/// writes what it has.
///
/// Listens for SIGTERM and Ctrl-C on Unix, Ctrl-C elsewhere. A signal whose
/// handler cannot be installed is skipped with a warning.
///
/// # Example
///
/// ```no_run
/// use squidle_dl::{Config, Pipeline, cancel_on_signal};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let pipeline = Pipeline::new(Config::default())?;
///     cancel_on_signal(pipeline.cancellation_token());
///
///     let summary = pipeline.run(&["demo_campaign".to_string()]).await?;
///     if summary.cancelled {
///         eprintln!("interrupted; manifest holds what was collected");
///     }
///     Ok(())
/// }
/// ```
pub fn cancel_on_signal(token: CancellationToken) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        tokio::select! {
            _ = wait_for_signal() => {
                tracing::warn!("shutdown requested, finishing in-flight work");
                token.cancel();
            }
            _ = token.cancelled() => {}
        }
    })
}

/// Resolves on Ctrl-C; never resolves if the handler cannot be installed
async fn interrupt() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "cannot listen for Ctrl-C");
        std::future::pending::<()>().await;
    }
}

#[cfg(unix)]
async fn wait_for_signal() {
    use tokio::signal::unix::{SignalKind, signal};

    let terminate = async {
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::warn!(error = %e, "cannot listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    tokio::select! {
        _ = terminate => tracing::info!(signal = "SIGTERM", "signal received"),
        _ = interrupt() => tracing::info!(signal = "SIGINT", "signal received"),
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() {
    interrupt().await;
    tracing::info!(signal = "ctrl-c", "signal received");
}
