//! Catalog server access.
//!
//! - [`query`] - Structured `{name, op, val}` filter documents
//! - [`wire`] - Response documents
//! - [`http`] - Production client over reqwest
//! - [`pagination`] - Walking every page of a listing
//!
//! Pipeline stages only see the [`CatalogClient`] trait, so they can be driven
//! by an in-memory catalog in tests.

pub mod http;
pub mod pagination;
pub mod query;
pub mod wire;

pub use http::HttpCatalog;
pub use pagination::fetch_all;
pub use query::{Filter, FilterOp, FilterValue, Query};
pub use wire::{MediaPoseResponse, PageResponse, Record};

use crate::error::Result;
use crate::types::MediaId;
use bytes::Bytes;

/// Collection endpoints that support filtered listing
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Collection {
    /// `/api/deployment`
    Deployment,
    /// `/api/media`
    Media,
}

impl Collection {
    /// Path segment under `/api/`
    pub fn as_str(&self) -> &'static str {
        match self {
            Collection::Deployment => "deployment",
            Collection::Media => "media",
        }
    }
}

impl std::fmt::Display for Collection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Abstraction over the catalog HTTP API, enabling testability.
#[async_trait::async_trait]
pub trait CatalogClient: Send + Sync {
    /// Fetch one page (1-based) of a filtered collection listing
    async fn list_page(
        &self,
        collection: Collection,
        query: &Query,
        page: u32,
        results_per_page: u32,
    ) -> Result<PageResponse>;

    /// Fetch pose and media path for one image
    async fn media_pose(&self, image_id: MediaId) -> Result<MediaPoseResponse>;

    /// Fetch the raw bytes behind an image URL
    async fn fetch_bytes(&self, url: &str) -> Result<Bytes>;

    /// Whether `url` is served by the catalog itself rather than a separate image store
    ///
    /// Rejected credentials or a refused connection only say something about
    /// the whole run when they come from the catalog host.
    fn is_catalog_url(&self, _url: &str) -> bool {
        false
    }
}
