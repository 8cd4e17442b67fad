//! Shared test helpers: an in-memory catalog and pipeline constructors.

use crate::catalog::{
    CatalogClient, Collection, FilterValue, MediaPoseResponse, PageResponse, Query, Record,
    wire::{MediaWire, PoseWire},
};
use crate::config::Config;
use crate::error::{Error, Result};
use crate::pipeline::Pipeline;
use crate::types::MediaId;
use bytes::Bytes;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;

/// A failure the fake catalog can be told to produce
#[derive(Clone, Copy, Debug)]
pub(crate) enum Fault {
    /// Non-success HTTP status
    Status(u16),
    /// HTML error page where JSON was expected
    Html,
    /// Pose record without coordinates
    MissingPose,
    /// Panic inside the call
    Panic,
}

impl Fault {
    fn into_error(self, what: &str) -> Error {
        match self {
            Fault::Status(status) => Error::Http {
                status,
                url: format!("fake://{what}"),
            },
            Fault::Html => Error::Protocol {
                url: format!("fake://{what}"),
                message: "expected JSON, got HTML error page (500)".into(),
            },
            Fault::MissingPose => Error::Other("missing pose is not a transport fault".into()),
            Fault::Panic => panic!("injected panic for {what}"),
        }
    }
}

/// In-memory catalog
///
/// Campaigns map to deployments, deployments to media ids. Pose lookups and
/// image bytes are synthesized from the media id unless a fault is injected.
#[derive(Default)]
pub(crate) struct FakeCatalog {
    campaigns: HashMap<String, Vec<i64>>,
    deployments: HashMap<i64, Vec<i64>>,
    campaign_faults: HashMap<String, Fault>,
    deployment_faults: HashMap<i64, Fault>,
    pose_faults: HashMap<i64, Fault>,
    image_faults: HashMap<i64, Fault>,
    /// Stagger pose and byte calls so completion order differs from input order
    jitter: bool,
    delay: Option<Duration>,
    /// Images are served by the catalog host rather than a separate store
    images_on_catalog_host: bool,
    pub pose_calls: AtomicUsize,
    pub byte_calls: AtomicUsize,
    pub active: AtomicUsize,
    pub peak: AtomicUsize,
    pub listed: Mutex<Vec<(Collection, u32)>>,
}

impl FakeCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn campaign(mut self, name: &str, deployments: &[i64]) -> Self {
        self.campaigns.insert(name.to_string(), deployments.to_vec());
        self
    }

    pub fn deployment(mut self, id: i64, media: impl IntoIterator<Item = i64>) -> Self {
        self.deployments.insert(id, media.into_iter().collect());
        self
    }

    pub fn fail_campaign(mut self, name: &str, fault: Fault) -> Self {
        self.campaign_faults.insert(name.to_string(), fault);
        self
    }

    pub fn fail_deployment(mut self, id: i64, fault: Fault) -> Self {
        self.deployment_faults.insert(id, fault);
        self
    }

    pub fn fail_pose(mut self, image_id: i64, fault: Fault) -> Self {
        self.pose_faults.insert(image_id, fault);
        self
    }

    pub fn fail_image(mut self, image_id: i64, fault: Fault) -> Self {
        self.image_faults.insert(image_id, fault);
        self
    }

    pub fn with_jitter(mut self) -> Self {
        self.jitter = true;
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn serve_images_from_catalog(mut self) -> Self {
        self.images_on_catalog_host = true;
        self
    }

    pub fn pose_calls(&self) -> usize {
        self.pose_calls.load(Ordering::SeqCst)
    }

    pub fn byte_calls(&self) -> usize {
        self.byte_calls.load(Ordering::SeqCst)
    }

    pub fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }

    /// URL the fake serves for one image
    pub fn image_url(image_id: i64) -> String {
        format!("https://images.test/{image_id}.jpg")
    }

    /// Bytes the fake serves for one image
    pub fn image_bytes(image_id: i64) -> Vec<u8> {
        format!("image-{image_id}").into_bytes()
    }

    async fn unit_started(&self, id: i64) {
        let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        if self.jitter {
            let millis = (id.unsigned_abs() * 7) % 5;
            tokio::time::sleep(Duration::from_millis(millis)).await;
        }
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
    }

    fn unit_finished(&self) {
        self.active.fetch_sub(1, Ordering::SeqCst);
    }

    fn ids_for(&self, collection: Collection, query: &Query) -> Result<Vec<i64>> {
        let filter = query
            .filters
            .first()
            .ok_or_else(|| Error::Other("query has no filter".into()))?;
        match (collection, &filter.val) {
            (Collection::Deployment, FilterValue::Nested(inner)) => {
                let FilterValue::Value(name) = &inner.val else {
                    return Err(Error::Other("campaign filter has no name".into()));
                };
                let name = name.as_str().unwrap_or_default();
                if let Some(fault) = self.campaign_faults.get(name) {
                    return Err(fault.into_error(name));
                }
                Ok(self.campaigns.get(name).cloned().unwrap_or_default())
            }
            (Collection::Media, FilterValue::Value(id)) => {
                let id = id.as_i64().unwrap_or_default();
                if let Some(fault) = self.deployment_faults.get(&id) {
                    return Err(fault.into_error(&format!("deployment/{id}")));
                }
                Ok(self.deployments.get(&id).cloned().unwrap_or_default())
            }
            _ => Err(Error::Other(format!("unexpected {collection} query"))),
        }
    }
}

#[async_trait::async_trait]
impl CatalogClient for FakeCatalog {
    async fn list_page(
        &self,
        collection: Collection,
        query: &Query,
        page: u32,
        results_per_page: u32,
    ) -> Result<PageResponse> {
        self.listed.lock().unwrap().push((collection, page));
        let ids = self.ids_for(collection, query)?;
        let deployment_id = match (collection, query.filters.first().map(|f| &f.val)) {
            (Collection::Media, Some(FilterValue::Value(v))) => v.as_i64(),
            _ => None,
        };

        let per_page = results_per_page as usize;
        let start = (page as usize - 1) * per_page;
        let objects = ids
            .iter()
            .skip(start)
            .take(per_page)
            .map(|&id| Record { id, deployment_id })
            .collect();

        Ok(PageResponse {
            num_results: ids.len() as u64,
            page: Some(page),
            total_pages: None,
            objects,
        })
    }

    async fn media_pose(&self, image_id: MediaId) -> Result<MediaPoseResponse> {
        self.pose_calls.fetch_add(1, Ordering::SeqCst);
        self.unit_started(image_id.get()).await;
        let id = image_id.get();
        let result = match self.pose_faults.get(&id) {
            Some(Fault::MissingPose) => Ok(MediaPoseResponse {
                media: Some(MediaWire {
                    path_best: Some(Self::image_url(id)),
                }),
                pose: None,
            }),
            Some(fault) => Err(fault.into_error(&format!("media_poses/{id}"))),
            None => Ok(MediaPoseResponse {
                media: Some(MediaWire {
                    path_best: Some(Self::image_url(id)),
                }),
                pose: Some(PoseWire {
                    timestamp: Some(format!("2021-05-01 10:{:02}:00", id % 60)),
                    lat: Some(-42.0 - id as f64 / 1000.0),
                    lon: Some(147.0 + id as f64 / 1000.0),
                    dep: Some(30.0),
                    alt: Some(2.0),
                }),
            }),
        };
        self.unit_finished();
        result
    }

    async fn fetch_bytes(&self, url: &str) -> Result<Bytes> {
        self.byte_calls.fetch_add(1, Ordering::SeqCst);
        let id: i64 = url
            .trim_start_matches("https://images.test/")
            .trim_end_matches(".jpg")
            .parse()
            .map_err(|_| Error::Other(format!("unknown image url {url}")))?;
        self.unit_started(id).await;
        let result = match self.image_faults.get(&id) {
            Some(fault) => Err(fault.into_error(url)),
            None => Ok(Bytes::from(Self::image_bytes(id))),
        };
        self.unit_finished();
        result
    }

    fn is_catalog_url(&self, _url: &str) -> bool {
        self.images_on_catalog_host
    }
}

/// Config writing into a fresh temporary directory
pub(crate) fn test_config(workers: usize) -> (Config, TempDir) {
    let temp_dir = tempfile::tempdir().unwrap();
    let config = Config {
        output_dir: temp_dir.path().join("out"),
        workers,
        results_per_page: 100,
        ..Config::default()
    };
    (config, temp_dir)
}

/// Pipeline over `catalog`; keep the returned tempdir alive for the test
pub(crate) fn create_test_pipeline(
    catalog: FakeCatalog,
    workers: usize,
) -> (Pipeline, Arc<FakeCatalog>, TempDir) {
    let (config, temp_dir) = test_config(workers);
    let catalog = Arc::new(catalog);
    let pipeline = Pipeline::with_catalog(config, catalog.clone()).unwrap();
    (pipeline, catalog, temp_dir)
}

/// The campaign used by most tests: two deployments, 150 images in the first
pub(crate) fn demo_catalog() -> FakeCatalog {
    FakeCatalog::new()
        .campaign("demo_campaign", &[10, 11])
        .deployment(10, 500..650)
        .deployment(11, [])
}
