//! A wiremock-backed catalog server serving campaigns, media listings, poses and images

use serde_json::{Value, json};
use std::collections::HashMap;
use std::sync::Arc;
use wiremock::matchers::{method, path, path_regex};
use wiremock::{Mock, MockServer, Request, Respond, ResponseTemplate};

/// In-memory catalog contents
#[derive(Clone, Debug, Default)]
pub struct CatalogData {
    /// Campaign name -> deployment ids
    pub campaigns: HashMap<String, Vec<i64>>,
    /// Deployment id -> media ids
    pub deployments: HashMap<i64, Vec<i64>>,
    /// Media ids whose pose lookup answers with an HTML error page
    pub broken_poses: Vec<i64>,
    /// Media ids whose image answers 404
    pub missing_images: Vec<i64>,
    /// Media ids whose image answers 403, as an object store does for a missing key
    pub forbidden_images: Vec<i64>,
    /// Media ids whose image URL points at a port nothing listens on
    pub unreachable_images: Vec<i64>,
}

impl CatalogData {
    /// Builder: add a campaign
    pub fn campaign(mut self, name: &str, deployments: &[i64]) -> Self {
        self.campaigns.insert(name.to_string(), deployments.to_vec());
        self
    }

    /// Builder: add a deployment with its media ids
    pub fn deployment(mut self, id: i64, media: impl IntoIterator<Item = i64>) -> Self {
        self.deployments.insert(id, media.into_iter().collect());
        self
    }
}

/// Bytes served for one image
pub fn image_bytes(image_id: i64) -> Vec<u8> {
    format!("\u{89}PNG fake image {image_id}").into_bytes()
}

/// Expected latitude of one image
pub fn image_lat(image_id: i64) -> f64 {
    -42.0 - image_id as f64 / 10_000.0
}

/// The demo campaign: deployment 10 with 150 images, deployment 11 empty
pub fn demo_data() -> CatalogData {
    CatalogData::default()
        .campaign("demo_campaign", &[10, 11])
        .deployment(10, 500..650)
        .deployment(11, [])
}

struct ListingResponder {
    data: Arc<CatalogData>,
    deployments: bool,
}

impl ListingResponder {
    fn ids(&self, q: &Value) -> Vec<i64> {
        let filter = &q["filters"][0];
        if self.deployments {
            let name = filter["val"]["val"].as_str().unwrap_or_default();
            self.data.campaigns.get(name).cloned().unwrap_or_default()
        } else {
            let id = filter["val"].as_i64().unwrap_or_default();
            self.data.deployments.get(&id).cloned().unwrap_or_default()
        }
    }
}

impl Respond for ListingResponder {
    fn respond(&self, request: &Request) -> ResponseTemplate {
        let params: HashMap<String, String> = request.url.query_pairs().into_owned().collect();
        let Some(q) = params.get("q").and_then(|q| serde_json::from_str::<Value>(q).ok()) else {
            return ResponseTemplate::new(400).set_body_string("<h1>400</h1>");
        };
        let page: usize = params.get("page").and_then(|p| p.parse().ok()).unwrap_or(1);
        let per_page: usize = params
            .get("results_per_page")
            .and_then(|p| p.parse().ok())
            .unwrap_or(10);

        let ids = self.ids(&q);
        let deployment_id = if self.deployments {
            None
        } else {
            q["filters"][0]["val"].as_i64()
        };
        let objects: Vec<Value> = ids
            .iter()
            .skip((page - 1) * per_page)
            .take(per_page)
            .map(|id| match deployment_id {
                Some(dep) => json!({"id": id, "deployment_id": dep}),
                None => json!({"id": id, "name": format!("deployment {id}")}),
            })
            .collect();

        ResponseTemplate::new(200).set_body_json(json!({
            "num_results": ids.len(),
            "page": page,
            "total_pages": ids.len().div_ceil(per_page).max(1),
            "objects": objects,
        }))
    }
}

struct PoseResponder {
    data: Arc<CatalogData>,
    image_base: String,
    closed_base: String,
}

impl Respond for PoseResponder {
    fn respond(&self, request: &Request) -> ResponseTemplate {
        let id: i64 = request
            .url
            .path()
            .rsplit('/')
            .next()
            .and_then(|s| s.parse().ok())
            .unwrap_or_default();

        if self.data.broken_poses.contains(&id) {
            return ResponseTemplate::new(200)
                .set_body_string("<html><body><h1>500</h1></body></html>");
        }

        let base = if self.data.unreachable_images.contains(&id) {
            &self.closed_base
        } else {
            &self.image_base
        };
        ResponseTemplate::new(200).set_body_json(json!({
            "id": id,
            "media": {
                "id": id,
                "path_best": format!("{}/images/{}.jpg ", base, id),
            },
            "pose": {
                "timestamp": "2021-05-01 10:00:00",
                "lat": image_lat(id),
                "lon": 147.3,
                "dep": "31.5",
                "alt": 2.1,
            },
        }))
    }
}

struct ImageResponder {
    data: Arc<CatalogData>,
}

impl Respond for ImageResponder {
    fn respond(&self, request: &Request) -> ResponseTemplate {
        let id: i64 = request
            .url
            .path()
            .trim_start_matches("/images/")
            .trim_end_matches(".jpg")
            .parse()
            .unwrap_or_default();
        if self.data.missing_images.contains(&id) {
            return ResponseTemplate::new(404);
        }
        if self.data.forbidden_images.contains(&id) {
            return ResponseTemplate::new(403)
                .set_body_string("<Error><Code>AccessDenied</Code></Error>");
        }
        ResponseTemplate::new(200).set_body_bytes(image_bytes(id))
    }
}

/// Catalog API and image store on separate mock servers
pub struct MockCatalog {
    /// Serves `/api/...`
    pub api: MockServer,
    /// Serves `/images/<id>.jpg`
    pub images: MockServer,
}

impl MockCatalog {
    /// Start both servers and mount every route
    pub async fn start(data: CatalogData) -> Self {
        let api = MockServer::start().await;
        let images = MockServer::start().await;
        let data = Arc::new(data);
        let closed_port = {
            let listener = std::net::TcpListener::bind("127.0.0.1:0").expect("bind local port");
            listener.local_addr().expect("local address").port()
        };

        Mock::given(method("GET"))
            .and(path("/api/deployment"))
            .respond_with(ListingResponder {
                data: data.clone(),
                deployments: true,
            })
            .mount(&api)
            .await;

        Mock::given(method("GET"))
            .and(path("/api/media"))
            .respond_with(ListingResponder {
                data: data.clone(),
                deployments: false,
            })
            .mount(&api)
            .await;

        Mock::given(method("GET"))
            .and(path_regex(r"^/api/media_poses/\d+$"))
            .respond_with(PoseResponder {
                data: data.clone(),
                image_base: images.uri(),
                closed_base: format!("http://127.0.0.1:{closed_port}"),
            })
            .mount(&api)
            .await;

        Mock::given(method("GET"))
            .and(path_regex(r"^/images/\d+\.jpg$"))
            .respond_with(ImageResponder { data })
            .mount(&images)
            .await;

        Self { api, images }
    }

    /// Requests received by the image store
    pub async fn image_requests(&self) -> Vec<Request> {
        self.images.received_requests().await.unwrap_or_default()
    }

    /// Requests received by the catalog API
    pub async fn api_requests(&self) -> Vec<Request> {
        self.api.received_requests().await.unwrap_or_default()
    }
}
