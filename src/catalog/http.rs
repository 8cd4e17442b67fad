//! reqwest-backed [`CatalogClient`].

use super::{CatalogClient, Collection, MediaPoseResponse, PageResponse, Query};
use crate::config::Config;
use crate::error::{Error, Result};
use crate::types::MediaId;
use crate::utils::{describe_unparseable_body, resolve_media_url};
use bytes::Bytes;
use reqwest::header::{CONTENT_TYPE, HeaderMap, HeaderValue};
use serde::de::DeserializeOwned;
use url::Url;

/// Header carrying the catalog API token
pub const AUTH_HEADER: &str = "X-Auth-Token";

/// Production catalog client
///
/// One client (and one connection pool) is shared by every worker. The API
/// token is only attached to requests for the catalog's own host, so image
/// URLs pointing at a third-party store never see it.
#[derive(Clone, Debug)]
pub struct HttpCatalog {
    client: reqwest::Client,
    base: Url,
    token: Option<HeaderValue>,
}

impl HttpCatalog {
    /// Build a client from the run configuration
    ///
    /// # Errors
    /// Returns [`Error::Config`] for an unparseable base URL or token, and
    /// [`Error::Network`] if the HTTP client cannot be created.
    pub fn new(config: &Config) -> Result<Self> {
        let base = Url::parse(config.base_url.trim_end_matches('/')).map_err(|e| Error::Config {
            message: format!("invalid base_url '{}': {}", config.base_url, e),
            key: Some("base_url".into()),
        })?;

        let token = config
            .token()
            .map(|t| {
                let mut value = HeaderValue::from_str(t).map_err(|_| Error::Config {
                    message: "API token contains characters not allowed in a header".into(),
                    key: Some("api_token".into()),
                })?;
                value.set_sensitive(true);
                Ok::<_, Error>(value)
            })
            .transpose()?;

        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .default_headers(headers)
            .user_agent(concat!("squidle-dl/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            client,
            base,
            token,
        })
    }

    /// Catalog base URL
    pub fn base_url(&self) -> &Url {
        &self.base
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/api/{}", self.base.as_str().trim_end_matches('/'), path)
    }

    fn get(&self, url: &str) -> reqwest::RequestBuilder {
        let request = self.client.get(url);
        match &self.token {
            Some(token) if self.is_catalog_host(url) => request.header(AUTH_HEADER, token.clone()),
            _ => request,
        }
    }

    fn is_catalog_host(&self, url: &str) -> bool {
        Url::parse(url)
            .map(|u| {
                u.host_str() == self.base.host_str()
                    && u.port_or_known_default() == self.base.port_or_known_default()
            })
            .unwrap_or(false)
    }

    async fn send(&self, request: reqwest::RequestBuilder, url: &str) -> Result<reqwest::Response> {
        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            tracing::debug!(url = %url, status = status.as_u16(), "catalog request failed");
            return Err(Error::Http {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }
        Ok(response)
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        request: reqwest::RequestBuilder,
        url: &str,
    ) -> Result<T> {
        let response = self.send(request, url).await?;
        let body = response.text().await?;
        serde_json::from_str(&body).map_err(|e| Error::Protocol {
            url: url.to_string(),
            message: describe_unparseable_body(&body, &e),
        })
    }
}

#[async_trait::async_trait]
impl CatalogClient for HttpCatalog {
    async fn list_page(
        &self,
        collection: Collection,
        query: &Query,
        page: u32,
        results_per_page: u32,
    ) -> Result<PageResponse> {
        let url = self.endpoint(collection.as_str());
        let q = query.to_param()?;
        let page_param = page.to_string();
        let per_page_param = results_per_page.to_string();
        let request = self.get(&url).query(&[
            ("q", q.as_str()),
            ("page", page_param.as_str()),
            ("results_per_page", per_page_param.as_str()),
            ("single", "true"),
        ]);
        tracing::trace!(url = %url, page, q = %q, "listing page");
        self.get_json(request, &url).await
    }

    async fn media_pose(&self, image_id: MediaId) -> Result<MediaPoseResponse> {
        let url = self.endpoint(&format!("media_poses/{}", image_id));
        let request = self.get(&url);
        self.get_json(request, &url).await
    }

    async fn fetch_bytes(&self, url: &str) -> Result<Bytes> {
        let resolved = resolve_media_url(&self.base, url)?;
        let request = self.get(resolved.as_str());
        let response = self.send(request, resolved.as_str()).await?;
        Ok(response.bytes().await?)
    }

    fn is_catalog_url(&self, url: &str) -> bool {
        resolve_media_url(&self.base, url)
            .map(|resolved| self.is_catalog_host(resolved.as_str()))
            .unwrap_or(false)
    }
}
