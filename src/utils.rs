//! Utility functions for paths, URLs and response diagnostics

use crate::error::{Error, Result};
use crate::types::{DeploymentId, MediaId};
use std::path::{Path, PathBuf};
use url::Url;

/// Maximum number of body characters quoted in protocol errors
const BODY_SNIPPET_CHARS: usize = 120;

/// Destination of one downloaded image
///
/// The layout is `<root>/<deployment_id>/<image_id>.<extension>`. Distinct
/// `(deployment_id, image_id)` pairs always map to distinct paths, which is
/// what lets download workers write without coordination.
///
/// # Examples
///
/// ```
/// use squidle_dl::utils::image_path;
/// use squidle_dl::{DeploymentId, MediaId};
/// use std::path::Path;
///
/// let path = image_path(Path::new("out"), DeploymentId(10), MediaId(500), "png");
/// assert_eq!(path, Path::new("out/10/500.png"));
/// ```
pub fn image_path(
    root: &Path,
    deployment_id: DeploymentId,
    image_id: MediaId,
    extension: &str,
) -> PathBuf {
    deployment_dir(root, deployment_id).join(format!("{}.{}", image_id, extension))
}

/// Directory holding all images of one deployment
pub fn deployment_dir(root: &Path, deployment_id: DeploymentId) -> PathBuf {
    root.join(deployment_id.to_string())
}

/// Create a directory and its parents, succeeding if it already exists
///
/// Several download workers may race to create the same deployment directory.
pub async fn ensure_dir(path: &Path) -> Result<()> {
    match tokio::fs::create_dir_all(path).await {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists && path.is_dir() => Ok(()),
        Err(e) => Err(Error::io_at(path, e)),
    }
}

/// Turn an image path from the catalog into an absolute URL
///
/// Surrounding whitespace is stripped. Absolute URLs are returned as-is; paths
/// relative to the catalog (e.g. `/static/x.jpg`) are joined onto `base`.
pub fn resolve_media_url(base: &Url, raw: &str) -> Result<Url> {
    let trimmed = raw.trim();
    match Url::parse(trimmed) {
        Ok(url) => Ok(url),
        Err(url::ParseError::RelativeUrlWithoutBase) => {
            base.join(trimmed).map_err(|source| Error::InvalidUrl {
                url: trimmed.to_string(),
                source,
            })
        }
        Err(source) => Err(Error::InvalidUrl {
            url: trimmed.to_string(),
            source,
        }),
    }
}

/// Explain why a response body could not be parsed as JSON
///
/// The catalog answers some failures with an HTML page (status 200 included),
/// so those are called out explicitly instead of surfacing a bare parse error.
pub fn describe_unparseable_body(body: &str, error: &serde_json::Error) -> String {
    let trimmed = body.trim_start();
    if trimmed.is_empty() {
        return "empty response body".to_string();
    }
    if trimmed.starts_with('<') {
        let title = html_heading(trimmed).unwrap_or_else(|| snippet(trimmed));
        return format!("expected JSON, got HTML error page ({})", title);
    }
    format!("invalid JSON: {} (body starts: {:?})", error, snippet(trimmed))
}

fn html_heading(body: &str) -> Option<String> {
    for tag in ["h1", "title"] {
        let open = format!("<{}>", tag);
        let close = format!("</{}>", tag);
        if let Some(start) = body.find(&open) {
            let rest = &body[start + open.len()..];
            if let Some(end) = rest.find(&close) {
                let text = rest[..end].trim();
                if !text.is_empty() {
                    return Some(text.to_string());
                }
            }
        }
    }
    None
}

fn snippet(body: &str) -> String {
    body.chars().take(BODY_SNIPPET_CHARS).collect()
}
