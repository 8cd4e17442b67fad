//! Response documents returned by the catalog API.
//!
//! Numeric fields are accepted either as JSON numbers or as numeric strings;
//! some catalog versions serialize decimals as text.

use serde::{Deserialize, Deserializer};

/// One page of a collection listing
#[derive(Clone, Debug, Deserialize)]
pub struct PageResponse {
    /// Total matches across all pages
    #[serde(default, deserialize_with = "lenient::u64_or_zero")]
    pub num_results: u64,
    /// Page number echoed by the server
    #[serde(default)]
    pub page: Option<u32>,
    /// Page count computed by the server
    #[serde(default)]
    pub total_pages: Option<u32>,
    /// Matching objects on this page
    #[serde(default)]
    pub objects: Vec<Record>,
}

/// A listed object; only the identity fields are kept
#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct Record {
    /// Object id
    #[serde(deserialize_with = "lenient::int")]
    pub id: i64,
    /// Parent deployment (media listings only)
    #[serde(default, deserialize_with = "lenient::opt_int")]
    pub deployment_id: Option<i64>,
}

/// Response of `/api/media_poses/<id>`
#[derive(Clone, Debug, Default, Deserialize)]
pub struct MediaPoseResponse {
    /// Media attributes
    #[serde(default)]
    pub media: Option<MediaWire>,
    /// Pose attributes
    #[serde(default)]
    pub pose: Option<PoseWire>,
}

/// Media attributes of a pose response
#[derive(Clone, Debug, Default, Deserialize)]
pub struct MediaWire {
    /// Best-quality image URL
    #[serde(default)]
    pub path_best: Option<String>,
}

/// Pose attributes of a pose response
#[derive(Clone, Debug, Default, Deserialize)]
pub struct PoseWire {
    /// Capture time, passed through as text; empty text reads as absent
    #[serde(default, deserialize_with = "lenient::opt_text")]
    pub timestamp: Option<String>,
    /// Latitude
    #[serde(default, deserialize_with = "lenient::opt_f64")]
    pub lat: Option<f64>,
    /// Longitude
    #[serde(default, deserialize_with = "lenient::opt_f64")]
    pub lon: Option<f64>,
    /// Depth
    #[serde(default, deserialize_with = "lenient::opt_f64")]
    pub dep: Option<f64>,
    /// Altitude
    #[serde(default, deserialize_with = "lenient::opt_f64")]
    pub alt: Option<f64>,
}

pub(crate) mod lenient {
    use super::*;
    use serde::de::Error as _;
    use serde_json::Value;

    fn number_f64(value: &Value) -> Option<f64> {
        match value {
            Value::Number(n) => n.as_f64(),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    fn number_i64(value: &Value) -> Option<i64> {
        match value {
            Value::Number(n) => n
                .as_i64()
                .or_else(|| n.as_f64().filter(|f| f.fract() == 0.0).map(|f| f as i64)),
            Value::String(s) => {
                let s = s.trim();
                s.parse().ok().or_else(|| {
                    s.parse::<f64>()
                        .ok()
                        .filter(|f| f.fract() == 0.0)
                        .map(|f| f as i64)
                })
            }
            _ => None,
        }
    }

    pub fn int<'de, D: Deserializer<'de>>(d: D) -> Result<i64, D::Error> {
        let value = Value::deserialize(d)?;
        number_i64(&value).ok_or_else(|| D::Error::custom(format!("expected integer, got {value}")))
    }

    pub fn opt_int<'de, D: Deserializer<'de>>(d: D) -> Result<Option<i64>, D::Error> {
        match Value::deserialize(d)? {
            Value::Null => Ok(None),
            value => number_i64(&value)
                .map(Some)
                .ok_or_else(|| D::Error::custom(format!("expected integer, got {value}"))),
        }
    }

    pub fn u64_or_zero<'de, D: Deserializer<'de>>(d: D) -> Result<u64, D::Error> {
        match Value::deserialize(d)? {
            Value::Null => Ok(0),
            value => number_i64(&value)
                .and_then(|n| u64::try_from(n).ok())
                .ok_or_else(|| D::Error::custom(format!("expected count, got {value}"))),
        }
    }

    // Non-numeric text becomes None so the row builder can name the field.
    pub fn opt_f64<'de, D: Deserializer<'de>>(d: D) -> Result<Option<f64>, D::Error> {
        let value = Value::deserialize(d)?;
        Ok(number_f64(&value))
    }

    pub fn opt_text<'de, D: Deserializer<'de>>(d: D) -> Result<Option<String>, D::Error> {
        Ok(match Value::deserialize(d)? {
            Value::Null => None,
            Value::String(s) if s.trim().is_empty() => None,
            Value::String(s) => Some(s),
            other => Some(other.to_string()),
        })
    }
}
