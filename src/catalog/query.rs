//! Structured filter queries for catalog collection endpoints.
//!
//! The catalog accepts a JSON document in the `q` parameter:
//!
//! ```json
//! {"filters": [{"name": "campaign", "op": "has",
//!               "val": {"name": "name", "op": "eq", "val": "demo_campaign"}}]}
//! ```

use serde::{Deserialize, Serialize};

/// Comparison operator understood by the catalog
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterOp {
    /// Field equals value
    Eq,
    /// Field does not equal value
    Neq,
    /// Field value is one of a list
    In,
    /// Relationship (to-one or to-many) has an object matching a nested filter
    Has,
    /// To-many relationship has any object matching a nested filter
    Any,
}

/// Right-hand side of a filter
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FilterValue {
    /// Comparison against another filter (used with `has`/`any`)
    Nested(Box<Filter>),
    /// Plain JSON scalar or list
    Value(serde_json::Value),
}

/// A single `{name, op, val}` filter
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Filter {
    /// Field or relationship name
    pub name: String,
    /// Operator
    pub op: FilterOp,
    /// Value or nested filter
    pub val: FilterValue,
}

impl Filter {
    /// `name == val`
    pub fn eq(name: impl Into<String>, val: impl Into<serde_json::Value>) -> Self {
        Self {
            name: name.into(),
            op: FilterOp::Eq,
            val: FilterValue::Value(val.into()),
        }
    }

    /// `name` relationship has an object matching `inner`
    pub fn has(name: impl Into<String>, inner: Filter) -> Self {
        Self {
            name: name.into(),
            op: FilterOp::Has,
            val: FilterValue::Nested(Box::new(inner)),
        }
    }
}

/// Full `q` document
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Query {
    /// Filters, combined with AND by the server
    pub filters: Vec<Filter>,
}

impl Query {
    /// Query with one filter
    pub fn single(filter: Filter) -> Self {
        Self {
            filters: vec![filter],
        }
    }

    /// Deployments belonging to the campaign called `name`
    pub fn campaign_deployments(name: &str) -> Self {
        Self::single(Filter::has("campaign", Filter::eq("name", name)))
    }

    /// Media items of one deployment
    pub fn deployment_media(deployment_id: i64) -> Self {
        Self::single(Filter::eq("deployment_id", deployment_id))
    }

    /// JSON text for the `q` parameter
    pub fn to_param(&self) -> crate::Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}
