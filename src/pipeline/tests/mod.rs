use super::test_helpers::{FakeCatalog, Fault, create_test_pipeline, demo_catalog, test_config};
use super::*;
use crate::error::Error;
use crate::manifest::Manifest;
use crate::types::{DeploymentId, MediaId, MediaRef};


fn names(campaigns: &[&str]) -> Vec<String> {
    campaigns.iter().map(|c| c.to_string()).collect()
}

fn refs(deployment_id: i64, ids: impl IntoIterator<Item = i64>) -> Vec<MediaRef> {
    ids.into_iter()
        .map(|id| MediaRef::new(id, deployment_id))
        .collect()
}
