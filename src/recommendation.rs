//! Recommendation records and the claims produced from them.
use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Machine-type change for one VM instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VmRecommendation {
    #[serde(rename = "instanceID")]
    pub instance_id: String,
    pub size: String,
    #[serde(rename = "recommendationID")]
    pub recommendation_id: String,
    #[serde(rename = "recommendationETag")]
    pub recommendation_etag: String,
}

/// Removal of `member` from `role`, optionally re-granting it as `add`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IamRecommendation {
    pub project: String,
    pub member: String,
    pub role: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub add: Option<String>,
    #[serde(rename = "recommendationID")]
    pub recommendation_id: String,
    #[serde(rename = "recommendationETag")]
    pub recommendation_etag: String,
}

/// A VM recommendation tied to the declaration name found in state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MatchedVm {
    #[serde(flatten)]
    pub recommendation: VmRecommendation,
    #[serde(rename = "tfResourceName")]
    pub tf_resource_name: String,
}

/// An IAM recommendation tied to the binding declaration found in state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MatchedIam {
    #[serde(flatten)]
    pub recommendation: IamRecommendation,
    #[serde(rename = "resourceName")]
    pub resource_name: String,
    /// Project value exactly as recorded in state.
    #[serde(rename = "stateProject")]
    pub state_project: String,
}

/// Idempotency key of a recommendation whose declaration was edited.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ClaimedRecommendation {
    pub id: String,
    pub etag: String,
}

impl From<&VmRecommendation> for ClaimedRecommendation {
    fn from(rec: &VmRecommendation) -> Self {
        Self {
            id: rec.recommendation_id.clone(),
            etag: rec.recommendation_etag.clone(),
        }
    }
}

impl From<&IamRecommendation> for ClaimedRecommendation {
    fn from(rec: &IamRecommendation) -> Self {
        Self {
            id: rec.recommendation_id.clone(),
            etag: rec.recommendation_etag.clone(),
        }
    }
}

/// Read a JSON array of recommendation records.
pub fn load_recommendations<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>> {
    let bytes =
        fs::read(path).with_context(|| format!("read recommendations {}", path.display()))?;
    serde_json::from_slice(&bytes)
        .with_context(|| format!("parse recommendations JSON {}", path.display()))
}
