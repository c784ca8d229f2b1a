use serde::{Deserialize, Serialize};

use crate::domain::ObjectReference;

use super::LabelingError;

pub fn build_request(
    reference: &ObjectReference,
    min_confidence: f32,
    max_labels: u32,
) -> DetectLabelsRequest {
    DetectLabelsRequest {
        image: Image {
            s3_object: S3Object {
                bucket: reference.container_name.clone(),
                name: reference.object_key.clone(),
            },
        },
        min_confidence,
        max_labels,
    }
}

/// Decodes a response body into label names, dropping entries without a usable name.
/// Confidence scores are not kept; the service already filtered on them.
pub fn parse_response(body: &[u8]) -> Result<Vec<String>, LabelingError> {
    let response: DetectLabelsResponse = serde_json::from_slice(body)?;
    let labels = response
        .labels
        .unwrap_or_default()
        .into_iter()
        .filter_map(|label| label.name)
        .filter(|name| !name.trim().is_empty())
        .collect();
    Ok(labels)
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct DetectLabelsRequest {
    pub image: Image,
    pub min_confidence: f32,
    pub max_labels: u32,
}

#[derive(Debug, Serialize)]
pub struct Image {
    #[serde(rename = "S3Object")]
    pub s3_object: S3Object,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct S3Object {
    pub bucket: String,
    pub name: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct DetectLabelsResponse {
    #[serde(default)]
    pub labels: Option<Vec<DetectedLabel>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct DetectedLabel {
    #[serde(default)]
    pub name: Option<String>,
}
