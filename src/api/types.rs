//! Request and response types for the HTTP API.

use serde::{Deserialize, Serialize};

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub api_key_configured: bool,
}

/// Body of `POST /analyze`.
///
/// Both fields are optional on the wire: a missing `content` is reported as
/// a 400, a missing or null `isImage` means text.
#[derive(Debug, Deserialize)]
pub struct AnalyzeRequest {
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default, rename = "isImage")]
    pub is_image: Option<bool>,
}

#[derive(Debug, Deserialize)]
pub struct LabelsQuery {
    pub format: Option<String>,
}
