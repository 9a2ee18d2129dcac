use std::collections::BTreeMap;

use serde::{Deserialize, Deserializer, Serialize};

/// Treats an explicit `null` the same as a missing field.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryRequest {
    pub query: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub top_k: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alpha: Option<f32>,
}

impl QueryRequest {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            top_k: None,
            alpha: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryResponse {
    pub answer: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub sources: Vec<Source>,
}

/// A retrieved passage as returned by the backend.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Source {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chunk_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub doc_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub text: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub metadata: SourceMetadata,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SourceMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadResponse {
    pub status: String,
    pub file: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HealthStatus {
    Ok,
    Degraded,
    #[serde(other)]
    Unknown,
}

/// Per-subsystem error lists, empty when the subsystem is healthy.
pub type HealthChecks = BTreeMap<String, Vec<String>>;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: HealthStatus,
    #[serde(default)]
    pub checks: HealthChecks,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReadinessResponse {
    pub ready: bool,
    #[serde(default)]
    pub checks: HealthChecks,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn query_request_omits_unset_options() {
        let body = serde_json::to_value(QueryRequest::new("hello")).expect("serialize");
        assert_eq!(body, serde_json::json!({ "query": "hello" }));
    }

    #[test]
    fn missing_or_null_sources_default_to_empty() {
        let missing: QueryResponse =
            serde_json::from_str(r#"{"answer":"a"}"#).expect("missing sources");
        assert!(missing.sources.is_empty());

        let null: QueryResponse =
            serde_json::from_str(r#"{"answer":"a","sources":null}"#).expect("null sources");
        assert!(null.sources.is_empty());
    }

    #[test]
    fn response_without_answer_is_rejected() {
        let parsed = serde_json::from_str::<QueryResponse>(r#"{"sources":[]}"#);
        assert!(parsed.is_err());
    }

    #[test]
    fn source_keeps_unknown_metadata_keys() {
        let source: Source = serde_json::from_str(
            r#"{
                "doc_id": "d1",
                "chunk_id": "d1_0",
                "title": null,
                "text": "passage",
                "metadata": {"url": "https://example.com", "source": "upload"}
            }"#,
        )
        .expect("source");
        assert_eq!(source.title, None);
        assert_eq!(source.metadata.url.as_deref(), Some("https://example.com"));
        assert_eq!(
            source.metadata.extra.get("source"),
            Some(&serde_json::Value::String("upload".into()))
        );
    }

    #[test]
    fn unknown_health_status_does_not_fail() {
        let health: HealthResponse =
            serde_json::from_str(r#"{"status":"starting","checks":{"elastic":[]}}"#)
                .expect("health");
        assert_eq!(health.status, HealthStatus::Unknown);
        assert_eq!(health.checks.get("elastic"), Some(&Vec::new()));
    }
}
