//! HTTP client for the plan-consultation backend (status, initialize, chat).
//! Single request/response per call; no retries or backoff — failures
//! surface to the caller as [`ApiError`].

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

const DEFAULT_BASE_URL: &str = "http://127.0.0.1:5002/api";

/// Backend readiness as reported by `GET /status`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SystemStatus {
    pub embeddings_model_loaded: bool,
    pub chain_loaded: bool,
    /// Whether the vector store is loaded. Informational; not part of the readiness decision.
    #[serde(default)]
    pub data_loaded: bool,
    /// Number of documents in the vector store, when reported.
    #[serde(default)]
    pub data_size: Option<u64>,
}

impl SystemStatus {
    /// True when both subsystems needed to answer queries are loaded.
    pub fn is_ready(&self) -> bool {
        self.embeddings_model_loaded && self.chain_loaded
    }
}

/// Answer payload from `POST /chat`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatAnswer {
    pub response: String,
    /// Number of source passages the answer was grounded on. Absent means "not reported", not zero.
    #[serde(default)]
    pub passages_used: Option<u32>,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    query: &'a str,
    top_k: u32,
}

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("backend request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("backend returned {status} {reason}")]
    Status { status: u16, reason: String },
    #[error("could not decode backend response: {0}")]
    Decode(#[from] serde_json::Error),
}

/// The three remote calls the chat core depends on. Implemented by
/// [`PlanApiClient`]; tests substitute their own doubles. None of these
/// touch conversation state or the submission gate — that is the caller's
/// job.
#[async_trait]
pub trait PlanBackend: Send + Sync {
    async fn fetch_status(&self) -> Result<SystemStatus, ApiError>;
    async fn trigger_initialize(&self) -> Result<bool, ApiError>;
    async fn send_chat(&self, query: &str, top_k: u32) -> Result<ChatAnswer, ApiError>;
}

/// Client for the plan-consultation HTTP API.
#[derive(Clone)]
pub struct PlanApiClient {
    base_url: String,
    client: reqwest::Client,
}

impl PlanApiClient {
    pub fn new(base_url: Option<String>) -> Self {
        let base_url = base_url
            .map(|u| u.trim_end_matches('/').to_string())
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());
        Self {
            base_url,
            client: reqwest::Client::new(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

/// Drain a non-success response into a Status error. The backend puts
/// `{"error": ...}` detail in the body; that is logged, never surfaced.
async fn non_success(res: reqwest::Response) -> ApiError {
    let status = res.status();
    let body = res.text().await.unwrap_or_default();
    if !body.is_empty() {
        log::debug!("backend error body: {}", body);
    }
    ApiError::Status {
        status: status.as_u16(),
        reason: status.canonical_reason().unwrap_or("unknown").to_string(),
    }
}

async fn decode_body<T: serde::de::DeserializeOwned>(res: reqwest::Response) -> Result<T, ApiError> {
    let text = res.text().await?;
    Ok(serde_json::from_str(&text)?)
}

#[async_trait]
impl PlanBackend for PlanApiClient {
    /// GET /status — readiness flags plus vector-store info.
    async fn fetch_status(&self) -> Result<SystemStatus, ApiError> {
        let url = format!("{}/status", self.base_url);
        let res = self.client.get(&url).send().await?;
        if !res.status().is_success() {
            return Err(non_success(res).await);
        }
        decode_body(res).await
    }

    /// POST /initialize — ask the backend to load its subsystems. Success is
    /// the HTTP status alone; the body is not inspected.
    async fn trigger_initialize(&self) -> Result<bool, ApiError> {
        let url = format!("{}/initialize", self.base_url);
        let res = self
            .client
            .post(&url)
            .json(&serde_json::json!({}))
            .send()
            .await?;
        Ok(res.status().is_success())
    }

    /// POST /chat — send one query with a result-count hint.
    async fn send_chat(&self, query: &str, top_k: u32) -> Result<ChatAnswer, ApiError> {
        let url = format!("{}/chat", self.base_url);
        let body = ChatRequest { query, top_k };
        let res = self.client.post(&url).json(&body).send().await?;
        if !res.status().is_success() {
            return Err(non_success(res).await);
        }
        decode_body(res).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ready_requires_both_flags() {
        let mut status = SystemStatus {
            embeddings_model_loaded: true,
            chain_loaded: true,
            data_loaded: true,
            data_size: Some(42),
        };
        assert!(status.is_ready());
        status.chain_loaded = false;
        assert!(!status.is_ready());
        status.chain_loaded = true;
        status.embeddings_model_loaded = false;
        assert!(!status.is_ready());
    }

    #[test]
    fn status_decodes_without_data_fields() {
        let status: SystemStatus =
            serde_json::from_str(r#"{"embeddings_model_loaded":true,"chain_loaded":false}"#)
                .expect("decode status");
        assert!(status.embeddings_model_loaded);
        assert!(!status.chain_loaded);
        assert!(!status.data_loaded);
        assert_eq!(status.data_size, None);
    }

    #[test]
    fn chat_request_wire_shape() {
        let body = serde_json::to_value(ChatRequest {
            query: "¿Cuáles son los objetivos?",
            top_k: 10,
        })
        .expect("serialize request");
        assert_eq!(body["query"], "¿Cuáles son los objetivos?");
        assert_eq!(body["top_k"], 10);
    }

    #[test]
    fn base_url_trailing_slash_is_trimmed() {
        let client = PlanApiClient::new(Some("http://127.0.0.1:5002/api/".to_string()));
        assert_eq!(client.base_url(), "http://127.0.0.1:5002/api");
        let client = PlanApiClient::new(None);
        assert_eq!(client.base_url(), DEFAULT_BASE_URL);
    }
}
