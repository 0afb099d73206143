//! HTTP client for a headless CMS collection endpoint.
//!
//! Endpoints used:
//! - `GET  {base}/api/{collection}?filters[uid][$eq]={uid}` (lookup)
//! - `POST {base}/api/{collection}` with body `{"data": payload}` (create)
//!
//! An optional requests-per-second quota applies across every worker using
//! the same client.

use super::{CreatedRecord, ExistingRecord, TargetClient};
use crate::config::NetworkConfig;
use crate::error::TargetError;
use async_trait::async_trait;
use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use reqwest::{Client, Response, StatusCode};
use serde::Deserialize;
use serde_json::{json, Value};
use std::num::NonZeroU32;
use tracing::debug;
use url::Url;

/// Connection settings for [`RestTargetClient`].
#[derive(Debug, Clone)]
pub struct RestTargetConfig {
    pub base_url: String,
    pub collection: String,
    pub api_token: Option<String>,
    /// Global cap on requests per second, if any.
    pub max_requests_per_second: Option<u32>,
}

impl RestTargetConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            collection: NetworkConfig::DEFAULT_TARGET_COLLECTION.to_string(),
            api_token: None,
            max_requests_per_second: None,
        }
    }

    pub fn with_collection(mut self, collection: impl Into<String>) -> Self {
        self.collection = collection.into();
        self
    }

    pub fn with_api_token(mut self, token: Option<String>) -> Self {
        self.api_token = token.filter(|t| !t.is_empty());
        self
    }

    pub fn with_max_requests_per_second(mut self, rps: Option<u32>) -> Self {
        self.max_requests_per_second = rps;
        self
    }
}

/// Envelope used by the CMS for both list and single responses.
#[derive(Debug, Deserialize)]
struct DataEnvelope<T> {
    data: T,
}

/// REST implementation of [`TargetClient`].
pub struct RestTargetClient {
    client: Client,
    endpoint: Url,
    api_token: Option<String>,
    limiter: Option<DefaultDirectRateLimiter>,
}

impl RestTargetClient {
    pub fn new(config: RestTargetConfig) -> Result<Self, TargetError> {
        let endpoint = collection_endpoint(&config.base_url, &config.collection)?;

        let client = Client::builder()
            .timeout(NetworkConfig::REQUEST_TIMEOUT)
            .connect_timeout(NetworkConfig::CONNECT_TIMEOUT)
            .user_agent(NetworkConfig::USER_AGENT)
            .build()
            .map_err(|e| TargetError::InvalidConfig {
                message: format!("Failed to create HTTP client: {}", e),
            })?;

        let limiter = config
            .max_requests_per_second
            .and_then(NonZeroU32::new)
            .map(|rps| RateLimiter::direct(Quota::per_second(rps)));

        Ok(Self {
            client,
            endpoint,
            api_token: config.api_token,
            limiter,
        })
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    async fn throttle(&self) {
        if let Some(limiter) = &self.limiter {
            limiter.until_ready().await;
        }
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.api_token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    async fn check_status(response: Response) -> Result<Response, TargetError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        let message = error_message(&body).unwrap_or_else(|| {
            status
                .canonical_reason()
                .unwrap_or("Unexpected response")
                .to_string()
        });
        if status == StatusCode::TOO_MANY_REQUESTS {
            return Err(TargetError::RateLimited { message });
        }
        Err(TargetError::Status {
            status: status.as_u16(),
            message,
        })
    }
}

#[async_trait]
impl TargetClient for RestTargetClient {
    async fn ping(&self) -> Result<(), TargetError> {
        self.throttle().await;
        let request = self
            .client
            .get(self.endpoint.clone())
            .query(&[("pagination[pageSize]", "1")]);
        let response = self.authorize(request).send().await?;
        Self::check_status(response).await?;
        debug!("Target {} reachable", self.endpoint);
        Ok(())
    }

    async fn find_by_uid(&self, uid: &str) -> Result<Option<ExistingRecord>, TargetError> {
        self.throttle().await;
        let request = self
            .client
            .get(self.endpoint.clone())
            .query(&[("filters[uid][$eq]", uid), ("pagination[pageSize]", "1")]);
        let response = Self::check_status(self.authorize(request).send().await?).await?;
        let envelope: DataEnvelope<Vec<Value>> = response.json().await?;
        Ok(envelope
            .data
            .first()
            .map(|item| ExistingRecord {
                id: record_id(item),
                uid: uid.to_string(),
            }))
    }

    async fn create_user(&self, payload: &Value) -> Result<CreatedRecord, TargetError> {
        self.throttle().await;
        let request = self
            .client
            .post(self.endpoint.clone())
            .json(&json!({ "data": payload }));
        let response = Self::check_status(self.authorize(request).send().await?).await?;
        let envelope: DataEnvelope<Value> = response.json().await?;
        Ok(CreatedRecord {
            id: record_id(&envelope.data),
        })
    }
}

/// `{base}/api/{collection}`, tolerant of trailing slashes on the base.
fn collection_endpoint(base_url: &str, collection: &str) -> Result<Url, TargetError> {
    let collection = collection.trim().trim_matches('/').trim();
    if collection.is_empty() {
        return Err(TargetError::InvalidConfig {
            message: "Target collection must not be empty".to_string(),
        });
    }
    let mut base = Url::parse(base_url.trim()).map_err(|e| TargetError::InvalidConfig {
        message: format!("Invalid target URL {:?}: {}", base_url, e),
    })?;
    if !base.path().ends_with('/') {
        let path = format!("{}/", base.path());
        base.set_path(&path);
    }
    base.join(&format!("api/{}", collection))
        .map_err(|e| TargetError::InvalidConfig {
            message: format!("Invalid collection {:?}: {}", collection, e),
        })
}

/// Prefer the stable document id, fall back to the numeric row id.
fn record_id(item: &Value) -> String {
    match item.get("documentId").or_else(|| item.get("id")) {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Number(n)) => n.to_string(),
        _ => String::from("unknown"),
    }
}

/// Extract `error.message` from a CMS error body.
fn error_message(body: &str) -> Option<String> {
    let value: Value = serde_json::from_str(body).ok()?;
    value
        .pointer("/error/message")
        .and_then(Value::as_str)
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collection_endpoint_joins_paths() {
        let url = collection_endpoint("https://cms.school.test", "school-users").unwrap();
        assert_eq!(url.as_str(), "https://cms.school.test/api/school-users");

        let url = collection_endpoint("https://cms.school.test/v2/", "/people/").unwrap();
        assert_eq!(url.as_str(), "https://cms.school.test/v2/api/people");

        let url = collection_endpoint("https://cms.school.test", " /people/ ").unwrap();
        assert_eq!(url.as_str(), "https://cms.school.test/api/people");
    }

    #[test]
    fn test_collection_endpoint_rejects_bad_input() {
        assert!(matches!(
            collection_endpoint("not a url", "users"),
            Err(TargetError::InvalidConfig { .. })
        ));
        assert!(matches!(
            collection_endpoint("https://cms.school.test", "  /"),
            Err(TargetError::InvalidConfig { .. })
        ));
    }

    #[test]
    fn test_record_id_variants() {
        assert_eq!(record_id(&json!({"documentId": "abc", "id": 4})), "abc");
        assert_eq!(record_id(&json!({"id": 42})), "42");
        assert_eq!(record_id(&json!({})), "unknown");
    }

    #[test]
    fn test_error_message_extraction() {
        let body = r#"{"data":null,"error":{"status":400,"name":"ValidationError","message":"uid must be unique"}}"#;
        assert_eq!(error_message(body).as_deref(), Some("uid must be unique"));
        assert_eq!(error_message("<html>502</html>"), None);
    }

    #[test]
    fn test_client_construction() {
        let client = RestTargetClient::new(
            RestTargetConfig::new("http://localhost:1337")
                .with_api_token(Some(String::new()))
                .with_max_requests_per_second(Some(0)),
        )
        .unwrap();
        assert_eq!(client.endpoint().as_str(), "http://localhost:1337/api/school-users");
        assert!(client.api_token.is_none());
        assert!(client.limiter.is_none());
    }
}
