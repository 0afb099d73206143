//! Record creation on the target.

use super::{CreatedRecord, TargetClient};
use crate::config::NetworkConfig;
use crate::error::{CreationError, TargetError};
use crate::mapper::UserPayload;
use serde_json::Value;
use std::sync::Arc;
use tracing::debug;

/// Creates one record per call and reports failures as sanitized messages.
#[derive(Clone)]
pub struct RecordCreator {
    client: Arc<dyn TargetClient>,
    /// Values that must never appear in a persisted error message.
    secrets: Vec<String>,
}

impl RecordCreator {
    pub fn new(client: Arc<dyn TargetClient>) -> Self {
        Self {
            client,
            secrets: Vec::new(),
        }
    }

    /// Redact `secret` from any error message this creator produces.
    pub fn with_secret(mut self, secret: impl Into<String>) -> Self {
        let secret = secret.into();
        if !secret.is_empty() {
            self.secrets.push(secret);
        }
        self
    }

    pub async fn create(&self, payload: &UserPayload) -> Result<CreatedRecord, CreationError> {
        let body = serde_json::to_value(payload)
            .map(prune_unset)
            .map_err(|e| CreationError {
                message: self.sanitize(&format!("Failed to serialize payload: {}", e)),
            })?;

        let created = self
            .client
            .create_user(&body)
            .await
            .map_err(|e| self.creation_error(&e))?;

        debug!("Created {} as {}", payload.uid, created.id);
        Ok(created)
    }

    fn creation_error(&self, err: &TargetError) -> CreationError {
        CreationError {
            message: self.sanitize(&err.to_string()),
        }
    }

    /// First line only, secrets redacted, length capped.
    pub(crate) fn sanitize(&self, raw: &str) -> String {
        let mut message = raw.lines().next().unwrap_or_default().trim().to_string();
        for secret in &self.secrets {
            message = message.replace(secret.as_str(), "[redacted]");
        }
        if message.chars().count() > NetworkConfig::MAX_ERROR_MESSAGE_CHARS {
            message = message
                .chars()
                .take(NetworkConfig::MAX_ERROR_MESSAGE_CHARS)
                .collect::<String>()
                + "...";
        }
        if message.is_empty() {
            message = "Record creation failed".to_string();
        }
        message
    }
}

/// Drop top-level fields that were never set (`null`), so the target's own
/// defaults apply. Explicit falsy values are kept.
pub fn prune_unset(value: Value) -> Value {
    match value {
        Value::Object(map) => Value::Object(
            map.into_iter().filter(|(_, v)| !v.is_null()).collect(),
        ),
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::target::ExistingRecord;
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::Mutex;

    struct FailingClient {
        error: fn() -> TargetError,
        bodies: Mutex<Vec<Value>>,
    }

    #[async_trait]
    impl TargetClient for FailingClient {
        async fn ping(&self) -> Result<(), TargetError> {
            Ok(())
        }

        async fn find_by_uid(&self, _uid: &str) -> Result<Option<ExistingRecord>, TargetError> {
            Ok(None)
        }

        async fn create_user(&self, payload: &Value) -> Result<CreatedRecord, TargetError> {
            self.bodies.lock().unwrap().push(payload.clone());
            Err((self.error)())
        }
    }

    fn payload() -> UserPayload {
        UserPayload {
            uid: "u-1".into(),
            email: String::new(),
            display_name: "Ada".into(),
            first_name: "Ada".into(),
            last_name: String::new(),
            phone_number: String::new(),
            school_id: String::new(),
            is_active: true,
            password_changed: false,
            role: None,
            custom_role: None,
            learning_mode: None,
            custom_learning_mode: None,
        }
    }

    #[test]
    fn test_prune_unset_keeps_falsy_values() {
        let pruned = prune_unset(json!({
            "uid": "u-1",
            "email": "",
            "passwordChanged": false,
            "role": null
        }));
        assert_eq!(
            pruned,
            json!({"uid": "u-1", "email": "", "passwordChanged": false})
        );
    }

    #[tokio::test]
    async fn test_unset_fields_not_transmitted() {
        let client = Arc::new(FailingClient {
            error: || TargetError::Status {
                status: 400,
                message: "bad".into(),
            },
            bodies: Mutex::new(Vec::new()),
        });
        let creator = RecordCreator::new(client.clone());
        let _ = creator.create(&payload()).await;

        let bodies = client.bodies.lock().unwrap();
        let body = bodies[0].as_object().unwrap();
        assert!(!body.contains_key("role"));
        assert!(!body.contains_key("customRole"));
        assert_eq!(body["passwordChanged"], json!(false));
        assert_eq!(body["email"], json!(""));
    }

    #[tokio::test]
    async fn test_error_is_sanitized() {
        let client = Arc::new(FailingClient {
            error: || TargetError::Network {
                message: "request to https://cms.test failed with token s3cret\nstack line 1"
                    .into(),
            },
            bodies: Mutex::new(Vec::new()),
        });
        let creator = RecordCreator::new(client).with_secret("s3cret");
        let err = creator.create(&payload()).await.unwrap_err();

        assert!(!err.message.contains("s3cret"));
        assert!(!err.message.contains('\n'));
        assert!(err.message.contains("[redacted]"));
    }

    #[tokio::test]
    async fn test_long_error_is_truncated() {
        let client = Arc::new(FailingClient {
            error: || TargetError::Status {
                status: 422,
                message: "x".repeat(2000),
            },
            bodies: Mutex::new(Vec::new()),
        });
        let err = RecordCreator::new(client)
            .create(&payload())
            .await
            .unwrap_err();
        assert!(err.message.chars().count() <= NetworkConfig::MAX_ERROR_MESSAGE_CHARS + 3);
        assert!(err.message.starts_with("Target returned HTTP 422"));
    }
}
