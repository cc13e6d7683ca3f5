//! Identity provider administration: account removal.

use async_trait::async_trait;
use serde_json::json;

use super::IdentityError;
use crate::config::IdentityAdmin as AdminConfig;

/// Administrative operations on the identity provider.
#[async_trait]
pub trait IdentityAdmin: Send + Sync {
    /// Permanently remove `subject_id` from the identity provider.
    async fn delete_subject(&self, subject_id: &str) -> Result<(), IdentityError>;
}

/// Identity Toolkit style `accounts:delete` client.
pub struct HttpIdentityAdmin {
    client: reqwest::Client,
    url: String,
    token: Option<String>,
}

impl HttpIdentityAdmin {
    /// Create a new [`HttpIdentityAdmin`].
    pub fn new(
        config: &AdminConfig,
        timeout: std::time::Duration,
    ) -> Result<Self, IdentityError> {
        let url = format!(
            "{}/v1/projects/{}/accounts:delete",
            config.endpoint.trim_end_matches('/'),
            config.project_id
        );

        Ok(Self {
            client: reqwest::Client::builder().timeout(timeout).build()?,
            url,
            token: config.token.clone(),
        })
    }
}

#[async_trait]
impl IdentityAdmin for HttpIdentityAdmin {
    async fn delete_subject(&self, subject_id: &str) -> Result<(), IdentityError> {
        let mut request = self
            .client
            .post(&self.url)
            .json(&json!({ "localId": subject_id }));
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(IdentityError::Status {
                status: status.as_u16(),
                body: response.text().await.unwrap_or_default(),
            });
        }

        tracing::debug!(%subject_id, "identity provider account deleted");
        Ok(())
    }
}

/// Used when no administration endpoint is configured.
#[derive(Debug, Default, Clone)]
pub struct DisabledIdentityAdmin;

#[async_trait]
impl IdentityAdmin for DisabledIdentityAdmin {
    async fn delete_subject(&self, subject_id: &str) -> Result<(), IdentityError> {
        tracing::warn!(%subject_id, "identity provider admin not configured, account kept upstream");
        Ok(())
    }
}
