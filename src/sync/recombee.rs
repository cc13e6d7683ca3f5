//! Recombee compatible HTTP engine with HMAC-SHA1 request signing.

use std::time::{SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use hmac::{Hmac, Mac};
use reqwest::{Method, StatusCode};
use serde::Serialize;
use serde_json::Value;
use sha1::Sha1;
use url::Url;

use super::{RecommendationEngine, SyncError, SyncEvent};
use crate::config::Recommendation;

type HmacSha1 = Hmac<Sha1>;

const CASCADE_CREATE: &str = "!cascadeCreate";

/// Body of rating, detail view and purchase interactions.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct Interaction<'a> {
    user_id: &'a str,
    item_id: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    rating: Option<f64>,
    cascade_create: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    recomm_id: Option<&'a str>,
}

impl<'a> Interaction<'a> {
    fn new(user_id: &'a str, item_id: &'a str, recomm_id: &'a Option<String>) -> Self {
        Self {
            user_id,
            item_id,
            rating: None,
            cascade_create: true,
            recomm_id: recomm_id.as_deref(),
        }
    }
}

/// Ratings are accepted in `[-1.0, 1.0]`.
fn rating(value: i32) -> f64 {
    let rating = f64::from(value).clamp(-1.0, 1.0);
    if rating != f64::from(value) {
        tracing::debug!(value, rating, "rating clamped to engine scale");
    }
    rating
}

/// [`RecommendationEngine`] speaking the Recombee HTTP API.
pub struct RecombeeEngine {
    client: reqwest::Client,
    base_url: Url,
    database_id: String,
    token: String,
}

impl RecombeeEngine {
    /// Create a new [`RecombeeEngine`].
    pub fn new(config: &Recommendation) -> Result<Self, SyncError> {
        let base_url = Url::parse(&config.base_url)
            .map_err(|err| SyncError::Request(err.to_string()))?;
        if base_url.cannot_be_a_base() {
            return Err(SyncError::Request(format!("{base_url} cannot be a base URL")));
        }

        Ok(Self {
            client: reqwest::Client::builder()
                .timeout(config.timeout())
                .build()?,
            base_url,
            database_id: config.database_id.clone(),
            token: config.private_token.clone().unwrap_or_default(),
        })
    }

    /// Hex HMAC-SHA1 of `path_and_query` keyed with the private token.
    fn sign(&self, path_and_query: &str) -> Result<String, SyncError> {
        let mut mac = HmacSha1::new_from_slice(self.token.as_bytes())
            .map_err(|err| SyncError::Request(err.to_string()))?;
        mac.update(path_and_query.as_bytes());
        Ok(hex::encode(mac.finalize().into_bytes()))
    }

    /// `/{database}/{segments}?hmac_timestamp=..&hmac_sign=..`
    fn signed_url(&self, segments: &[&str], timestamp: u64) -> Result<Url, SyncError> {
        let mut url = self.base_url.clone();
        url.set_query(None);
        url.path_segments_mut()
            .map_err(|_| SyncError::Request("invalid base URL".into()))?
            .clear()
            .push(&self.database_id)
            .extend(segments);
        url.query_pairs_mut()
            .append_pair("hmac_timestamp", &timestamp.to_string());

        let unsigned = format!("{}?{}", url.path(), url.query().unwrap_or_default());
        let sign = self.sign(&unsigned)?;
        url.query_pairs_mut().append_pair("hmac_sign", &sign);

        Ok(url)
    }

    async fn call(
        &self,
        method: Method,
        segments: &[&str],
        body: Option<Value>,
    ) -> Result<StatusCode, SyncError> {
        let timestamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_err(|err| SyncError::Request(err.to_string()))?
            .as_secs();
        let url = self.signed_url(segments, timestamp)?;

        let mut request = self.client.request(method.clone(), url);
        if let Some(body) = body {
            request = request.json(&body);
        }

        let response = request.send().await?;
        let status = response.status();
        tracing::trace!(%method, path = ?segments, %status, "recommendation engine answered");

        if status.is_success() || status == StatusCode::CONFLICT {
            return Ok(status);
        }

        Err(SyncError::Status {
            status: status.as_u16(),
            body: response.text().await.unwrap_or_default(),
        })
    }

    async fn interaction(
        &self,
        collection: &str,
        interaction: Interaction<'_>,
    ) -> Result<(), SyncError> {
        let body = serde_json::to_value(&interaction)
            .map_err(|err| SyncError::Request(err.to_string()))?;
        let status = self.call(Method::POST, &[collection, ""], Some(body)).await?;
        conflict_is_error(status)
    }
}

/// 409 is only tolerated where it means "already exists".
fn conflict_is_error(status: StatusCode) -> Result<(), SyncError> {
    if status == StatusCode::CONFLICT {
        return Err(SyncError::Status {
            status: status.as_u16(),
            body: String::default(),
        });
    }
    Ok(())
}

#[async_trait]
impl RecommendationEngine for RecombeeEngine {
    async fn send(&self, event: &SyncEvent) -> Result<(), SyncError> {
        match event {
            SyncEvent::UserCreated { subject_id } => {
                let status = self.call(Method::PUT, &["users", subject_id], None).await?;
                if status == StatusCode::CONFLICT {
                    tracing::debug!(%subject_id, "user already known by recommendation engine");
                }
                Ok(())
            },
            SyncEvent::UserDeleted { subject_id } => {
                let status = self.call(Method::DELETE, &["users", subject_id], None).await?;
                conflict_is_error(status)
            },
            SyncEvent::RatingSet {
                subject_id,
                item_id,
                value,
                recommendation_id,
            } => {
                let mut interaction = Interaction::new(subject_id, item_id, recommendation_id);
                interaction.rating = Some(rating(*value));
                self.interaction("ratings", interaction).await
            },
            SyncEvent::DetailViewed {
                subject_id,
                item_id,
                recommendation_id,
            } => {
                self.interaction(
                    "detailviews",
                    Interaction::new(subject_id, item_id, recommendation_id),
                )
                .await
            },
            SyncEvent::Purchased {
                subject_id,
                item_id,
                recommendation_id,
            } => {
                self.interaction(
                    "purchases",
                    Interaction::new(subject_id, item_id, recommendation_id),
                )
                .await
            },
            SyncEvent::AttributesSet {
                subject_id,
                attributes,
            } => {
                let mut values = attributes.clone();
                values.insert(CASCADE_CREATE.into(), Value::Bool(true));
                let status = self
                    .call(Method::POST, &["users", subject_id], Some(Value::Object(values)))
                    .await?;
                conflict_is_error(status)
            },
        }
    }
}
