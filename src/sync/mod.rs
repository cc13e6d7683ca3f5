//! Best-effort propagation of local changes to the recommendation engine.
mod recombee;

pub use recombee::*;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{Map, Value};

/// Change mirrored to the recommendation engine. Never persisted.
#[derive(Clone, Debug, PartialEq)]
pub enum SyncEvent {
    UserCreated {
        subject_id: String,
    },
    RatingSet {
        subject_id: String,
        item_id: String,
        value: i32,
        recommendation_id: Option<String>,
    },
    DetailViewed {
        subject_id: String,
        item_id: String,
        recommendation_id: Option<String>,
    },
    Purchased {
        subject_id: String,
        item_id: String,
        recommendation_id: Option<String>,
    },
    AttributesSet {
        subject_id: String,
        attributes: Map<String, Value>,
    },
    UserDeleted {
        subject_id: String,
    },
}

impl SyncEvent {
    /// Label used in logs and metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            SyncEvent::UserCreated { .. } => "user_created",
            SyncEvent::RatingSet { .. } => "rating_set",
            SyncEvent::DetailViewed { .. } => "detail_viewed",
            SyncEvent::Purchased { .. } => "purchased",
            SyncEvent::AttributesSet { .. } => "attributes_set",
            SyncEvent::UserDeleted { .. } => "user_deleted",
        }
    }

    pub fn subject_id(&self) -> &str {
        match self {
            SyncEvent::UserCreated { subject_id }
            | SyncEvent::RatingSet { subject_id, .. }
            | SyncEvent::DetailViewed { subject_id, .. }
            | SyncEvent::Purchased { subject_id, .. }
            | SyncEvent::AttributesSet { subject_id, .. }
            | SyncEvent::UserDeleted { subject_id } => subject_id,
        }
    }
}

/// Drop empty correlation ids so they are omitted rather than sent blank.
pub fn recommendation_id(id: Option<String>) -> Option<String> {
    id.map(|id| id.trim().to_owned()).filter(|id| !id.is_empty())
}

/// Failures delivering a [`SyncEvent`].
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    #[error(transparent)]
    Http(#[from] reqwest::Error),

    #[error("recommendation engine answered {status}: {body}")]
    Status { status: u16, body: String },

    #[error("delivery timed out after {0:?}")]
    Timeout(Duration),

    #[error("cannot build request: {0}")]
    Request(String),
}

/// Remote recommendation engine.
#[async_trait]
pub trait RecommendationEngine: Send + Sync {
    async fn send(&self, event: &SyncEvent) -> Result<(), SyncError>;
}

/// Engine used when none is configured.
#[derive(Debug, Default, Clone)]
pub struct DisabledEngine;

#[async_trait]
impl RecommendationEngine for DisabledEngine {
    async fn send(&self, event: &SyncEvent) -> Result<(), SyncError> {
        tracing::debug!(event = event.kind(), "recommendation engine disabled, event dropped");
        Ok(())
    }
}

/// Delivery policy around a [`RecommendationEngine`].
#[derive(Clone)]
pub struct SyncClient {
    engine: Arc<dyn RecommendationEngine>,
    timeout: Duration,
}

impl SyncClient {
    /// Create a new [`SyncClient`]; each delivery is bounded by `timeout`.
    pub fn new(engine: Arc<dyn RecommendationEngine>, timeout: Duration) -> Self {
        Self { engine, timeout }
    }

    /// Client that accepts and drops every event.
    pub fn disabled() -> Self {
        Self::new(Arc::new(DisabledEngine), Duration::from_secs(1))
    }

    /// Deliver `event` once and report the outcome.
    pub async fn deliver(&self, event: &SyncEvent) -> Result<(), SyncError> {
        let result = match tokio::time::timeout(self.timeout, self.engine.send(event)).await {
            Ok(result) => result,
            Err(_) => Err(SyncError::Timeout(self.timeout)),
        };

        let outcome = if result.is_ok() { "delivered" } else { "failed" };
        metrics::counter!("recommendation_sync_total", "event" => event.kind(), "outcome" => outcome)
            .increment(1);

        result
    }

    /// Deliver `event` once; failures are logged and swallowed.
    pub async fn dispatch(&self, event: &SyncEvent) {
        if let Err(err) = self.deliver(event).await {
            metrics::counter!("recommendation_sync_failures_total", "event" => event.kind())
                .increment(1);
            tracing::warn!(
                event = event.kind(),
                subject_id = %event.subject_id(),
                error = %err,
                "recommendation sync failed, local state kept"
            );
        }
    }
}
