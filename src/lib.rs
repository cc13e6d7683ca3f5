//! prefgate is an authenticated gateway recording user preferences and
//! mirroring them to a recommendation engine.

#![forbid(unsafe_code)]
#![deny(unused_mut)]
pub mod catalog;
pub mod config;
pub mod database;
pub mod error;
pub mod gateway;
pub mod identity;
pub mod ledger;
mod router;
pub mod sync;
pub mod telemetry;
#[cfg(test)]
mod testing;
pub mod user;

use std::sync::Arc;
use std::time::Duration;

use axum::body::Bytes;
use axum::http::{Method, StatusCode, header};
use axum::routing::get;
use axum::{Router, middleware as AxumMiddleware};
use error::ServerError;
use metrics_exporter_prometheus::PrometheusHandle;
use tower::ServiceBuilder;
use tower_http::LatencyUnit;
use tower_http::cors::{Any, CorsLayer};
use tower_http::sensitive_headers::SetSensitiveHeadersLayer;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::{
    DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, TraceLayer,
};

use crate::catalog::PgCatalog;
use crate::gateway::Gateway;
use crate::identity::{
    DisabledIdentityAdmin, HttpIdentityAdmin, IdentityAdmin, JwtResolver,
};
use crate::ledger::PgLedger;
use crate::sync::{RecombeeEngine, RecommendationEngine, SyncClient};
use crate::user::PgProfileStore;

/// MUST NEVER be used in production.
#[cfg(test)]
pub async fn make_request(
    app: Router,
    method: Method,
    path: &str,
    token: Option<&str>,
    body: String,
) -> axum::http::Response<axum::body::Body> {
    use axum::extract::Request;
    use tower::util::ServiceExt;

    let mut request = Request::builder()
        .method(method)
        .uri(path)
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(token) = token {
        request = request.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }

    app.oneshot(request.body(axum::body::Body::from(body)).unwrap())
        .await
        .unwrap()
}

/// Collect a JSON response body.
#[cfg(test)]
pub async fn body(response: axum::http::Response<axum::body::Body>) -> serde_json::Value {
    use http_body_util::BodyExt;

    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

/// State sharing between routes.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<config::Configuration>,
    pub gateway: Arc<Gateway>,
    pub metrics: Option<PrometheusHandle>,
}

/// Create router.
pub fn app(state: AppState) -> Router {
    let middleware = ServiceBuilder::new()
        // Add high level tracing/logging to all requests.
        .layer(
            TraceLayer::new_for_http()
                .on_body_chunk(|chunk: &Bytes, latency: Duration, _span: &tracing::Span| {
                    tracing::trace!(size_bytes = chunk.len(), latency = ?latency, "sending body chunk")
                })
                .make_span_with(DefaultMakeSpan::new().include_headers(true).level(tracing::Level::INFO))
                .on_request(DefaultOnRequest::new())
                .on_response(DefaultOnResponse::new().include_headers(true).latency_unit(LatencyUnit::Micros)),
        )
        // Set a timeout.
        .layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            state.config.request_timeout(),
        ))
        // Remove senstive headers from trace.
        .layer(SetSensitiveHeadersLayer::new([header::AUTHORIZATION, header::COOKIE]))
        // Add CORS preflight support.
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
                .allow_headers(Any)
                .vary([header::AUTHORIZATION]),
        );

    Router::new()
        // `GET /health` goes to `health`.
        .route("/health", get(router::status::health))
        .route("/metrics", get(router::status::metrics))
        .nest("/preferences", router::preferences::router(state.clone()))
        .nest("/users", router::users::router(state.clone()))
        .nest("/events", router::events::router(state.clone()))
        .nest("/onboarding", router::onboarding::router(state.clone()))
        .with_state(state)
        .route_layer(AxumMiddleware::from_fn(telemetry::track))
        .layer(middleware)
}

/// Initialize the application state.
pub async fn initialize_state(
    metrics: Option<PrometheusHandle>,
) -> Result<AppState, Box<dyn std::error::Error + Send + Sync>> {
    // read configuration file.
    let config = config::Configuration::default()
        .path(std::env::var("CONFIG_PATH").unwrap_or_default().into())
        .read()?;

    let Some(postgres) = &config.postgres else {
        return Err("missing `postgres` entry on `config.yaml` file".into());
    };
    let db = database::Database::new(
        &postgres.address,
        postgres
            .username
            .as_deref()
            .unwrap_or(database::DEFAULT_CREDENTIALS),
        postgres
            .password
            .as_deref()
            .unwrap_or(database::DEFAULT_CREDENTIALS),
        postgres
            .database
            .as_deref()
            .unwrap_or(database::DEFAULT_DATABASE_NAME),
        postgres.pool_size.unwrap_or(database::DEFAULT_POOL_SIZE),
    )
    .await?;

    // execute migrations scripts on start.
    db.migrate().await?;

    // handle bearer tokens.
    let Some(identity) = &config.identity else {
        return Err("missing `identity` entry on `config.yaml` file".into());
    };
    let resolver = JwtResolver::new(identity)?;

    let identity_admin: Arc<dyn IdentityAdmin> = match &identity.admin {
        Some(admin) => Arc::new(HttpIdentityAdmin::new(admin, identity.timeout())?),
        None => {
            tracing::warn!("missing `identity.admin` entry, accounts will not be removed from the identity provider");
            Arc::new(DisabledIdentityAdmin)
        },
    };

    let sync = match &config.recommendation {
        Some(recommendation) => {
            let engine: Arc<dyn RecommendationEngine> =
                Arc::new(RecombeeEngine::new(recommendation)?);
            SyncClient::new(engine, recommendation.timeout())
        },
        None => {
            tracing::warn!("missing `recommendation` entry, sync events will be dropped");
            SyncClient::disabled()
        },
    };

    let gateway = Gateway::new(
        Arc::new(resolver),
        Arc::new(PgProfileStore::new(db.postgres.clone())),
        Arc::new(PgLedger::new(db.postgres.clone())),
        Arc::new(PgCatalog::new(db.postgres.clone())),
        identity_admin,
        sync,
    )
    .verify_timeout(identity.timeout())
    .preferences(config.preferences.clone());

    Ok(AppState {
        config,
        gateway: Arc::new(gateway),
        metrics,
    })
}
