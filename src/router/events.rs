//! Interaction events mirrored to the recommendation engine.

use axum::extract::State;
use axum::routing::post;
use axum::{Extension, Json, Router, middleware};
use serde::Deserialize;
use validator::Validate;

use crate::router::{Message, Valid};
use crate::user::UserProfile;
use crate::{AppState, ServerError};

#[derive(Debug, Validate, Deserialize)]
pub struct Body {
    #[serde(default, alias = "product_id")]
    #[validate(length(min = 1, message = "Item ID is required."))]
    item_id: String,
    #[serde(default, alias = "recomm_id")]
    recommendation_context_id: Option<String>,
}

pub fn router(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/detail-view", post(detail_view))
        .route("/purchase", post(purchase))
        .route_layer(middleware::from_fn_with_state(state, super::auth))
}

async fn detail_view(
    State(state): State<AppState>,
    Extension(user): Extension<UserProfile>,
    Valid(body): Valid<Body>,
) -> Result<Json<Message>, ServerError> {
    state
        .gateway
        .record_detail_view(&user, &body.item_id, body.recommendation_context_id)
        .await?;
    Ok(Message::new("Detail view recorded successfully"))
}

async fn purchase(
    State(state): State<AppState>,
    Extension(user): Extension<UserProfile>,
    Valid(body): Valid<Body>,
) -> Result<Json<Message>, ServerError> {
    state
        .gateway
        .record_purchase(&user, &body.item_id, body.recommendation_context_id)
        .await?;
    Ok(Message::new("Purchase recorded successfully"))
}
