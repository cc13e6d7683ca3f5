//! Paginated liked items.

use axum::extract::State;
use axum::{Extension, Json};
use serde::Deserialize;
use validator::Validate;

use crate::gateway::LikedItems;
use crate::router::ValidQuery;
use crate::user::UserProfile;
use crate::{AppState, ServerError};

#[derive(Debug, Validate, Deserialize)]
pub struct Params {
    #[validate(range(min = 1, message = "Page must be at least 1."))]
    page: Option<u32>,
    #[validate(range(min = 1, message = "Page size must be at least 1."))]
    page_size: Option<u32>,
}

pub async fn handler(
    State(state): State<AppState>,
    Extension(user): Extension<UserProfile>,
    ValidQuery(params): ValidQuery<Params>,
) -> Result<Json<LikedItems>, ServerError> {
    let request = state.gateway.page_request(params.page, params.page_size);
    Ok(Json(state.gateway.liked_items(&user, request).await?))
}
