//! Profile status. Never provisions.

use axum::Extension;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json};
use serde::{Deserialize, Serialize};

use crate::identity::VerifiedIdentity;
use crate::{AppState, ServerError};

#[derive(Debug, PartialEq, Serialize, Deserialize)]
pub struct Response {
    exists: bool,
    user_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    username: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    email: Option<String>,
}

pub async fn handler(
    State(state): State<AppState>,
    Extension(identity): Extension<VerifiedIdentity>,
) -> Result<impl IntoResponse, ServerError> {
    let response = match state.gateway.profile(&identity).await? {
        Some(profile) => (
            StatusCode::OK,
            Json(Response {
                exists: true,
                user_id: profile.subject_id,
                username: Some(profile.username),
                email: Some(profile.email),
            }),
        ),
        None => (
            StatusCode::NOT_FOUND,
            Json(Response {
                exists: false,
                user_id: identity.subject_id,
                username: None,
                email: None,
            }),
        ),
    };

    Ok(response)
}
