//! Explicit profile provisioning.

use axum::body::Bytes;
use axum::extract::State;
use axum::{Extension, Json};
use serde::Deserialize;

use crate::identity::VerifiedIdentity;
use crate::router::Message;
use crate::{AppState, ServerError};

#[derive(Debug, Default, Deserialize)]
pub struct Body {
    name: Option<String>,
}

/// An empty body is accepted.
pub async fn handler(
    State(state): State<AppState>,
    Extension(identity): Extension<VerifiedIdentity>,
    body: Bytes,
) -> Result<Json<Message>, ServerError> {
    let body: Body = if body.iter().all(u8::is_ascii_whitespace) {
        Body::default()
    } else {
        serde_json::from_slice(&body)?
    };

    let provisioned = state.gateway.provision(&identity, body.name).await?;

    Ok(Message::new(if provisioned.created {
        "User and profile created successfully"
    } else {
        "User already exists"
    }))
}
