//! Delete an account everywhere.

use axum::extract::State;
use axum::{Extension, Json};

use crate::identity::VerifiedIdentity;
use crate::router::Message;
use crate::{AppState, ServerError};

pub async fn handler(
    State(state): State<AppState>,
    Extension(identity): Extension<VerifiedIdentity>,
) -> Result<Json<Message>, ServerError> {
    state.gateway.delete_account(&identity).await?;
    Ok(Message::new("Account successfully deleted from all systems"))
}
