//! Record a preference signal.

use axum::extract::State;
use axum::{Extension, Json};
use serde::Deserialize;
use serde_json::Value;
use validator::Validate;

use crate::ledger::coerce_signal;
use crate::router::{Message, Valid};
use crate::user::UserProfile;
use crate::{AppState, ServerError};

#[derive(Debug, Validate, Deserialize)]
pub struct Body {
    #[serde(default, alias = "product_id")]
    #[validate(length(min = 1, message = "Item ID is required."))]
    item_id: String,
    /// Coerced after validation; see [`coerce_signal`].
    #[serde(default, alias = "preference")]
    preference_value: Option<Value>,
    #[serde(default, alias = "recomm_id")]
    recommendation_context_id: Option<String>,
}

pub async fn handler(
    State(state): State<AppState>,
    Extension(user): Extension<UserProfile>,
    Valid(body): Valid<Body>,
) -> Result<Json<Message>, ServerError> {
    let value = coerce_signal(body.preference_value.as_ref())?;

    state
        .gateway
        .record_signal(&user, &body.item_id, value, body.recommendation_context_id)
        .await?;

    Ok(Message::new("Preference updated successfully"))
}
