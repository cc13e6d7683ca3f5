//! Purchased items.

use axum::extract::State;
use axum::{Extension, Json};
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::catalog::Item;
use crate::router::{Message, Valid};
use crate::user::UserProfile;
use crate::{AppState, ServerError};

#[derive(Debug, Serialize, Deserialize)]
pub struct Items {
    items: Vec<Item>,
}

#[derive(Debug, Validate, Deserialize)]
pub struct Body {
    #[serde(default, alias = "product_ids")]
    item_ids: Vec<String>,
}

pub async fn list(
    State(state): State<AppState>,
    Extension(user): Extension<UserProfile>,
) -> Result<Json<Items>, ServerError> {
    let items = state.gateway.purchased_items(&user).await?;
    Ok(Json(Items { items }))
}

pub async fn confirm(
    State(state): State<AppState>,
    Extension(user): Extension<UserProfile>,
    Valid(body): Valid<Body>,
) -> Result<Json<Message>, ServerError> {
    state.gateway.confirm_purchases(&user, body.item_ids).await?;
    Ok(Message::new("Purchased items updated successfully"))
}
