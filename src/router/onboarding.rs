//! Initial shopping preferences forwarded as user attributes.

use axum::extract::State;
use axum::routing::post;
use axum::{Extension, Json, Router, middleware};
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::gateway::{DEFAULT_BUDGET_MAX, DEFAULT_BUDGET_MIN, Onboarding};
use crate::router::Valid;
use crate::user::UserProfile;
use crate::{AppState, ServerError};

fn default_budget_min() -> f64 {
    DEFAULT_BUDGET_MIN
}

fn default_budget_max() -> f64 {
    DEFAULT_BUDGET_MAX
}

#[derive(Debug, Validate, Deserialize)]
pub struct Body {
    #[serde(default = "default_budget_min", alias = "InitialBudgetMin")]
    budget_min: f64,
    #[serde(default = "default_budget_max", alias = "InitialBudgetMax")]
    budget_max: f64,
    #[serde(alias = "InitialGender")]
    #[validate(
        required(message = "Gender is required."),
        length(min = 1, message = "Gender is required.")
    )]
    gender: Option<String>,
    #[serde(alias = "InitialPreferredBrands")]
    #[validate(
        required(message = "Preferred brands are required."),
        length(min = 1, message = "Preferred brands are required.")
    )]
    preferred_brands: Option<Vec<String>>,
    #[serde(alias = "InitialSizes")]
    #[validate(
        required(message = "Sizes are required."),
        length(min = 1, message = "Sizes are required.")
    )]
    sizes: Option<Vec<String>>,
}

impl From<Body> for Onboarding {
    fn from(body: Body) -> Self {
        Onboarding {
            budget_min: body.budget_min,
            budget_max: body.budget_max,
            gender: body.gender.unwrap_or_default(),
            preferred_brands: body.preferred_brands.unwrap_or_default(),
            sizes: body.sizes.unwrap_or_default(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Response {
    message: String,
    user_id: String,
}

pub fn router(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/", post(handler))
        .route_layer(middleware::from_fn_with_state(state, super::auth))
}

async fn handler(
    State(state): State<AppState>,
    Extension(user): Extension<UserProfile>,
    Valid(body): Valid<Body>,
) -> Result<Json<Response>, ServerError> {
    state.gateway.set_onboarding(&user, &body.into()).await?;

    Ok(Json(Response {
        message: "Initial preferences saved successfully".into(),
        user_id: user.subject_id,
    }))
}
