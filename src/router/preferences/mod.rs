//! Preference signals, liked and purchased items.
mod liked;
mod purchased;
mod swipe;

use axum::routing::{get, post};
use axum::{Router, middleware};

use crate::AppState;

pub fn router(state: AppState) -> Router<AppState> {
    Router::new()
        // `POST /preferences/swipe` goes to `swipe`.
        .route("/swipe", post(swipe::handler))
        // `GET /preferences/liked` goes to `liked`.
        .route("/liked", get(liked::handler))
        .route("/purchased", get(purchased::list).post(purchased::confirm))
        .route_layer(middleware::from_fn_with_state(state, super::auth))
}
