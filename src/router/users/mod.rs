//! Profile provisioning, status and account deletion.
mod create;
mod delete;
mod get;

use axum::routing::post;
use axum::{Router, middleware};

use crate::AppState;

const ME_ROUTE: &str = "/@me";

pub fn router(state: AppState) -> Router<AppState> {
    Router::new()
        // `POST /users` goes to `create`.
        .route("/", post(create::handler))
        // `GET /users/@me` goes to `get`, `DELETE /users/@me` to `delete`.
        .route(ME_ROUTE, axum::routing::get(get::handler).delete(delete::handler))
        // Explicit provisioning, so no lazy creation here.
        .route_layer(middleware::from_fn_with_state(state, super::verify))
}
