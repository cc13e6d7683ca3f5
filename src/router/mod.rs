//! HTTP surface of the gateway.
pub mod events;
pub mod onboarding;
pub mod preferences;
pub mod status;
pub mod users;

use axum::extract::{FromRequest, FromRequestParts, Query, Request, State};
use axum::http::header;
use axum::http::request::Parts;
use axum::response::Response;
use axum::{Json, middleware};
use serde::Serialize;
use serde::de::DeserializeOwned;
use validator::Validate;

use crate::identity::bearer_token;
use crate::{AppState, ServerError};

/// JSON body validated with [`Validate`] before reaching the handler.
#[derive(Debug, Clone, Copy, Default)]
pub struct Valid<T>(pub T);

impl<T, S> FromRequest<S> for Valid<T>
where
    T: DeserializeOwned + Validate,
    S: Send + Sync,
{
    type Rejection = ServerError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state).await?;
        value.validate()?;
        Ok(Valid(value))
    }
}

/// Query string validated with [`Validate`].
#[derive(Debug, Clone, Copy, Default)]
pub struct ValidQuery<T>(pub T);

impl<T, S> FromRequestParts<S> for ValidQuery<T>
where
    T: DeserializeOwned + Validate,
    S: Send + Sync,
{
    type Rejection = ServerError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Query(value) = Query::<T>::from_request_parts(parts, state).await?;
        value.validate()?;
        Ok(ValidQuery(value))
    }
}

/// Plain `{message}` answer.
#[derive(Debug, Serialize, serde::Deserialize)]
pub struct Message {
    pub message: String,
}

impl Message {
    pub fn new(message: &str) -> Json<Self> {
        Json(Self {
            message: message.to_owned(),
        })
    }
}

fn authorization(req: &Request) -> Option<&str> {
    req.headers()
        .get(header::AUTHORIZATION)
        .and_then(|header| header.to_str().ok())
}

/// Verify the bearer token and attach the caller's
/// [`UserProfile`](crate::user::UserProfile), provisioning it on first sight.
pub async fn auth(
    State(state): State<AppState>,
    mut req: Request,
    next: middleware::Next,
) -> Result<Response, ServerError> {
    let token = bearer_token(authorization(&req))?;
    let user = state.gateway.authenticate(token).await?;

    req.extensions_mut().insert(user);
    Ok(next.run(req).await)
}

/// Verify the bearer token only and attach the
/// [`VerifiedIdentity`](crate::identity::VerifiedIdentity).
pub async fn verify(
    State(state): State<AppState>,
    mut req: Request,
    next: middleware::Next,
) -> Result<Response, ServerError> {
    let token = bearer_token(authorization(&req))?;
    let identity = state.gateway.verify(token).await?;

    req.extensions_mut().insert(identity);
    Ok(next.run(req).await)
}
