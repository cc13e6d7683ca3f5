//! Bearer credential verification and identity provider administration.
mod admin;
mod jwt;

pub use admin::*;
pub use jwt::*;

use async_trait::async_trait;

use crate::error::{Result, ServerError};

const BEARER: &str = "Bearer ";

/// Identity asserted by a verified bearer token.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct VerifiedIdentity {
    pub subject_id: String,
    pub claimed_name: Option<String>,
    pub claimed_email: Option<String>,
}

/// Failures raised by identity collaborators.
#[derive(Debug, thiserror::Error)]
pub enum IdentityError {
    #[error(transparent)]
    Jwt(#[from] jsonwebtoken::errors::Error),

    #[error(transparent)]
    Http(#[from] reqwest::Error),

    #[error("no signing key matches kid {0:?}")]
    UnknownKey(Option<String>),

    #[error("token carries an empty subject")]
    EmptySubject,

    #[error("identity provider answered {status}: {body}")]
    Status { status: u16, body: String },

    #[error("no verification key source configured")]
    NoKeySource,
}

/// Verifies opaque bearer tokens.
#[async_trait]
pub trait CredentialResolver: Send + Sync {
    /// Verify `token` and return the identity it asserts.
    async fn resolve(
        &self,
        token: &str,
    ) -> std::result::Result<VerifiedIdentity, IdentityError>;
}

/// Extract the token from an `Authorization` header value.
///
/// A missing header, another scheme or an empty token is a malformed header,
/// reported apart from a token that fails verification.
pub fn bearer_token(header: Option<&str>) -> Result<&str> {
    header
        .and_then(|value| value.strip_prefix(BEARER))
        .map(str::trim)
        .filter(|token| !token.is_empty() && !token.contains(' '))
        .ok_or(ServerError::MissingAuthorization)
}
