//! Verify identity-provider ID tokens (JWT).

use std::time::{Duration, Instant};

use async_trait::async_trait;
use jsonwebtoken::jwk::JwkSet;
use jsonwebtoken::{Algorithm, DecodingKey, Validation, decode, decode_header};
use serde::Deserialize;
use tokio::sync::RwLock;

use super::{CredentialResolver, IdentityError, VerifiedIdentity};
use crate::config::Identity;

type Result<T> = std::result::Result<T, IdentityError>;

/// Claims read from an ID token.
#[derive(Debug, Deserialize)]
struct Claims {
    sub: String,
    name: Option<String>,
    email: Option<String>,
}

enum KeySource {
    Secret(DecodingKey),
    Jwks(JwksCache),
}

struct CachedKeys {
    fetched_at: Instant,
    set: JwkSet,
}

impl CachedKeys {
    fn find(&self, kid: &str) -> Result<Option<DecodingKey>> {
        self.set
            .find(kid)
            .map(DecodingKey::from_jwk)
            .transpose()
            .map_err(IdentityError::from)
    }
}

/// Signing keys fetched from a JWKS endpoint, refreshed on expiry or
/// unknown `kid`.
///
/// An unknown `kid` triggers at most one refresh per `min_refresh`, since
/// the header is attacker controlled.
struct JwksCache {
    url: String,
    client: reqwest::Client,
    ttl: Duration,
    min_refresh: Duration,
    keys: RwLock<Option<CachedKeys>>,
}

impl JwksCache {
    /// Answer from the cache, or `None` when a refresh is allowed and needed.
    fn lookup(&self, keys: &Option<CachedKeys>, kid: &str) -> Option<Result<DecodingKey>> {
        let cached = keys.as_ref()?;
        let age = cached.fetched_at.elapsed();
        let fresh = age < self.ttl;
        let throttled = age < self.min_refresh;

        match cached.find(kid) {
            Err(err) => Some(Err(err)),
            Ok(Some(key)) if fresh || throttled => Some(Ok(key)),
            Ok(None) if throttled => Some(Err(IdentityError::UnknownKey(Some(kid.to_owned())))),
            Ok(_) => None,
        }
    }

    async fn key(&self, kid: Option<&str>) -> Result<DecodingKey> {
        let kid = kid.ok_or(IdentityError::UnknownKey(None))?;

        {
            let keys = self.keys.read().await;
            if let Some(found) = self.lookup(&keys, kid) {
                return found;
            }
        }

        // Refreshes are serialized; a concurrent one may have just landed.
        let mut keys = self.keys.write().await;
        if let Some(found) = self.lookup(&keys, kid) {
            return found;
        }

        let set = self
            .client
            .get(&self.url)
            .send()
            .await?
            .error_for_status()?
            .json::<JwkSet>()
            .await?;
        tracing::debug!(url = %self.url, keys = set.keys.len(), "signing keys refreshed");

        let cached = CachedKeys {
            fetched_at: Instant::now(),
            set,
        };
        let key = cached
            .find(kid)?
            .ok_or_else(|| IdentityError::UnknownKey(Some(kid.to_owned())));
        *keys = Some(cached);

        key
    }
}

/// [`CredentialResolver`] validating signed ID tokens.
pub struct JwtResolver {
    validation: Validation,
    keys: KeySource,
}

impl JwtResolver {
    /// Create a new [`JwtResolver`] from configuration.
    ///
    /// A JWKS URL selects RS256; otherwise a shared secret selects HS256.
    pub fn new(config: &Identity) -> Result<Self> {
        let (algorithm, keys) = match (&config.jwks_url, &config.secret) {
            (Some(url), _) => (
                Algorithm::RS256,
                KeySource::Jwks(JwksCache {
                    url: url.clone(),
                    client: reqwest::Client::builder()
                        .timeout(config.timeout())
                        .build()?,
                    ttl: config.jwks_ttl(),
                    min_refresh: config.jwks_min_refresh(),
                    keys: RwLock::new(None),
                }),
            ),
            (None, Some(secret)) => (
                Algorithm::HS256,
                KeySource::Secret(DecodingKey::from_secret(secret.as_bytes())),
            ),
            (None, None) => return Err(IdentityError::NoKeySource),
        };

        let mut validation = Validation::new(algorithm);
        if config.issuer.is_empty() {
            tracing::warn!("identity issuer is not configured, `iss` is not checked");
        } else {
            validation.set_issuer(&[&config.issuer]);
        }
        if config.audience.is_empty() {
            validation.validate_aud = false;
        } else {
            validation.set_audience(&[&config.audience]);
        }

        Ok(Self { validation, keys })
    }
}

#[async_trait]
impl CredentialResolver for JwtResolver {
    async fn resolve(&self, token: &str) -> Result<VerifiedIdentity> {
        let key = match &self.keys {
            KeySource::Secret(key) => key.clone(),
            KeySource::Jwks(cache) => {
                let header = decode_header(token)?;
                cache.key(header.kid.as_deref()).await?
            },
        };

        let claims = decode::<Claims>(token, &key, &self.validation)?.claims;
        if claims.sub.trim().is_empty() {
            return Err(IdentityError::EmptySubject);
        }

        Ok(VerifiedIdentity {
            subject_id: claims.sub,
            claimed_name: claims.name.filter(|n| !n.trim().is_empty()),
            claimed_email: claims.email.filter(|e| !e.trim().is_empty()),
        })
    }
}
