//! Bearer-token verification against the external identity provider.
//!
//! Tokens are RS256 JWTs signed with keys published as a JWK set. The key set
//! is cached for an hour and refetched early when a token names a `kid` we
//! have not seen yet (the provider rotates keys). Early refetches happen at
//! most once per `refetch_interval`, so a stream of tokens with made-up kids
//! cannot turn into a stream of key fetches.

use async_trait::async_trait;
use base64::{engine::general_purpose, Engine as _};
use jsonwebtoken::{decode, decode_header, jwk::JwkSet, Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::RwLock;
use tokio::time::Instant;
use tracing::{debug, info};

use crate::config::IdentityConfig;

const KEY_SET_TTL: Duration = Duration::from_secs(3600);
const REFETCH_INTERVAL: Duration = Duration::from_secs(60);

/// Caller identity attached to a request once its token has been verified.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub uid: String,
    pub email: String,
    /// Token expiry, unix seconds.
    pub expires_at: i64,
}

#[derive(Debug, Error)]
pub enum VerifyError {
    #[error("invalid token: {0}")]
    Invalid(#[from] jsonwebtoken::errors::Error),

    #[error("token is not signed by a known key")]
    UnknownKey,

    #[error("token carries no email claim")]
    MissingEmail,

    #[error("could not fetch signing keys: {0}")]
    KeyFetch(#[from] reqwest::Error),
}

#[async_trait]
pub trait IdentityVerifier: Send + Sync {
    async fn verify(&self, token: &str) -> Result<Identity, VerifyError>;
}

#[derive(Deserialize)]
struct ServiceAccount {
    project_id: String,
}

/// Extracts the project id from the base64-encoded service-account JSON.
pub fn project_id_from_service_key(encoded: &str) -> anyhow::Result<String> {
    let decoded = general_purpose::STANDARD
        .decode(encoded.trim())
        .map_err(|e| anyhow::anyhow!("FB_SERVICE_KEY is not valid base64: {}", e))?;
    let account: ServiceAccount = serde_json::from_slice(&decoded)
        .map_err(|e| anyhow::anyhow!("FB_SERVICE_KEY is not a service-account document: {}", e))?;
    Ok(account.project_id)
}

#[derive(Debug, Deserialize)]
struct Claims {
    sub: String,
    email: Option<String>,
    exp: i64,
}

struct CachedKeys {
    set: JwkSet,
    fetched_at: Instant,
}

pub struct FirebaseVerifier {
    project_id: String,
    jwks_url: String,
    http: reqwest::Client,
    keys: RwLock<Option<CachedKeys>>,
    refetch_interval: Duration,
}

impl FirebaseVerifier {
    pub fn new(project_id: impl Into<String>, jwks_url: impl Into<String>) -> Self {
        Self {
            project_id: project_id.into(),
            jwks_url: jwks_url.into(),
            http: reqwest::Client::builder()
                .timeout(Duration::from_secs(10))
                .build()
                .unwrap_or_default(),
            keys: RwLock::new(None),
            refetch_interval: REFETCH_INTERVAL,
        }
    }

    /// Minimum age of the cached key set before an unknown `kid` triggers a refetch.
    pub fn with_refetch_interval(mut self, interval: Duration) -> Self {
        self.refetch_interval = interval;
        self
    }

    pub fn from_config(config: &IdentityConfig) -> anyhow::Result<Self> {
        let project_id = project_id_from_service_key(&config.service_key)?;
        info!("Identity verifier configured for project {}", project_id);
        Ok(Self::new(project_id, config.jwks_url.clone()))
    }

    fn issuer(&self) -> String {
        format!("https://securetoken.google.com/{}", self.project_id)
    }

    async fn fetch_keys(&self) -> Result<JwkSet, VerifyError> {
        debug!("Fetching identity signing keys from {}", self.jwks_url);
        let set = self
            .http
            .get(&self.jwks_url)
            .send()
            .await?
            .error_for_status()?
            .json::<JwkSet>()
            .await?;
        Ok(set)
    }

    async fn decoding_key(&self, kid: &str) -> Result<DecodingKey, VerifyError> {
        {
            let cached = self.keys.read().await;
            if let Some(cached) = cached.as_ref() {
                let age = cached.fetched_at.elapsed();
                if age < KEY_SET_TTL {
                    if let Some(jwk) = cached.set.find(kid) {
                        return Ok(DecodingKey::from_jwk(jwk)?);
                    }
                    if age < self.refetch_interval {
                        debug!("Unknown kid {} within refetch interval, not refetching", kid);
                        return Err(VerifyError::UnknownKey);
                    }
                }
            }
        }

        let set = self.fetch_keys().await?;
        let key = set.find(kid).map(DecodingKey::from_jwk).transpose()?;
        *self.keys.write().await = Some(CachedKeys { set, fetched_at: Instant::now() });
        key.ok_or(VerifyError::UnknownKey)
    }
}

#[async_trait]
impl IdentityVerifier for FirebaseVerifier {
    async fn verify(&self, token: &str) -> Result<Identity, VerifyError> {
        let header = decode_header(token)?;
        let kid = header.kid.ok_or(VerifyError::UnknownKey)?;
        let key = self.decoding_key(&kid).await?;

        let mut validation = Validation::new(Algorithm::RS256);
        validation.set_audience(&[&self.project_id]);
        validation.set_issuer(&[self.issuer()]);

        let data = decode::<Claims>(token, &key, &validation)?;
        let email = data.claims.email.ok_or(VerifyError::MissingEmail)?;
        Ok(Identity { uid: data.claims.sub, email, expires_at: data.claims.exp })
    }
}
