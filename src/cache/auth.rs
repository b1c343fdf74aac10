use chrono::Utc;
use redis::AsyncCommands;
use sha2::{Digest, Sha256};

use crate::cache::CacheService;
use crate::services::identity::Identity;

const TOKEN_TTL_SECONDS: i64 = 300;

/// Tokens are never stored in clear; the key is their SHA-256.
pub fn token_key(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    format!("auth:token:{:x}", hasher.finalize())
}

/// How long a verified identity may stay cached: at most five minutes and
/// never past the token's own expiry. `None` when the token already expired.
pub fn identity_ttl(expires_at: i64, now: i64) -> Option<u64> {
    let remaining = expires_at - now;
    (remaining > 0).then(|| remaining.min(TOKEN_TTL_SECONDS) as u64)
}

impl CacheService {
    /// Identity previously verified for this bearer token.
    pub async fn get_cached_identity(&self, token: &str) -> Option<Identity> {
        let mut conn = self.conn.clone();
        let data: Option<String> = match conn.get(token_key(token)).await {
            Ok(data) => data,
            Err(e) => {
                tracing::warn!("identity cache read failed: {:?}", e);
                return None;
            }
        };
        let now = Utc::now().timestamp();
        data
            .and_then(|json| serde_json::from_str::<Identity>(&json).ok())
            .filter(|identity| identity.expires_at > now)
    }

    pub async fn cache_identity(&self, token: &str, identity: &Identity) {
        let Some(ttl) = identity_ttl(identity.expires_at, Utc::now().timestamp()) else {
            return;
        };
        let Ok(json) = serde_json::to_string(identity) else {
            return;
        };
        let mut conn = self.conn.clone();
        let res: Result<(), _> = conn.set_ex(token_key(token), json, ttl).await;
        if let Err(e) = res {
            tracing::warn!("identity cache write failed: {:?}", e);
        }
    }
}
