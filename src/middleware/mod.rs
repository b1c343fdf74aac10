//! Request authorization.
//!
//! A route declares its policy through the extractor type it takes:
//! `Caller` (any verified token), `OwnAccount` (token whose email equals the
//! `email` query parameter) or `Admin` (token whose user record has role
//! `admin`). A policy is an ordered list of checks; the first denial
//! short-circuits the request before the handler runs.

use axum::{
    extract::{FromRequestParts, Query},
    http::{header, request::Parts},
};
use serde::Deserialize;
use std::marker::PhantomData;
use std::sync::Arc;

use crate::error::AppError;
use crate::models::Role;
use crate::services::identity::Identity;
use crate::AppState;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Check {
    /// Valid bearer token from the identity provider.
    Token,
    /// Verified email equals the `email` query parameter.
    EmailMatch,
    /// Verified email belongs to a user with role `admin`.
    Admin,
}

pub trait Policy {
    const CHECKS: &'static [Check];
}

#[derive(Debug, Clone, Copy)]
pub struct TokenOnly;
#[derive(Debug, Clone, Copy)]
pub struct OwnEmail;
#[derive(Debug, Clone, Copy)]
pub struct AdminOnly;

impl Policy for TokenOnly {
    const CHECKS: &'static [Check] = &[Check::Token];
}

impl Policy for OwnEmail {
    const CHECKS: &'static [Check] = &[Check::Token, Check::EmailMatch];
}

impl Policy for AdminOnly {
    const CHECKS: &'static [Check] = &[Check::Token, Check::Admin];
}

#[derive(Debug)]
pub enum Decision {
    Allow,
    Deny(AppError),
}

/// Identity of a caller that passed policy `P`.
#[derive(Debug, Clone)]
pub struct Authorized<P> {
    pub identity: Identity,
    _policy: PhantomData<fn() -> P>,
}

pub type Caller = Authorized<TokenOnly>;
pub type OwnAccount = Authorized<OwnEmail>;
pub type Admin = Authorized<AdminOnly>;

impl<P> Authorized<P> {
    pub fn email(&self) -> &str {
        &self.identity.email
    }
}

fn bearer_token(parts: &Parts) -> Option<&str> {
    parts
        .headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
}

async fn verify_token(parts: &Parts, state: &AppState) -> Result<Identity, AppError> {
    let token = bearer_token(parts).ok_or(AppError::Unauthenticated)?;

    if let Some(cache) = &state.cache {
        if let Some(identity) = cache.get_cached_identity(token).await {
            return Ok(identity);
        }
    }

    let identity = state.identity.verify(token).await.map_err(|e| {
        tracing::debug!("token rejected: {}", e);
        AppError::Unauthenticated
    })?;

    if let Some(cache) = &state.cache {
        cache.cache_identity(token, &identity).await;
    }
    Ok(identity)
}

#[derive(Deserialize)]
struct EmailParam {
    email: Option<String>,
}

fn email_matches(parts: &Parts, identity: &Identity) -> Decision {
    let requested = Query::<EmailParam>::try_from_uri(&parts.uri)
        .ok()
        .and_then(|Query(param)| param.email);
    match requested {
        Some(email) if email == identity.email => Decision::Allow,
        _ => Decision::Deny(AppError::Forbidden),
    }
}

async fn is_admin(state: &AppState, identity: &Identity) -> Decision {
    match state.store.find_user_by_email(&identity.email).await {
        Ok(Some(user)) if user.role == Role::Admin => Decision::Allow,
        Ok(_) => Decision::Deny(AppError::Forbidden),
        Err(e) => {
            tracing::error!("admin lookup failed: {:?}", e);
            Decision::Deny(e.into())
        }
    }
}

/// Runs `checks` in order. `Token` must come first; later checks need the identity.
pub async fn authorize(checks: &[Check], parts: &Parts, state: &AppState) -> Result<Identity, AppError> {
    let mut identity: Option<Identity> = None;
    for check in checks {
        let decision = match check {
            Check::Token => {
                identity = Some(verify_token(parts, state).await?);
                Decision::Allow
            }
            Check::EmailMatch => match &identity {
                Some(id) => email_matches(parts, id),
                None => Decision::Deny(AppError::Unauthenticated),
            },
            Check::Admin => match &identity {
                Some(id) => is_admin(state, id).await,
                None => Decision::Deny(AppError::Unauthenticated),
            },
        };
        if let Decision::Deny(err) = decision {
            tracing::debug!("{:?} check denied {} {}", check, parts.method, parts.uri.path());
            return Err(err);
        }
    }
    identity.ok_or(AppError::Unauthenticated)
}

impl<P> FromRequestParts<Arc<AppState>> for Authorized<P>
where
    P: Policy,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &Arc<AppState>) -> Result<Self, Self::Rejection> {
        let identity = authorize(P::CHECKS, parts, state).await?;
        Ok(Authorized {
            identity,
            _policy: PhantomData,
        })
    }
}
