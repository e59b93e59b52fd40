//! Session verification.
//!
//! Requests may carry a bearer token in the `Authorization` header or an
//! `auth_token` cookie. A valid token attaches the verified [`Identity`] to
//! the request; an invalid one is rejected with 401 before any handler runs.
//! Requests without a token proceed anonymously, and `GET /auth/me` is the
//! probe that tells the two cases apart.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use axum::extract::{Request, State};
use axum::http::{HeaderMap, header};
use axum::middleware::Next;
use axum::response::Response;
use axum::{Extension, Json};
use serde::Serialize;
use thiserror::Error;

use crate::error::ApiError;

/// A verified caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Identity {
    pub name: String,
}

/// The identity attached to every request: verified or anonymous.
#[derive(Debug, Clone)]
pub struct CurrentUser(pub Option<Identity>);

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VerifyError {
    #[error("invalid session token")]
    InvalidToken,
}

/// Turns a session token into a verified identity.
///
/// Token issuance and credential storage live behind this trait; the API
/// only ever consumes tokens.
#[async_trait]
pub trait SessionVerifier: Send + Sync {
    async fn verify(&self, token: &str) -> Result<Identity, VerifyError>;
}

pub type DynSessionVerifier = Arc<dyn SessionVerifier>;

/// Verifier backed by a static token table from configuration.
#[derive(Debug, Clone, Default)]
pub struct StaticTokenVerifier {
    tokens: HashMap<String, String>,
}

impl StaticTokenVerifier {
    /// Parses a comma-separated list of `name:token` pairs, skipping
    /// malformed entries.
    pub fn from_spec(spec: &str) -> Self {
        let tokens = spec
            .split(',')
            .filter_map(|pair| {
                let (name, token) = pair.trim().split_once(':')?;
                if name.is_empty() || token.is_empty() {
                    return None;
                }
                Some((token.to_string(), name.to_string()))
            })
            .collect();
        Self { tokens }
    }

    /// Registers one token, builder-style.
    pub fn with_token(mut self, name: impl Into<String>, token: impl Into<String>) -> Self {
        self.tokens.insert(token.into(), name.into());
        self
    }
}

#[async_trait]
impl SessionVerifier for StaticTokenVerifier {
    async fn verify(&self, token: &str) -> Result<Identity, VerifyError> {
        self.tokens
            .get(token)
            .map(|name| Identity { name: name.clone() })
            .ok_or(VerifyError::InvalidToken)
    }
}

/// Middleware that resolves the request's identity.
///
/// Invalid tokens are rejected here; tokenless requests pass through as
/// anonymous.
pub async fn authenticate(
    State(verifier): State<DynSessionVerifier>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let identity = match session_token(req.headers()) {
        Some(token) => Some(
            verifier
                .verify(&token)
                .await
                .map_err(|_| ApiError::Unauthorized("Invalid session token".to_string()))?,
        ),
        None => None,
    };
    req.extensions_mut().insert(CurrentUser(identity));
    Ok(next.run(req).await)
}

/// GET /auth/me — the verified identity, or 401 for anonymous callers.
pub async fn me(Extension(user): Extension<CurrentUser>) -> Result<Json<Identity>, ApiError> {
    match user.0 {
        Some(identity) => Ok(Json(identity)),
        None => Err(ApiError::Unauthorized(
            "Authentication required".to_string(),
        )),
    }
}

fn session_token(headers: &HeaderMap) -> Option<String> {
    if let Some(value) = headers.get(header::AUTHORIZATION)
        && let Ok(value) = value.to_str()
        && let Some(token) = value.strip_prefix("Bearer ")
    {
        return Some(token.trim().to_string());
    }

    let cookies = headers.get(header::COOKIE)?.to_str().ok()?;
    cookies.split(';').find_map(|pair| {
        let (name, value) = pair.trim().split_once('=')?;
        (name == "auth_token").then(|| value.to_string())
    })
}
