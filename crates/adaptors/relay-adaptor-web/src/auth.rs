//! Authentication gate for the session and chat routes
//!
//! Tokens are kept as SHA-256 hashes. With no tokens configured every
//! request is authenticated as a guest.

use crate::error::ApiError;
use crate::AppState;
use axum::extract::{Request, State};
use axum::http::{header, HeaderMap};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use relay_core::{RelayError, Result};
use sha2::{Digest, Sha256};
use std::collections::HashSet;
use tracing::{debug, warn};

/// Cookie carrying the token for browser clients
pub const TOKEN_COOKIE: &str = "relay_token";

/// Who made a request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthenticatedUser {
    /// No tokens configured
    Guest,
    /// Holder of a configured token, identified by a short hash prefix
    Token { fingerprint: String },
}

/// Decides whether a request has a user
#[derive(Debug, Clone, Default)]
pub struct SessionAuthenticator {
    token_hashes: HashSet<String>,
}

impl SessionAuthenticator {
    /// Accept the given plain tokens; blank entries are skipped
    pub fn new<I, S>(tokens: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            token_hashes: tokens
                .into_iter()
                .map(|t| t.as_ref().trim().to_string())
                .filter(|t| !t.is_empty())
                .map(|t| Self::hash_token(&t))
                .collect(),
        }
    }

    /// Guest mode: every request is authenticated
    pub fn disabled() -> Self {
        Self::default()
    }

    pub fn is_guest_mode(&self) -> bool {
        self.token_hashes.is_empty()
    }

    /// Hash a token for storage and comparison
    pub fn hash_token(token: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(token.as_bytes());
        format!("{:x}", hasher.finalize())
    }

    /// Validate a presented token
    pub fn validate_token(&self, token: &str) -> Result<AuthenticatedUser> {
        if self.is_guest_mode() {
            debug!("Authentication disabled, allowing guest");
            return Ok(AuthenticatedUser::Guest);
        }

        let hash = Self::hash_token(token);
        if self.token_hashes.contains(&hash) {
            Ok(AuthenticatedUser::Token {
                fingerprint: hash[..8].to_string(),
            })
        } else {
            warn!("Authentication failed: invalid token");
            Err(RelayError::unauthorized("Invalid authentication token"))
        }
    }

    /// Authenticate from the bearer header, then the token cookie
    pub fn authenticate(&self, headers: &HeaderMap) -> Result<AuthenticatedUser> {
        if self.is_guest_mode() {
            return Ok(AuthenticatedUser::Guest);
        }
        match bearer_token(headers).or_else(|| cookie_token(headers)) {
            Some(token) => self.validate_token(&token),
            None => Err(RelayError::unauthorized("Missing authentication token")),
        }
    }
}

fn bearer_token(headers: &HeaderMap) -> Option<String> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
}

fn cookie_token(headers: &HeaderMap) -> Option<String> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, _)| *name == TOKEN_COOKIE)
        .map(|(_, value)| value.trim().to_string())
        .filter(|t| !t.is_empty())
}

/// Middleware rejecting requests without a user
pub async fn require_user(State(state): State<AppState>, mut request: Request, next: Next) -> Response {
    match state.auth.authenticate(request.headers()) {
        Ok(user) => {
            debug!("Request authenticated: {:?}", user);
            request.extensions_mut().insert(user);
            next.run(request).await
        }
        Err(e) => ApiError::from(e).into_response(),
    }
}
