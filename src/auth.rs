//! # Authentication
//!
//! Resolves the current user from a bearer session token issued by the
//! authentication provider. Every protected route runs behind
//! [`auth_middleware`]; handlers receive the caller through the
//! [`CurrentUser`] extractor.

use std::sync::Arc;

use axum::{
    extract::{FromRequestParts, Request, State},
    http::{HeaderMap, header::AUTHORIZATION, request::Parts},
    middleware::Next,
    response::Response,
};
use jsonwebtoken::{Algorithm, DecodingKey, Validation, decode};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::error::{ApiError, unauthorized};

/// Authenticated caller, inserted into request extensions by [`auth_middleware`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CurrentUser(pub Uuid);

impl CurrentUser {
    pub fn id(&self) -> Uuid {
        self.0
    }
}

/// Reasons a request could not be bound to a user.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum AuthError {
    #[error("missing Authorization header")]
    MissingHeader,
    #[error("Authorization header must use Bearer scheme")]
    InvalidScheme,
    #[error("invalid session token")]
    InvalidToken,
    #[error("session token subject is not a user id")]
    InvalidSubject,
    #[error("authentication is not configured")]
    NotConfigured,
}

impl From<AuthError> for ApiError {
    fn from(error: AuthError) -> Self {
        match error {
            AuthError::MissingHeader => unauthorized(Some("Missing Authorization header")),
            AuthError::InvalidScheme => {
                unauthorized(Some("Authorization header must use Bearer scheme"))
            }
            _ => unauthorized(Some("Invalid or expired session")),
        }
    }
}

/// Resolves a bearer token into the owning user id.
pub trait CurrentUserResolver: Send + Sync {
    fn resolve(&self, bearer_token: &str) -> Result<Uuid, AuthError>;
}

/// Session token claims; only the subject is used.
#[derive(Debug, Serialize, Deserialize)]
pub struct SessionClaims {
    pub sub: String,
    pub exp: usize,
}

/// HS256 JWT resolver.
pub struct JwtUserResolver {
    key: Option<DecodingKey>,
    validation: Validation,
}

impl JwtUserResolver {
    pub fn new(secret: Option<&str>) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_aud = false;
        Self {
            key: secret.map(|s| DecodingKey::from_secret(s.as_bytes())),
            validation,
        }
    }
}

impl CurrentUserResolver for JwtUserResolver {
    fn resolve(&self, bearer_token: &str) -> Result<Uuid, AuthError> {
        let key = self.key.as_ref().ok_or(AuthError::NotConfigured)?;
        let data = decode::<SessionClaims>(bearer_token, key, &self.validation).map_err(|err| {
            tracing::debug!(error = %err, "Session token rejected");
            AuthError::InvalidToken
        })?;
        Uuid::parse_str(&data.claims.sub).map_err(|_| AuthError::InvalidSubject)
    }
}

fn extract_bearer_token(headers: &HeaderMap) -> Result<&str, AuthError> {
    let value = headers
        .get(AUTHORIZATION)
        .ok_or(AuthError::MissingHeader)?
        .to_str()
        .map_err(|_| AuthError::InvalidScheme)?;
    value
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .ok_or(AuthError::InvalidScheme)
}

/// Authentication middleware binding the request to a [`CurrentUser`].
pub async fn auth_middleware(
    State(resolver): State<Arc<dyn CurrentUserResolver>>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let token = extract_bearer_token(request.headers())?;
    let user_id = resolver.resolve(token)?;

    tracing::debug!(user_id = %user_id, "Authenticated request");
    request.extensions_mut().insert(CurrentUser(user_id));

    Ok(next.run(request).await)
}

impl<S> FromRequestParts<S> for CurrentUser
where
    S: Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<CurrentUser>()
            .copied()
            .ok_or_else(|| unauthorized(None))
    }
}
