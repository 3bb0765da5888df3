//! Bearer token authentication.
//!
//! Tokens are issued by the identity provider and signed with the shared HS256 secret (`MKT_JWT_SECRET`). The server
//! only ever verifies them. The token subject is the user id; store owners are mapped to their store separately.
use std::fmt::Debug;

use actix_web::{dev::Payload, FromRequest, HttpMessage, HttpRequest};
use chrono::{DateTime, Utc};
use futures::future::{ready, Ready};
use jsonwebtoken::{decode, errors::ErrorKind, Algorithm, DecodingKey, Validation};
use log::debug;
use marketplace_engine::db_types::ActorRole;
use serde::{Deserialize, Serialize};

use crate::{
    config::AuthConfig,
    errors::{AuthError, ServerError},
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JwtClaims {
    /// The user id
    pub sub: String,
    pub roles: Vec<ActorRole>,
    /// Expiry time, in seconds since the unix epoch
    pub exp: usize,
}

impl JwtClaims {
    pub fn new(user_id: i64, roles: Vec<ActorRole>, expiry: DateTime<Utc>) -> Self {
        let exp = usize::try_from(expiry.timestamp()).unwrap_or_default();
        Self { sub: user_id.to_string(), roles, exp }
    }

    pub fn user_id(&self) -> Result<i64, AuthError> {
        self.sub.parse::<i64>().map_err(|e| AuthError::ValidationError(format!("Invalid subject {}. {e}", self.sub)))
    }

    pub fn has_role(&self, role: ActorRole) -> bool {
        self.roles.contains(&role)
    }
}

/// Claims are placed in the request extensions by [`crate::middleware::JwtMiddlewareFactory`]. Handlers on routes
/// that are not wrapped by it will always fail to extract them.
impl FromRequest for JwtClaims {
    type Error = ServerError;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _: &mut Payload) -> Self::Future {
        let claims = req.extensions().get::<JwtClaims>().cloned().ok_or(AuthError::MissingToken).map_err(Into::into);
        ready(claims)
    }
}

#[derive(Clone)]
pub struct TokenValidator {
    key: DecodingKey,
    validation: Validation,
}

impl Debug for TokenValidator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "TokenValidator({:?})", self.validation.algorithms)
    }
}

impl TokenValidator {
    pub fn new(config: &AuthConfig) -> Self {
        let key = DecodingKey::from_secret(config.jwt_secret.reveal().as_bytes());
        let validation = Validation::new(Algorithm::HS256);
        Self { key, validation }
    }

    /// Validates the value of an `Authorization` header, which must hold a bearer token.
    pub fn validate_header(&self, header: Option<&str>) -> Result<JwtClaims, AuthError> {
        let header = header.ok_or(AuthError::MissingToken)?;
        let token = header
            .strip_prefix("Bearer ")
            .ok_or_else(|| AuthError::PoorlyFormattedToken("Expected a bearer token".to_string()))?;
        self.validate(token.trim())
    }

    pub fn validate(&self, token: &str) -> Result<JwtClaims, AuthError> {
        let data = decode::<JwtClaims>(token, &self.key, &self.validation).map_err(|e| {
            debug!("💻️ Access token rejected. {e}");
            match e.kind() {
                ErrorKind::InvalidToken => AuthError::PoorlyFormattedToken(e.to_string()),
                _ => AuthError::ValidationError(e.to_string()),
            }
        })?;
        Ok(data.claims)
    }
}
