//! Bearer-token authentication.
//!
//! Requests carry `Authorization: Bearer <jwt>` signed with HS256. The
//! token's `sub` is the user id and `role` selects the operations the
//! caller may invoke. [`Caller`] is extracted per request and passed
//! explicitly into the service layer; there is no global session.
//!
//! Tokens are minted by an external identity provider sharing the secret;
//! the gateway only verifies them.

use axum::extract::FromRequestParts;
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use jsonwebtoken::{Algorithm, DecodingKey, Validation, decode};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::app_state::AppState;
use crate::error::GatewayError;

/// Access level of a caller. Ordered: `User < Operator < Admin`.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, ToSchema,
)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Pool member or prospective member.
    User,
    /// May create pools and read cross-pool statistics.
    Operator,
    /// May additionally promote blocks to global.
    Admin,
}

/// Authenticated identity of the current request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Caller {
    /// Stable user id (`sub` claim).
    pub user_id: String,
    /// Granted role.
    pub role: Role,
}

impl Caller {
    /// Creates a caller.
    #[must_use]
    pub fn new(user_id: impl Into<String>, role: Role) -> Self {
        Self {
            user_id: user_id.into(),
            role,
        }
    }

    /// Returns `true` for operators and admins.
    #[must_use]
    pub fn is_operator(&self) -> bool {
        self.role >= Role::Operator
    }

    /// Fails unless the caller is an operator or admin.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::Unauthorized`].
    pub fn require_operator(&self) -> Result<(), GatewayError> {
        if self.is_operator() {
            Ok(())
        } else {
            Err(GatewayError::Unauthorized("operator role required".to_string()))
        }
    }

    /// Fails unless the caller is an admin.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::Unauthorized`].
    pub fn require_admin(&self) -> Result<(), GatewayError> {
        if self.role == Role::Admin {
            Ok(())
        } else {
            Err(GatewayError::Unauthorized("admin role required".to_string()))
        }
    }
}

/// JWT claims carried by every token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// User id.
    pub sub: String,
    /// Granted role.
    pub role: Role,
    /// Issued-at, seconds since the Unix epoch.
    pub iat: i64,
    /// Expiry, seconds since the Unix epoch.
    pub exp: i64,
}

/// Verifies HS256 tokens with a shared secret.
pub struct TokenVerifier {
    decoding_key: DecodingKey,
    validation: Validation,
}

impl std::fmt::Debug for TokenVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenVerifier")
            .field("algorithm", &Algorithm::HS256)
            .finish_non_exhaustive()
    }
}

impl TokenVerifier {
    /// Creates a verifier for `secret`.
    #[must_use]
    pub fn new(secret: &str) -> Self {
        Self {
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            validation: Validation::new(Algorithm::HS256),
        }
    }

    /// Verifies a token and returns the caller it identifies.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::Unauthenticated`] for a bad signature, an
    /// expired token, or an empty subject.
    pub fn verify(&self, token: &str) -> Result<Caller, GatewayError> {
        let data = decode::<Claims>(token, &self.decoding_key, &self.validation)
            .map_err(|e| GatewayError::Unauthenticated(e.to_string()))?;
        if data.claims.sub.is_empty() {
            return Err(GatewayError::Unauthenticated("empty subject".to_string()));
        }
        Ok(Caller::new(data.claims.sub, data.claims.role))
    }

    /// Verifies an `Authorization` header value of the form `Bearer <jwt>`.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::Unauthenticated`] if the scheme is missing or
    /// the token does not verify.
    pub fn verify_header(&self, header: Option<&str>) -> Result<Caller, GatewayError> {
        let header = header
            .ok_or_else(|| GatewayError::Unauthenticated("missing bearer token".to_string()))?;
        let token = header
            .strip_prefix("Bearer ")
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .ok_or_else(|| GatewayError::Unauthenticated("expected Bearer scheme".to_string()))?;
        self.verify(token)
    }
}

impl FromRequestParts<AppState> for Caller {
    type Rejection = GatewayError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let header = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|v| v.to_str().ok());
        state.verifier.verify_header(header)
    }
}
