//! Bearer-token authentication and role restriction.
//!
//! Handlers take an [`AuthUser`] argument to require a valid token, then call
//! [`AuthUser::require_any`] with the roles allowed for the operation.

use std::sync::Arc;

use axum::{extract::FromRequestParts, http::request::Parts};
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::errors::AppError;
use crate::handlers::AppState;

/// Role carried in the token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Manager,
    Admin,
}

impl Role {
    pub const ALL: &'static [Role] = &[Role::User, Role::Manager, Role::Admin];
    pub const STAFF: &'static [Role] = &[Role::Admin, Role::Manager];
    pub const ADMIN_ONLY: &'static [Role] = &[Role::Admin];

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Manager => "manager",
            Role::Admin => "admin",
        }
    }
}

impl std::str::FromStr for Role {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "user" => Ok(Role::User),
            "manager" => Ok(Role::Manager),
            "admin" => Ok(Role::Admin),
            other => Err(AppError::BadRequest(format!("Unknown role '{}'", other))),
        }
    }
}

/// JWT claims.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// User id.
    pub sub: Uuid,
    /// Workspace (tenant) id.
    pub workspace: Uuid,
    pub role: Role,
    pub iat: i64,
    pub exp: i64,
}

/// HS256 signing and verification keys.
#[derive(Clone)]
pub struct JwtKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
}

impl std::fmt::Debug for JwtKeys {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JwtKeys")
            .field("validation", &self.validation)
            .finish()
    }
}

impl JwtKeys {
    pub fn new(secret: &str) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = true;
        validation.leeway = 5;

        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            validation,
        }
    }

    /// Signs a token for `user_id` in `workspace_id`, valid for `ttl`.
    pub fn issue(
        &self,
        user_id: Uuid,
        workspace_id: Uuid,
        role: Role,
        ttl: Duration,
    ) -> Result<String, AppError> {
        let now = Utc::now();
        let claims = Claims {
            sub: user_id,
            workspace: workspace_id,
            role,
            iat: now.timestamp(),
            exp: now
                .checked_add_signed(ttl)
                .ok_or_else(|| AppError::BadRequest("Token lifetime is out of range".into()))?
                .timestamp(),
        };

        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
            .map_err(|e| AppError::InternalError(format!("Failed to sign token: {}", e)))
    }

    /// Verifies signature and expiry.
    pub fn verify(&self, token: &str) -> Result<Claims, AppError> {
        decode::<Claims>(token, &self.decoding, &self.validation)
            .map(|data| data.claims)
            .map_err(|e| match e.kind() {
                jsonwebtoken::errors::ErrorKind::ExpiredSignature => {
                    AppError::Unauthorized("Your token has expired. Please log in again".into())
                }
                jsonwebtoken::errors::ErrorKind::InvalidSignature => {
                    AppError::Unauthorized("Invalid token signature".into())
                }
                _ => AppError::Unauthorized("Invalid token. Please log in again".into()),
            })
    }
}

/// Authenticated caller, extracted from the `Authorization: Bearer` header.
#[derive(Debug, Clone, Copy)]
pub struct AuthUser {
    pub user_id: Uuid,
    pub workspace_id: Uuid,
    pub role: Role,
}

impl AuthUser {
    /// Fails with 403 unless the caller holds one of `roles`.
    pub fn require_any(&self, roles: &[Role]) -> Result<(), AppError> {
        if roles.contains(&self.role) {
            return Ok(());
        }
        Err(AppError::Forbidden(
            "You do not have permission to perform this action".into(),
        ))
    }

    pub fn is_staff(&self) -> bool {
        Role::STAFF.contains(&self.role)
    }
}

impl From<Claims> for AuthUser {
    fn from(claims: Claims) -> Self {
        Self {
            user_id: claims.sub,
            workspace_id: claims.workspace,
            role: claims.role,
        }
    }
}

#[axum::async_trait]
impl FromRequestParts<Arc<AppState>> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let header = parts
            .headers
            .get(axum::http::header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| {
                AppError::Unauthorized(
                    "You are not logged in! Please log in to get access".into(),
                )
            })?;

        let token = header
            .strip_prefix("Bearer ")
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .ok_or_else(|| AppError::Unauthorized("Invalid Authorization header format".into()))?;

        let claims = state.jwt.verify(token)?;
        tracing::debug!(
            user = %claims.sub,
            workspace = %claims.workspace,
            role = claims.role.as_str(),
            "Authenticated request"
        );

        Ok(AuthUser::from(claims))
    }
}
/// Longest lifetime a minted token may carry (ten years).
pub const MAX_TOKEN_HOURS: i64 = 24 * 365 * 10;

/// Converts an operator-supplied hour count into a token lifetime.
///
/// # Arguments
/// * `hours` - Requested lifetime, must lie in `1..=MAX_TOKEN_HOURS`
///
/// # Returns
/// * `Result<Duration, AppError>` - The lifetime, or BadRequest when out of range
pub fn ttl_from_hours(hours: i64) -> Result<Duration, AppError> {
    if !(1..=MAX_TOKEN_HOURS).contains(&hours) {
        return Err(AppError::BadRequest(format!(
            "Token lifetime must be between 1 and {} hours",
            MAX_TOKEN_HOURS
        )));
    }
    Duration::try_hours(hours)
        .ok_or_else(|| AppError::BadRequest("Token lifetime is out of range".into()))
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "test-secret-that-is-long-enough-1234567890";

    #[test]
    fn test_issue_and_verify_round_trip() {
        let keys = JwtKeys::new(SECRET);
        let user = Uuid::new_v4();
        let workspace = Uuid::new_v4();

        let token = keys
            .issue(user, workspace, Role::Manager, Duration::hours(1))
            .unwrap();
        let claims = keys.verify(&token).unwrap();

        assert_eq!(claims.sub, user);
        assert_eq!(claims.workspace, workspace);
        assert_eq!(claims.role, Role::Manager);
    }

    #[test]
    fn test_expired_token_is_rejected() {
        let keys = JwtKeys::new(SECRET);
        let token = keys
            .issue(
                Uuid::new_v4(),
                Uuid::new_v4(),
                Role::Admin,
                Duration::hours(-2),
            )
            .unwrap();

        match keys.verify(&token) {
            Err(AppError::Unauthorized(msg)) => assert!(msg.contains("expired")),
            other => panic!("expected expiry rejection, got {:?}", other),
        }
    }

    #[test]
    fn test_ttl_from_hours_bounds() {
        assert_eq!(ttl_from_hours(24).unwrap(), Duration::hours(24));
        assert!(ttl_from_hours(MAX_TOKEN_HOURS).is_ok());
        assert!(matches!(ttl_from_hours(0), Err(AppError::BadRequest(_))));
        assert!(matches!(ttl_from_hours(-5), Err(AppError::BadRequest(_))));
        assert!(matches!(ttl_from_hours(i64::MAX), Err(AppError::BadRequest(_))));
    }

    #[test]
    fn test_issue_rejects_unrepresentable_lifetime() {
        let keys = JwtKeys::new(SECRET);
        let result = keys.issue(Uuid::new_v4(), Uuid::new_v4(), Role::User, Duration::MAX);
        assert!(matches!(result, Err(AppError::BadRequest(_))));
    }

    #[test]
    fn test_foreign_signature_is_rejected() {
        let ours = JwtKeys::new(SECRET);
        let theirs = JwtKeys::new("another-secret-that-is-long-enough-0987654321");
        let token = theirs
            .issue(Uuid::new_v4(), Uuid::new_v4(), Role::Admin, Duration::hours(1))
            .unwrap();

        assert!(matches!(ours.verify(&token), Err(AppError::Unauthorized(_))));
    }

    #[test]
    fn test_require_any() {
        let user = AuthUser {
            user_id: Uuid::new_v4(),
            workspace_id: Uuid::new_v4(),
            role: Role::User,
        };
        assert!(user.require_any(Role::ALL).is_ok());
        assert!(matches!(
            user.require_any(Role::STAFF),
            Err(AppError::Forbidden(_))
        ));
        assert!(!user.is_staff());
    }

    #[test]
    fn test_role_parsing() {
        assert_eq!("Admin".parse::<Role>().unwrap(), Role::Admin);
        assert!("root".parse::<Role>().is_err());
    }
}
