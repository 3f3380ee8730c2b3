use axum::http::HeaderMap;
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use crate::errors::AppError;

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub name: String,
    pub role: String,
    pub iat: i64,
    pub exp: i64,
}

/// Verified requester identity, resolved from the bearer token.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub id: String,
    pub name: String,
    pub role: String,
}

impl AuthUser {
    pub fn is_admin(&self) -> bool {
        self.role == "admin"
    }
}

/// Mint an HS256 token. There is no login endpoint; tokens come from an
/// external identity step. This is used by tests and operator tooling.
pub fn mint_token(
    secret: &str,
    user_id: &str,
    name: &str,
    role: &str,
    ttl_hours: i64,
) -> anyhow::Result<String> {
    let now = Utc::now();
    let claims = Claims {
        sub: user_id.to_string(),
        name: name.to_string(),
        role: role.to_string(),
        iat: now.timestamp(),
        exp: (now + Duration::hours(ttl_hours)).timestamp(),
    };
    let token = encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )?;
    Ok(token)
}

pub fn verify_token(secret: &str, token: &str) -> Result<AuthUser, AppError> {
    let data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::new(Algorithm::HS256),
    )
    .map_err(|_| AppError::Unauthorized)?;

    Ok(AuthUser {
        id: data.claims.sub,
        name: data.claims.name,
        role: data.claims.role,
    })
}

/// Resolve the requester from the Authorization header.
pub fn authenticate(headers: &HeaderMap, secret: &str) -> Result<AuthUser, AppError> {
    let auth = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");

    let token = auth.strip_prefix("Bearer ").ok_or(AppError::Unauthorized)?;
    verify_token(secret, token)
}

pub fn require_admin(headers: &HeaderMap, secret: &str) -> Result<AuthUser, AppError> {
    let user = authenticate(headers, secret)?;
    if !user.is_admin() {
        return Err(AppError::Forbidden("admin privilege required".to_string()));
    }
    Ok(user)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_round_trip() {
        let token = mint_token("secret", "u1", "Alice", "guest", 1).unwrap();
        let user = verify_token("secret", &token).unwrap();
        assert_eq!(user.id, "u1");
        assert_eq!(user.name, "Alice");
        assert!(!user.is_admin());
    }

    #[test]
    fn test_wrong_secret_rejected() {
        let token = mint_token("secret", "u1", "Alice", "guest", 1).unwrap();
        assert!(verify_token("other", &token).is_err());
    }

    #[test]
    fn test_admin_role() {
        let token = mint_token("secret", "a1", "Root", "admin", 1).unwrap();
        let user = verify_token("secret", &token).unwrap();
        assert!(user.is_admin());
    }

    #[test]
    fn test_missing_bearer_prefix() {
        let mut headers = HeaderMap::new();
        headers.insert("authorization", "not-a-bearer".parse().unwrap());
        assert!(authenticate(&headers, "secret").is_err());
    }
}
