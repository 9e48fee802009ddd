//! JWT session tokens
//!
//! After the identity provider accepts a sign-in, the server issues its own
//! access and refresh tokens. Supports revocation on logout and a lockout
//! after repeated failed sign-ins.

use anyhow::{bail, Context, Result};
use axum::{
    extract::{Request, State},
    http::{header::AUTHORIZATION, StatusCode},
    middleware::Next,
    response::Response,
};
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

/// JWT claims structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (user ID)
    pub sub: String,
    /// Issued at
    pub iat: i64,
    /// Expiration time
    pub exp: i64,
    /// Token type (access or refresh)
    pub token_type: TokenType,
    /// Token ID for revocation
    pub jti: String,
}

/// Token type
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TokenType {
    Access,
    Refresh,
}

/// Token settings
#[derive(Debug, Clone)]
pub struct AuthConfig {
    /// JWT secret key (should be 256-bit for HS256)
    pub jwt_secret: String,
    /// Access token expiration (minutes)
    pub access_token_expiry_minutes: i64,
    /// Refresh token expiration (days)
    pub refresh_token_expiry_days: i64,
    /// Maximum failed login attempts before lockout
    pub max_login_attempts: u32,
    /// Lockout duration (minutes)
    pub lockout_duration_minutes: i64,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            jwt_secret: generate_jwt_secret(),
            access_token_expiry_minutes: 60,
            refresh_token_expiry_days: 7,
            max_login_attempts: 5,
            lockout_duration_minutes: 30,
        }
    }
}

impl AuthConfig {
    pub fn from_config(config: &crate::config::AuthConfig) -> Self {
        Self {
            jwt_secret: config.jwt_secret.clone().unwrap_or_else(generate_jwt_secret),
            access_token_expiry_minutes: config.access_token_expiry_minutes,
            refresh_token_expiry_days: config.refresh_token_expiry_days,
            max_login_attempts: config.max_login_attempts,
            lockout_duration_minutes: config.lockout_duration_minutes,
        }
    }
}

/// Authentication state
pub struct AuthState {
    config: AuthConfig,
    /// Revoked token IDs (for logout)
    revoked_tokens: RwLock<HashMap<String, DateTime<Utc>>>,
    /// Failed login attempts
    login_attempts: RwLock<HashMap<String, (u32, DateTime<Utc>)>>,
    /// Outstanding refresh token IDs per user, with their expiry
    refresh_tokens: RwLock<HashMap<String, HashMap<String, DateTime<Utc>>>>,
}

impl AuthState {
    /// Create new auth state with config
    pub fn new(config: AuthConfig) -> Arc<Self> {
        Arc::new(Self {
            config,
            revoked_tokens: RwLock::new(HashMap::new()),
            login_attempts: RwLock::new(HashMap::new()),
            refresh_tokens: RwLock::new(HashMap::new()),
        })
    }

    pub fn access_token_expiry_seconds(&self) -> i64 {
        self.config.access_token_expiry_minutes * 60
    }

    fn issue(&self, user_id: &str, token_type: TokenType, lifetime: Duration) -> Result<(String, Claims)> {
        let now = Utc::now();
        let claims = Claims {
            sub: user_id.to_string(),
            iat: now.timestamp(),
            exp: (now + lifetime).timestamp(),
            token_type,
            jti: uuid::Uuid::new_v4().to_string(),
        };

        let token = encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(self.config.jwt_secret.as_bytes()),
        )
        .context("Failed to encode JWT")?;
        Ok((token, claims))
    }

    /// Generate access token for user
    pub fn generate_access_token(&self, user_id: &str) -> Result<String> {
        let (token, _) = self.issue(
            user_id,
            TokenType::Access,
            Duration::minutes(self.config.access_token_expiry_minutes),
        )?;
        Ok(token)
    }

    /// Generate refresh token
    pub fn generate_refresh_token(&self, user_id: &str) -> Result<String> {
        let lifetime = Duration::days(self.config.refresh_token_expiry_days);
        let (token, claims) = self.issue(user_id, TokenType::Refresh, lifetime)?;

        let mut outstanding = self.refresh_tokens.write().unwrap_or_else(PoisonError::into_inner);
        outstanding
            .entry(user_id.to_string())
            .or_default()
            .insert(claims.jti, Utc::now() + lifetime);
        Ok(token)
    }

    /// Validate and decode token
    pub fn validate_token(&self, token: &str) -> Result<Claims> {
        let validation = Validation::new(Algorithm::HS256);
        let token_data = decode::<Claims>(
            token,
            &DecodingKey::from_secret(self.config.jwt_secret.as_bytes()),
            &validation,
        )
        .context("Invalid token")?;

        if self.is_token_revoked(&token_data.claims.jti) {
            bail!("Token has been revoked");
        }

        Ok(token_data.claims)
    }

    /// Revoke a token (logout)
    pub fn revoke_token(&self, jti: &str) {
        let mut revoked = self.revoked_tokens.write().unwrap_or_else(PoisonError::into_inner);
        revoked.insert(jti.to_string(), Utc::now());
    }

    /// Revoke every refresh token issued to a user (sign-out)
    pub fn revoke_user_refresh_tokens(&self, user_id: &str) {
        let jtis = {
            let mut outstanding = self.refresh_tokens.write().unwrap_or_else(PoisonError::into_inner);
            outstanding.remove(user_id).unwrap_or_default()
        };
        for jti in jtis.keys() {
            self.revoke_token(jti);
        }
    }

    /// Check if token is revoked
    fn is_token_revoked(&self, jti: &str) -> bool {
        let revoked = self.revoked_tokens.read().unwrap_or_else(PoisonError::into_inner);
        revoked.contains_key(jti)
    }

    /// Record failed login attempt
    pub fn record_failed_login(&self, identifier: &str) {
        let mut attempts = self.login_attempts.write().unwrap_or_else(PoisonError::into_inner);
        let entry = attempts.entry(identifier.to_string()).or_insert((0, Utc::now()));
        entry.0 += 1;
        entry.1 = Utc::now();
    }

    /// Remaining lockout, if the identifier is locked
    pub fn is_locked(&self, identifier: &str) -> Option<Duration> {
        let attempts = self.login_attempts.read().unwrap_or_else(PoisonError::into_inner);
        if let Some((count, last_attempt)) = attempts.get(identifier) {
            if *count >= self.config.max_login_attempts {
                let lockout_end = *last_attempt + Duration::minutes(self.config.lockout_duration_minutes);
                let now = Utc::now();
                if now < lockout_end {
                    return Some(lockout_end - now);
                }
            }
        }
        None
    }

    /// Clear login attempts (on successful login)
    pub fn clear_login_attempts(&self, identifier: &str) {
        let mut attempts = self.login_attempts.write().unwrap_or_else(PoisonError::into_inner);
        attempts.remove(identifier);
    }

    /// Drop revocations older than the longest token lifetime
    pub fn cleanup(&self) {
        let now = Utc::now();
        let horizon = Duration::days(self.config.refresh_token_expiry_days);
        let mut revoked = self.revoked_tokens.write().unwrap_or_else(PoisonError::into_inner);
        revoked.retain(|_, revoked_at| now - *revoked_at <= horizon);
        drop(revoked);

        let mut outstanding = self.refresh_tokens.write().unwrap_or_else(PoisonError::into_inner);
        for tokens in outstanding.values_mut() {
            tokens.retain(|_, expires| *expires > now);
        }
        outstanding.retain(|_, tokens| !tokens.is_empty());
    }
}

/// Generate a secure JWT secret
pub fn generate_jwt_secret() -> String {
    use rand::Rng;
    let bytes: [u8; 32] = rand::rng().random();
    base64::Engine::encode(&base64::engine::general_purpose::STANDARD, bytes)
}

/// Axum middleware for JWT authentication
pub async fn auth_middleware(
    State(state): State<Arc<AuthState>>,
    mut request: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    let token = request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|header| header.to_str().ok())
        .and_then(|header| header.strip_prefix("Bearer "))
        .ok_or(StatusCode::UNAUTHORIZED)?;

    let claims = state.validate_token(token).map_err(|_| StatusCode::UNAUTHORIZED)?;

    if claims.token_type != TokenType::Access {
        return Err(StatusCode::UNAUTHORIZED);
    }

    // Handlers pick the claims up as an Extension
    request.extensions_mut().insert(claims);

    Ok(next.run(request).await)
}

/// Email/password request for sign-in and sign-up
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CredentialsRequest {
    pub email: String,
    pub password: String,
}

/// Login response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginResponse {
    pub user_id: String,
    pub access_token: String,
    pub refresh_token: String,
    pub token_type: String,
    pub expires_in: i64,
}

/// Refresh token request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefreshRequest {
    pub refresh_token: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_jwt_generation_and_validation() {
        let state = AuthState::new(AuthConfig::default());

        let token = state.generate_access_token("user123").unwrap();
        let claims = state.validate_token(&token).unwrap();

        assert_eq!(claims.sub, "user123");
        assert_eq!(claims.token_type, TokenType::Access);
    }

    #[test]
    fn test_token_revocation() {
        let state = AuthState::new(AuthConfig::default());

        let token = state.generate_access_token("user123").unwrap();
        let claims = state.validate_token(&token).unwrap();

        state.revoke_token(&claims.jti);

        assert!(state.validate_token(&token).is_err());
    }

    #[test]
    fn test_refresh_token() {
        let state = AuthState::new(AuthConfig::default());

        let token = state.generate_refresh_token("user123").unwrap();
        let claims = state.validate_token(&token).unwrap();

        assert_eq!(claims.token_type, TokenType::Refresh);
    }

    #[test]
    fn test_foreign_secret_rejected() {
        let ours = AuthState::new(AuthConfig::default());
        let theirs = AuthState::new(AuthConfig::default());
        let token = theirs.generate_access_token("user123").unwrap();
        assert!(ours.validate_token(&token).is_err());
    }

    #[test]
    fn test_lockout_after_failed_attempts() {
        let state = AuthState::new(AuthConfig { max_login_attempts: 2, ..AuthConfig::default() });

        state.record_failed_login("ada@example.com");
        assert!(state.is_locked("ada@example.com").is_none());
        state.record_failed_login("ada@example.com");
        assert!(state.is_locked("ada@example.com").is_some());

        state.clear_login_attempts("ada@example.com");
        assert!(state.is_locked("ada@example.com").is_none());
    }

    #[test]
    fn test_sign_out_revokes_refresh_tokens() {
        let state = AuthState::new(AuthConfig::default());
        let first = state.generate_refresh_token("user-1").unwrap();
        let second = state.generate_refresh_token("user-1").unwrap();
        let other = state.generate_refresh_token("user-2").unwrap();

        state.revoke_user_refresh_tokens("user-1");
        assert!(state.validate_token(&first).is_err());
        assert!(state.validate_token(&second).is_err());
        assert!(state.validate_token(&other).is_ok());

        // a fresh sign-in is unaffected
        let renewed = state.generate_refresh_token("user-1").unwrap();
        assert!(state.validate_token(&renewed).is_ok());
    }
}
