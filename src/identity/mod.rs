//! Identity providers
//!
//! Email/password sign-in and sign-up behind one trait. The application never
//! branches on which provider is active:
//! - `rest`: direct calls to the Identity Toolkit v1 REST API
//! - `sdk`: a client-SDK-style app/auth wrapper
//! - `local`: self-hosted accounts in SQLite, for single-machine deployments

pub mod local;
pub mod rest;
pub mod sdk;

use std::sync::Arc;

use anyhow::Result;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

pub use local::LocalIdentity;
pub use rest::RestIdentity;
pub use sdk::{FirebaseApp, SdkIdentity};

/// Authentication failure
#[derive(Debug, Error)]
pub enum AuthError {
    /// Provider refused the request (bad credentials, duplicate email, ...)
    #[error("authentication rejected: {0}")]
    Rejected(String),

    /// Provider could not be reached or answered garbage
    #[error("identity provider unavailable: {0}")]
    Transport(String),
}

/// A successful sign-in
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedIn {
    pub user_id: String,
    /// Provider-issued session token
    pub session_token: String,
}

/// A successful registration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedUp {
    pub user_id: String,
}

/// Email/password identity provider
#[async_trait::async_trait]
pub trait IdentityProvider: Send + Sync {
    async fn sign_in(&self, email: &str, password: &str) -> Result<SignedIn, AuthError>;

    async fn sign_up(&self, email: &str, password: &str) -> Result<SignedUp, AuthError>;

    /// Provider name for logs and status output
    fn name(&self) -> &'static str;
}

/// Which identity provider to use
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IdentityBackend {
    Rest,
    Sdk,
    Local,
}

/// Build the configured identity provider
pub fn from_config(config: &crate::config::Config) -> Result<Arc<dyn IdentityProvider>> {
    let provider: Arc<dyn IdentityProvider> = match config.identity.backend {
        IdentityBackend::Rest => {
            let api_key = crate::security::get_api_key()?;
            Arc::new(RestIdentity::new(api_key)?)
        }
        IdentityBackend::Sdk => {
            let mut firebase = config.firebase.clone();
            firebase.api_key = Some(crate::security::get_api_key()?);
            Arc::new(SdkIdentity::new(FirebaseApp::initialize(firebase)?))
        }
        IdentityBackend::Local => Arc::new(LocalIdentity::open(config.identity.accounts_path()?)?),
    };
    info!("Using {} identity provider", provider.name());
    Ok(provider)
}

/// Shape of Identity Toolkit account responses (v1 and v3 agree on these)
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct AccountResponse {
    pub local_id: String,
    #[serde(default)]
    pub id_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: String,
}

/// Turn an Identity Toolkit reply into an account or an [`AuthError`]
pub(crate) fn parse_account_response(
    status: reqwest::StatusCode,
    body: &str,
) -> Result<AccountResponse, AuthError> {
    if status.is_success() {
        return serde_json::from_str(body)
            .map_err(|e| AuthError::Transport(format!("unexpected response: {}", e)));
    }

    match serde_json::from_str::<ErrorEnvelope>(body) {
        Ok(envelope) => Err(AuthError::Rejected(envelope.error.message)),
        Err(_) if status.is_server_error() => {
            Err(AuthError::Transport(format!("identity service returned {}", status)))
        }
        Err(_) => Err(AuthError::Rejected(status.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::StatusCode;

    #[test]
    fn test_parse_success() {
        let body = r#"{"kind":"identitytoolkit#VerifyPasswordResponse","localId":"uid-1","idToken":"tok","refreshToken":"ref","email":"a@b.c","expiresIn":"3600"}"#;
        let account = parse_account_response(StatusCode::OK, body).unwrap();
        assert_eq!(account.local_id, "uid-1");
        assert_eq!(account.id_token, "tok");
        assert_eq!(account.refresh_token.as_deref(), Some("ref"));
    }

    #[test]
    fn test_parse_rejection() {
        let body = r#"{"error":{"code":400,"message":"EMAIL_EXISTS","errors":[]}}"#;
        match parse_account_response(StatusCode::BAD_REQUEST, body) {
            Err(AuthError::Rejected(reason)) => assert_eq!(reason, "EMAIL_EXISTS"),
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn test_parse_server_error() {
        let result = parse_account_response(StatusCode::BAD_GATEWAY, "<html>oops</html>");
        assert!(matches!(result, Err(AuthError::Transport(_))));
    }

    #[test]
    fn test_parse_garbled_success() {
        let result = parse_account_response(StatusCode::OK, "{}");
        assert!(matches!(result, Err(AuthError::Transport(_))));
    }
}
