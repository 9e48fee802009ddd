//! Direct REST identity provider
//!
//! Calls the Identity Toolkit v1 endpoints `accounts:signInWithPassword` and
//! `accounts:signUp` with the project's web API key.

use std::time::Duration;

use anyhow::Context;
use reqwest::Client;
use serde_json::json;
use tracing::{debug, warn};

use super::{parse_account_response, AccountResponse, AuthError, IdentityProvider, SignedIn, SignedUp};

const IDENTITY_TOOLKIT_BASE: &str = "https://identitytoolkit.googleapis.com/v1";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone)]
pub struct RestIdentity {
    api_key: String,
    api_base: String,
    http_client: Client,
}

impl RestIdentity {
    pub fn new(api_key: impl Into<String>) -> anyhow::Result<Self> {
        Self::with_base(api_key, IDENTITY_TOOLKIT_BASE)
    }

    /// Point at a different endpoint, e.g. the auth emulator
    pub fn with_base(api_key: impl Into<String>, api_base: impl Into<String>) -> anyhow::Result<Self> {
        let http_client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self {
            api_key: api_key.into(),
            api_base: api_base.into().trim_end_matches('/').to_string(),
            http_client,
        })
    }

    fn endpoint(&self, method: &str) -> String {
        format!("{}/accounts:{}?key={}", self.api_base, method, self.api_key)
    }

    async fn post_credentials(
        &self,
        method: &str,
        email: &str,
        password: &str,
    ) -> Result<AccountResponse, AuthError> {
        let response = self
            .http_client
            .post(self.endpoint(method))
            .json(&json!({
                "email": email,
                "password": password,
                "returnSecureToken": true,
            }))
            .send()
            .await
            .map_err(|e| AuthError::Transport(e.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| AuthError::Transport(e.to_string()))?;
        parse_account_response(status, &body)
    }
}

#[async_trait::async_trait]
impl IdentityProvider for RestIdentity {
    async fn sign_in(&self, email: &str, password: &str) -> Result<SignedIn, AuthError> {
        debug!("REST sign-in for {}", email);
        let account = self
            .post_credentials("signInWithPassword", email, password)
            .await
            .map_err(|e| {
                warn!("Sign-in failed: {}", e);
                e
            })?;
        Ok(SignedIn {
            user_id: account.local_id,
            session_token: account.id_token,
        })
    }

    async fn sign_up(&self, email: &str, password: &str) -> Result<SignedUp, AuthError> {
        debug!("REST sign-up for {}", email);
        let account = self
            .post_credentials("signUp", email, password)
            .await
            .map_err(|e| {
                warn!("Sign-up failed: {}", e);
                e
            })?;
        Ok(SignedUp {
            user_id: account.local_id,
        })
    }

    fn name(&self) -> &'static str {
        "rest"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoints() {
        let identity = RestIdentity::new("KEY").unwrap();
        assert_eq!(
            identity.endpoint("signUp"),
            "https://identitytoolkit.googleapis.com/v1/accounts:signUp?key=KEY"
        );
        assert_eq!(
            identity.endpoint("signInWithPassword"),
            "https://identitytoolkit.googleapis.com/v1/accounts:signInWithPassword?key=KEY"
        );
    }

    #[test]
    fn test_custom_base() {
        let identity =
            RestIdentity::with_base("KEY", "http://localhost:9099/identitytoolkit.googleapis.com/v1/").unwrap();
        assert_eq!(
            identity.endpoint("signUp"),
            "http://localhost:9099/identitytoolkit.googleapis.com/v1/accounts:signUp?key=KEY"
        );
    }
}
