//! Client-SDK-style identity provider
//!
//! Mirrors the shape of the Firebase client SDKs: initialize an app from the
//! project config, take its `auth()` handle, then call
//! `sign_in_with_email_and_password` / `create_user_with_email_and_password`.
//! Requests go to the Identity Toolkit v3 `relyingparty` endpoints the SDKs use.

use std::time::Duration;

use anyhow::{Context, Result};
use reqwest::Client;
use serde_json::json;
use tracing::debug;

use super::{parse_account_response, AuthError, IdentityProvider, SignedIn, SignedUp};
use crate::config::FirebaseConfig;

const RELYING_PARTY_BASE: &str = "https://www.googleapis.com/identitytoolkit/v3/relyingparty";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// An initialized Firebase app
#[derive(Debug, Clone)]
pub struct FirebaseApp {
    api_key: String,
    http_client: Client,
}

/// A signed-in (or freshly created) account
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FirebaseUser {
    pub local_id: String,
    pub id_token: String,
    pub refresh_token: Option<String>,
    pub email: Option<String>,
}

impl FirebaseApp {
    /// Initialize from project config; the web API key is required
    pub fn initialize(config: FirebaseConfig) -> Result<Self> {
        let api_key = config
            .api_key
            .filter(|k| !k.is_empty())
            .context("Firebase config has no api_key")?;
        let http_client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self {
            api_key,
            http_client,
        })
    }

    /// Auth handle bound to this app
    pub fn auth(&self) -> Auth<'_> {
        Auth { app: self }
    }
}

/// Authentication API of a [`FirebaseApp`]
pub struct Auth<'a> {
    app: &'a FirebaseApp,
}

impl Auth<'_> {
    fn endpoint(&self, method: &str) -> String {
        format!("{}/{}?key={}", RELYING_PARTY_BASE, method, self.app.api_key)
    }

    async fn request(&self, method: &str, email: &str, password: &str) -> Result<FirebaseUser, AuthError> {
        let response = self
            .app
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
        let account = parse_account_response(status, &body)?;

        Ok(FirebaseUser {
            local_id: account.local_id,
            id_token: account.id_token,
            refresh_token: account.refresh_token,
            email: account.email,
        })
    }

    pub async fn sign_in_with_email_and_password(
        &self,
        email: &str,
        password: &str,
    ) -> Result<FirebaseUser, AuthError> {
        self.request("verifyPassword", email, password).await
    }

    pub async fn create_user_with_email_and_password(
        &self,
        email: &str,
        password: &str,
    ) -> Result<FirebaseUser, AuthError> {
        self.request("signupNewUser", email, password).await
    }
}

/// [`IdentityProvider`] over an initialized [`FirebaseApp`]
pub struct SdkIdentity {
    app: FirebaseApp,
}

impl SdkIdentity {
    pub fn new(app: FirebaseApp) -> Self {
        Self { app }
    }
}

#[async_trait::async_trait]
impl IdentityProvider for SdkIdentity {
    async fn sign_in(&self, email: &str, password: &str) -> Result<SignedIn, AuthError> {
        debug!("SDK sign-in for {}", email);
        let user = self.app.auth().sign_in_with_email_and_password(email, password).await?;
        Ok(SignedIn {
            user_id: user.local_id,
            session_token: user.id_token,
        })
    }

    async fn sign_up(&self, email: &str, password: &str) -> Result<SignedUp, AuthError> {
        debug!("SDK sign-up for {}", email);
        let user = self.app.auth().create_user_with_email_and_password(email, password).await?;
        Ok(SignedUp { user_id: user.local_id })
    }

    fn name(&self) -> &'static str {
        "sdk"
    }
}
