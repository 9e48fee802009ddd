//! Firebase Realtime Database profile store
//!
//! Profiles live at `users/{uid}` and are read and written over the database
//! REST API (`GET`/`PUT {database_url}/users/{uid}.json`). A database secret,
//! when configured, is sent as the `auth` query parameter.

use std::time::Duration;

use anyhow::Context;
use reqwest::{Client, StatusCode};
use tracing::debug;
use url::Url;

use super::{ProfileStore, StoreError};
use crate::types::Profile;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Realtime Database REST client for profile documents
#[derive(Debug, Clone)]
pub struct FirebaseStore {
    base: Url,
    secret: Option<String>,
    http_client: Client,
}

impl FirebaseStore {
    pub fn new(database_url: &str, secret: Option<String>) -> anyhow::Result<Self> {
        let base = Url::parse(database_url)
            .with_context(|| format!("Invalid database URL: {}", database_url))?;
        if base.cannot_be_a_base() {
            anyhow::bail!("Database URL cannot hold paths: {}", database_url);
        }
        let http_client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            base,
            secret: secret.filter(|s| !s.is_empty()),
            http_client,
        })
    }

    /// REST URL of a user's document
    fn document_url(&self, user_id: &str) -> Url {
        let mut url = self.base.clone();
        if let Ok(mut segments) = url.path_segments_mut() {
            segments.pop_if_empty().push("users").push(&format!("{}.json", user_id));
        }
        if let Some(secret) = &self.secret {
            url.query_pairs_mut().append_pair("auth", secret);
        }
        url
    }
}

fn check_status(status: StatusCode) -> Result<(), StoreError> {
    match status {
        s if s.is_success() => Ok(()),
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
            Err(StoreError::Unavailable(format!("permission denied ({})", status)))
        }
        s => Err(StoreError::Unavailable(format!("database returned {}", s))),
    }
}

fn transport(e: reqwest::Error) -> StoreError {
    StoreError::Unavailable(e.to_string())
}

#[async_trait::async_trait]
impl ProfileStore for FirebaseStore {
    async fn load(&self, user_id: &str) -> Result<Profile, StoreError> {
        debug!("Fetching profile for {}", user_id);
        let response = self
            .http_client
            .get(self.document_url(user_id))
            .send()
            .await
            .map_err(transport)?;
        check_status(response.status())?;

        let document: serde_json::Value = response.json().await.map_err(transport)?;
        Ok(Profile::from_document(document))
    }

    async fn save(&self, user_id: &str, profile: &Profile) -> Result<(), StoreError> {
        let document = profile.to_document()?;
        let response = self
            .http_client
            .put(self.document_url(user_id))
            .json(&document)
            .send()
            .await
            .map_err(transport)?;
        check_status(response.status())?;
        debug!("Saved profile for {}", user_id);
        Ok(())
    }

    fn name(&self) -> &'static str {
        "firebase"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_document_url() {
        let store = FirebaseStore::new("https://demo-default-rtdb.firebaseio.com/", None).unwrap();
        assert_eq!(
            store.document_url("abc123").as_str(),
            "https://demo-default-rtdb.firebaseio.com/users/abc123.json"
        );

        let store = FirebaseStore::new("https://demo.firebaseio.com", None).unwrap();
        assert_eq!(
            store.document_url("abc123").as_str(),
            "https://demo.firebaseio.com/users/abc123.json"
        );
    }

    #[test]
    fn test_document_url_with_secret() {
        let store =
            FirebaseStore::new("https://demo.firebaseio.com/", Some("s3cret".to_string())).unwrap();
        assert_eq!(
            store.document_url("u1").as_str(),
            "https://demo.firebaseio.com/users/u1.json?auth=s3cret"
        );
    }

    #[test]
    fn test_user_id_is_escaped() {
        let store = FirebaseStore::new("https://demo.firebaseio.com/", None).unwrap();
        assert_eq!(
            store.document_url("a/b").as_str(),
            "https://demo.firebaseio.com/users/a%2Fb.json"
        );
    }

    #[test]
    fn test_invalid_url_rejected() {
        assert!(FirebaseStore::new("not a url", None).is_err());
        assert!(FirebaseStore::new("mailto:someone@example.com", None).is_err());
    }

    #[test]
    fn test_status_mapping() {
        assert!(check_status(StatusCode::OK).is_ok());
        assert!(matches!(check_status(StatusCode::UNAUTHORIZED), Err(StoreError::Unavailable(_))));
        assert!(matches!(
            check_status(StatusCode::SERVICE_UNAVAILABLE),
            Err(StoreError::Unavailable(_))
        ));
    }
}
