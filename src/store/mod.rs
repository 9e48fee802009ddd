//! Profile persistence
//!
//! One document per user, read whole and overwritten whole. Backends:
//! - Firebase Realtime Database over REST
//! - Local SQLite file
//! - In-memory map (development and tests)

pub mod firebase;
pub mod memory;
pub mod sqlite;

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};

use crate::types::Profile;

pub use firebase::FirebaseStore;
pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

/// Errors talking to a profile store
#[derive(Debug, Error)]
pub enum StoreError {
    /// Transport, auth or backend failure; the caller may retry
    #[error("profile store unavailable: {0}")]
    Unavailable(String),

    #[error("failed to encode profile: {0}")]
    Encoding(#[from] serde_json::Error),
}

/// Load/save contract for per-user profile documents.
///
/// `load` returns the default profile when the user has no document yet.
/// `save` overwrites unconditionally; the last writer wins.
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait ProfileStore: Send + Sync {
    async fn load(&self, user_id: &str) -> Result<Profile, StoreError>;

    async fn save(&self, user_id: &str, profile: &Profile) -> Result<(), StoreError>;

    /// Backend name for logs and status output
    fn name(&self) -> &'static str;
}

/// Which backend holds profiles
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    Firebase,
    Sqlite,
    Memory,
}

/// Save retry policy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first
    pub attempts: u32,
    /// Delay before the first retry; doubles after each failure
    pub backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: 3,
            backoff: Duration::from_millis(200),
        }
    }
}

/// Save with retries, returning the last error if every attempt fails
pub async fn save_with_retry(
    store: &dyn ProfileStore,
    user_id: &str,
    profile: &Profile,
    policy: RetryPolicy,
) -> Result<(), StoreError> {
    let attempts = policy.attempts.max(1);
    let mut delay = policy.backoff;
    let mut attempt = 1;

    loop {
        match store.save(user_id, profile).await {
            Ok(()) => return Ok(()),
            Err(StoreError::Encoding(e)) => return Err(StoreError::Encoding(e)),
            Err(e) if attempt >= attempts => return Err(e),
            Err(e) => {
                warn!(
                    "Saving profile for {} to {} failed (attempt {}/{}): {}",
                    user_id, store.name(), attempt, attempts, e
                );
                tokio::time::sleep(delay).await;
                delay = delay.saturating_mul(2);
                attempt += 1;
            }
        }
    }
}

/// Build the configured store
pub async fn from_config(config: &crate::config::Config) -> Result<Arc<dyn ProfileStore>> {
    let store: Arc<dyn ProfileStore> = match config.store.backend {
        StoreBackend::Firebase => {
            let secret = crate::security::get_database_secret().ok();
            if secret.is_none() {
                warn!("No database secret configured; relying on open database rules");
            }
            Arc::new(FirebaseStore::new(&config.firebase.database_url, secret)?)
        }
        StoreBackend::Sqlite => {
            let path = config.store.sqlite_path()?;
            Arc::new(
                SqliteStore::new(&path)
                    .await
                    .with_context(|| format!("Failed to open profile database {}", path.display()))?,
            )
        }
        StoreBackend::Memory => Arc::new(MemoryStore::new()),
    };
    info!("Using {} profile store", store.name());
    Ok(store)
}
