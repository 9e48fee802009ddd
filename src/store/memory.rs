//! In-memory profile store
//!
//! Keeps serialized documents so loads go through the same decode-and-merge
//! path as the persistent backends. Availability can be switched off to
//! exercise failure handling.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use tokio::sync::RwLock;

use super::{ProfileStore, StoreError};
use crate::types::Profile;

pub struct MemoryStore {
    documents: RwLock<HashMap<String, serde_json::Value>>,
    available: AtomicBool,
    saves: AtomicUsize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            documents: RwLock::new(HashMap::new()),
            available: AtomicBool::new(true),
            saves: AtomicUsize::new(0),
        }
    }

    /// Simulate an outage: while unavailable every call fails
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    /// Number of successful saves
    pub fn save_count(&self) -> usize {
        self.saves.load(Ordering::SeqCst)
    }

    /// Put a raw document in place, bypassing encoding
    pub async fn insert_document(&self, user_id: &str, document: serde_json::Value) {
        self.documents.write().await.insert(user_id.to_string(), document);
    }

    /// Raw stored document
    pub async fn document(&self, user_id: &str) -> Option<serde_json::Value> {
        self.documents.read().await.get(user_id).cloned()
    }

    fn check(&self) -> Result<(), StoreError> {
        if self.available.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(StoreError::Unavailable("memory store switched off".to_string()))
        }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl ProfileStore for MemoryStore {
    async fn load(&self, user_id: &str) -> Result<Profile, StoreError> {
        self.check()?;
        let document = self.documents.read().await.get(user_id).cloned();
        Ok(document.map(Profile::from_document).unwrap_or_default())
    }

    async fn save(&self, user_id: &str, profile: &Profile) -> Result<(), StoreError> {
        self.check()?;
        let document = profile.to_document()?;
        self.documents.write().await.insert(user_id.to_string(), document);
        self.saves.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}
