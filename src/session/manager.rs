//! Active sessions
//!
//! Each signed-in user has one in-memory profile. Intents are applied to it
//! through the [`SessionController`] and every applied change is written back
//! to the store. A change that cannot be saved stays in memory, marked dirty,
//! and is written by the next dispatch or on close. Clean sessions are
//! re-read from the store on sign-in and evicted once idle.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::NaiveDate;
use serde::Serialize;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, warn};

use super::{Intent, Outcome, SessionController};
use crate::store::{save_with_retry, ProfileStore, RetryPolicy, StoreError};
use crate::types::Profile;

struct ActiveSession {
    profile: Profile,
    /// Holds changes the store has not accepted yet
    dirty: bool,
    last_used: Instant,
}

impl ActiveSession {
    fn new(profile: Profile) -> Self {
        Self {
            profile,
            dirty: false,
            last_used: Instant::now(),
        }
    }
}

/// Outcome of an intent plus the profile it left behind
#[derive(Debug, Clone, Serialize)]
pub struct DispatchResult {
    pub outcome: Outcome,
    pub profile: Profile,
}

pub struct SessionManager {
    controller: SessionController,
    store: Arc<dyn ProfileStore>,
    retry: RetryPolicy,
    sessions: RwLock<HashMap<String, Arc<Mutex<ActiveSession>>>>,
}

impl SessionManager {
    pub fn new(controller: SessionController, store: Arc<dyn ProfileStore>, retry: RetryPolicy) -> Self {
        Self {
            controller,
            store,
            retry,
            sessions: RwLock::new(HashMap::new()),
        }
    }

    pub fn controller(&self) -> &SessionController {
        &self.controller
    }

    pub fn store_name(&self) -> &'static str {
        self.store.name()
    }

    /// Number of users with an active session
    pub async fn active_count(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_active(&self, user_id: &str) -> bool {
        self.sessions.read().await.contains_key(user_id)
    }

    async fn load(&self, user_id: &str) -> Result<Profile, StoreError> {
        let mut profile = self.store.load(user_id).await?;
        profile.repair(self.controller.catalog());
        Ok(profile)
    }

    async fn entry(&self, user_id: &str) -> Result<Arc<Mutex<ActiveSession>>, StoreError> {
        if let Some(entry) = self.sessions.read().await.get(user_id) {
            return Ok(entry.clone());
        }

        let profile = self.load(user_id).await?;
        debug!("Opened session for {} (level {})", user_id, profile.level);

        let mut sessions = self.sessions.write().await;
        let entry = sessions
            .entry(user_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(ActiveSession::new(profile))));
        Ok(entry.clone())
    }

    /// Load the user's profile into an active session.
    ///
    /// A clean session is re-read from the store so writes made elsewhere
    /// since the last sign-in are picked up. A session with unsaved changes
    /// keeps them.
    pub async fn open(&self, user_id: &str) -> Result<Profile, StoreError> {
        let entry = self.entry(user_id).await?;
        let mut session = entry.lock().await;
        if !session.dirty {
            session.profile = self.load(user_id).await?;
        }
        session.last_used = Instant::now();
        info!("Session opened for {}", user_id);
        Ok(session.profile.clone())
    }

    /// Current profile, opening a session if needed
    pub async fn profile(&self, user_id: &str) -> Result<Profile, StoreError> {
        let entry = self.entry(user_id).await?;
        let mut session = entry.lock().await;
        session.last_used = Instant::now();
        Ok(session.profile.clone())
    }

    /// Apply an intent and persist the result.
    ///
    /// Rejected intents do not write unless an earlier change is still
    /// waiting to be saved.
    pub async fn dispatch(
        &self,
        user_id: &str,
        intent: Intent,
        today: NaiveDate,
    ) -> Result<DispatchResult, StoreError> {
        let entry = self.entry(user_id).await?;
        let mut session = entry.lock().await;
        session.last_used = Instant::now();

        let outcome = self.controller.dispatch(&mut session.profile, intent, today);
        if outcome.is_applied() {
            session.dirty = true;
        }

        if session.dirty {
            match save_with_retry(self.store.as_ref(), user_id, &session.profile, self.retry).await {
                Ok(()) => session.dirty = false,
                Err(e) => {
                    warn!("Keeping unsaved changes for {} in memory: {}", user_id, e);
                    return Err(e);
                }
            }
        }

        Ok(DispatchResult {
            outcome,
            profile: session.profile.clone(),
        })
    }

    /// Save any pending changes and end the session
    pub async fn close(&self, user_id: &str) -> Result<(), StoreError> {
        let Some(entry) = self.sessions.read().await.get(user_id).cloned() else {
            return Ok(());
        };

        {
            let mut session = entry.lock().await;
            if session.dirty {
                save_with_retry(self.store.as_ref(), user_id, &session.profile, self.retry).await?;
                session.dirty = false;
            }
        }

        self.sessions.write().await.remove(user_id);
        info!("Session closed for {}", user_id);
        Ok(())
    }

    /// Save every dirty session; returns how many could not be saved
    pub async fn flush_all(&self) -> usize {
        let entries: Vec<(String, Arc<Mutex<ActiveSession>>)> = self
            .sessions
            .read()
            .await
            .iter()
            .map(|(id, entry)| (id.clone(), entry.clone()))
            .collect();

        let mut failed = 0;
        for (user_id, entry) in entries {
            let mut session = entry.lock().await;
            if !session.dirty {
                continue;
            }
            match save_with_retry(self.store.as_ref(), &user_id, &session.profile, self.retry).await {
                Ok(()) => session.dirty = false,
                Err(e) => {
                    warn!("Could not flush profile for {}: {}", user_id, e);
                    failed += 1;
                }
            }
        }
        failed
    }

    /// Drop sessions unused for `max_idle`; returns how many were dropped.
    ///
    /// Pending changes are saved first. Sessions still dirty or in use are kept.
    pub async fn evict_idle(&self, max_idle: Duration) -> usize {
        self.flush_all().await;

        let mut sessions = self.sessions.write().await;
        let before = sessions.len();
        sessions.retain(|_, entry| match entry.try_lock() {
            Ok(session) => session.dirty || session.last_used.elapsed() < max_idle,
            Err(_) => true,
        });
        let evicted = before - sessions.len();
        if evicted > 0 {
            debug!("Evicted {} idle session(s)", evicted);
        }
        evicted
    }
}
