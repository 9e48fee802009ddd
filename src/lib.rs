//! LevelUp Life Library
//!
//! Habit and goal tracking with game mechanics:
//! - XP and levels on a `100 * level^1.5` curve
//! - Daily streaks and coins per completed task
//! - An avatar shop paid for with coins
//! - Pluggable identity (Identity Toolkit REST, SDK-style, local) and
//!   profile stores (Realtime Database, SQLite, memory)
//! - A JWT-authenticated JSON API
//!
//! # Example
//!
//! ```ignore
//! use levelup::{Intent, SessionController, Profile, TaskKind};
//!
//! let controller = SessionController::default();
//! let mut profile = Profile::default();
//! let today = chrono::Local::now().date_naive();
//! controller.dispatch(&mut profile, Intent::AddTask { title: Some("Read".into()), kind: TaskKind::Habit }, today);
//! controller.dispatch(&mut profile, Intent::CompleteTask { index: 0 }, today);
//! assert_eq!(profile.coins, 10);
//! ```

// Core modules
pub mod types;
pub mod catalog;
pub mod progression;
pub mod session;
pub mod stats;

// Backends and services
pub mod store;
pub mod identity;
pub mod config;
pub mod security;
pub mod server;
pub mod cli;

// Re-export commonly used types for convenience
pub use types::{HistoryEntry, Profile, ShopItem, Task, TaskKind};

pub use catalog::Catalog;

pub use session::{
    Change,
    Intent,
    Outcome,
    Rejection,
    Rewards,
    SessionController,
    SessionManager,
};

pub use store::{
    ProfileStore,
    StoreError,
    FirebaseStore,
    MemoryStore,
    SqliteStore,
};

pub use identity::{
    AuthError,
    IdentityProvider,
    LocalIdentity,
    RestIdentity,
    SdkIdentity,
};

pub use config::Config;

pub use server::{
    ServerState,
    router,
    start as start_server,
};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name
pub const NAME: &str = env!("CARGO_PKG_NAME");
