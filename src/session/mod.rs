//! Session controller
//!
//! Applies user intents (complete a task, buy or select an avatar, add a task)
//! to an explicit [`Profile`] value. Every operation either applies fully or is
//! rejected with the profile left untouched; rejections are ordinary outcomes,
//! not errors.

pub mod manager;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::catalog::Catalog;
use crate::progression::{self, StreakChange};
use crate::types::{HistoryEntry, Profile, ShopItem, Task, TaskKind};

pub use manager::{DispatchResult, SessionManager};

fn default_task_xp() -> u64 {
    50
}

fn default_task_coins() -> u64 {
    10
}

/// Rewards granted per completed task
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rewards {
    #[serde(default = "default_task_xp")]
    pub task_xp: u64,
    #[serde(default = "default_task_coins")]
    pub task_coins: u64,
}

impl Default for Rewards {
    fn default() -> Self {
        Self {
            task_xp: default_task_xp(),
            task_coins: default_task_coins(),
        }
    }
}

/// A user intent emitted by the client
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "intent", rename_all = "snake_case")]
pub enum Intent {
    CompleteTask {
        index: usize,
    },
    PurchaseAvatar {
        emoji: String,
    },
    AddTask {
        #[serde(default)]
        title: Option<String>,
        kind: TaskKind,
    },
    SelectAvatar {
        avatar: String,
    },
}

/// What an applied intent changed
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "change", rename_all = "snake_case")]
pub enum Change {
    TaskCompleted {
        index: usize,
        xp_awarded: u64,
        coins_awarded: u64,
        levels_gained: u32,
        streak: StreakChange,
    },
    TaskAdded {
        index: usize,
    },
    AvatarPurchased {
        emoji: String,
        price: u64,
    },
    AvatarSelected {
        avatar: String,
    },
}

/// Why an intent left the profile unchanged
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum Rejection {
    NoSuchTask { index: usize },
    AlreadyCompleted { index: usize },
    UnknownItem { emoji: String },
    AlreadyOwned { emoji: String },
    InsufficientCoins { coins: u64, price: u64 },
    AvatarNotOwned { avatar: String },
}

impl std::fmt::Display for Rejection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Rejection::NoSuchTask { index } => write!(f, "no task at index {}", index),
            Rejection::AlreadyCompleted { index } => write!(f, "task {} is already completed", index),
            Rejection::UnknownItem { emoji } => write!(f, "{} is not for sale", emoji),
            Rejection::AlreadyOwned { emoji } => write!(f, "{} is already owned", emoji),
            Rejection::InsufficientCoins { coins, price } => {
                write!(f, "not enough coins ({} of {})", coins, price)
            }
            Rejection::AvatarNotOwned { avatar } => write!(f, "{} is not owned", avatar),
        }
    }
}

/// Result of applying an intent
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Outcome {
    Applied(Change),
    Rejected(Rejection),
}

impl Outcome {
    pub fn is_applied(&self) -> bool {
        matches!(self, Outcome::Applied(_))
    }
}

/// Applies intents to profiles using a fixed catalog and reward table
#[derive(Debug, Clone, Default)]
pub struct SessionController {
    catalog: Catalog,
    rewards: Rewards,
}

impl SessionController {
    pub fn new(catalog: Catalog, rewards: Rewards) -> Self {
        Self { catalog, rewards }
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn rewards(&self) -> Rewards {
        self.rewards
    }

    /// Route an intent to its operation
    pub fn dispatch(&self, profile: &mut Profile, intent: Intent, today: NaiveDate) -> Outcome {
        match intent {
            Intent::CompleteTask { index } => self.complete_task(profile, index, today),
            Intent::PurchaseAvatar { emoji } => match self.catalog.item(&emoji) {
                Some(item) => self.purchase_avatar(profile, item),
                None => Outcome::Rejected(Rejection::UnknownItem { emoji }),
            },
            Intent::AddTask { title, kind } => self.add_task(profile, title.as_deref(), kind),
            Intent::SelectAvatar { avatar } => self.select_avatar(profile, &avatar),
        }
    }

    /// Complete the task at `index`, granting XP, coins and streak credit.
    ///
    /// Completing an already-completed task is rejected so rewards are never
    /// granted twice.
    pub fn complete_task(&self, profile: &mut Profile, index: usize, today: NaiveDate) -> Outcome {
        let title = match profile.tasks.get_mut(index) {
            None => return Outcome::Rejected(Rejection::NoSuchTask { index }),
            Some(task) if task.completed => {
                return Outcome::Rejected(Rejection::AlreadyCompleted { index })
            }
            Some(task) => {
                task.completed = true;
                task.title.clone()
            }
        };

        let levels_gained = progression::apply_xp(profile, self.rewards.task_xp);
        profile.coins = profile.coins.saturating_add(self.rewards.task_coins);
        let streak = progression::update_streak(profile, today);
        profile.history.push(HistoryEntry { title, date: today });

        Outcome::Applied(Change::TaskCompleted {
            index,
            xp_awarded: self.rewards.task_xp,
            coins_awarded: self.rewards.task_coins,
            levels_gained,
            streak,
        })
    }

    /// Buy an avatar if it is not owned and affordable
    pub fn purchase_avatar(&self, profile: &mut Profile, item: &ShopItem) -> Outcome {
        if profile.owns(&item.emoji) {
            return Outcome::Rejected(Rejection::AlreadyOwned { emoji: item.emoji.clone() });
        }
        if profile.coins < item.price {
            return Outcome::Rejected(Rejection::InsufficientCoins {
                coins: profile.coins,
                price: item.price,
            });
        }

        profile.coins -= item.price;
        profile.purchased_avatars.insert(item.emoji.clone());

        Outcome::Applied(Change::AvatarPurchased {
            emoji: item.emoji.clone(),
            price: item.price,
        })
    }

    /// Append an incomplete task; a blank title uses the kind's default
    pub fn add_task(&self, profile: &mut Profile, title: Option<&str>, kind: TaskKind) -> Outcome {
        let title = match title.map(str::trim) {
            Some(t) if !t.is_empty() => t.to_string(),
            _ => kind.default_title().to_string(),
        };
        profile.tasks.push(Task::new(title, kind));
        Outcome::Applied(Change::TaskAdded { index: profile.tasks.len() - 1 })
    }

    /// Switch to a default or owned avatar
    pub fn select_avatar(&self, profile: &mut Profile, avatar: &str) -> Outcome {
        if !self.catalog.is_selectable(avatar, &profile.purchased_avatars) {
            return Outcome::Rejected(Rejection::AvatarNotOwned { avatar: avatar.to_string() });
        }
        profile.avatar = avatar.to_string();
        Outcome::Applied(Change::AvatarSelected { avatar: avatar.to_string() })
    }
}
