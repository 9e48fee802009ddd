//! Avatar catalog: free default avatars and the coin shop

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::types::ShopItem;

/// Avatar of a new profile before the catalog is applied
pub const FALLBACK_AVATAR: &str = "🐱";

fn default_avatars() -> Vec<String> {
    ["🐱", "🐸", "🦄", "🐢", "🐳"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

fn default_shop() -> Vec<ShopItem> {
    vec![ShopItem::new("🧙", 50), ShopItem::new("🦊", 100)]
}

/// Static catalog of selectable and purchasable avatars
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Catalog {
    /// Avatars every user may select
    #[serde(default = "default_avatars")]
    pub default_avatars: Vec<String>,
    /// Avatars for sale
    #[serde(default = "default_shop")]
    pub shop: Vec<ShopItem>,
}

impl Default for Catalog {
    fn default() -> Self {
        Self {
            default_avatars: default_avatars(),
            shop: default_shop(),
        }
    }
}

impl Catalog {
    /// Reject catalogs that would leave a profile with no valid avatar
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.default_avatars.is_empty() {
            anyhow::bail!("catalog.default_avatars must list at least one avatar");
        }
        if let Some(item) = self.shop.iter().find(|item| self.is_default(&item.emoji)) {
            anyhow::bail!("shop item {} is also a default avatar", item.emoji);
        }
        Ok(())
    }

    /// Look up a shop item by emoji
    pub fn item(&self, emoji: &str) -> Option<&ShopItem> {
        self.shop.iter().find(|item| item.emoji == emoji)
    }

    pub fn is_default(&self, avatar: &str) -> bool {
        self.default_avatars.iter().any(|a| a == avatar)
    }

    /// A default avatar or one the user owns
    pub fn is_selectable(&self, avatar: &str, owned: &BTreeSet<String>) -> bool {
        self.is_default(avatar) || owned.contains(avatar)
    }

    pub fn first_default(&self) -> &str {
        self.default_avatars
            .first()
            .map(String::as_str)
            .unwrap_or(FALLBACK_AVATAR)
    }

    /// Defaults followed by owned avatars, without repeats
    pub fn selectable(&self, owned: &BTreeSet<String>) -> Vec<String> {
        let mut avatars = self.default_avatars.clone();
        for avatar in owned {
            if !avatars.contains(avatar) {
                avatars.push(avatar.clone());
            }
        }
        avatars
    }
}
