//! Shared types used across modules
//!
//! The profile document and its parts. These are the values the progression
//! engine and session controller mutate and the profile stores persist.

use chrono::NaiveDate;
use serde::{de::DeserializeOwned, Deserialize, Deserializer, Serialize, Serializer};
use std::collections::BTreeSet;
use tracing::warn;

use crate::catalog::Catalog;
use crate::progression;

/// Kind of a tracked task
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum TaskKind {
    Habit,
    Goal,
}

impl TaskKind {
    /// Title used when a task is added without one
    pub fn default_title(&self) -> &'static str {
        match self {
            TaskKind::Habit => "New Habit",
            TaskKind::Goal => "New Goal",
        }
    }
}

impl std::fmt::Display for TaskKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TaskKind::Habit => write!(f, "habit"),
            TaskKind::Goal => write!(f, "goal"),
        }
    }
}

/// A habit or goal on the user's list
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Task {
    pub title: String,
    #[serde(rename = "type", alias = "kind")]
    pub kind: TaskKind,
    #[serde(default)]
    pub completed: bool,
}

impl Task {
    pub fn new(title: impl Into<String>, kind: TaskKind) -> Self {
        Self {
            title: title.into(),
            kind,
            completed: false,
        }
    }
}

/// One completed task, appended once per completion
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct HistoryEntry {
    pub title: String,
    pub date: NaiveDate,
}

/// An avatar for sale in the shop
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ShopItem {
    pub emoji: String,
    pub price: u64,
}

impl ShopItem {
    pub fn new(emoji: impl Into<String>, price: u64) -> Self {
        Self {
            emoji: emoji.into(),
            price,
        }
    }
}

/// Per-user progression document
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct Profile {
    pub xp: u64,
    pub coins: u64,
    pub level: u32,
    pub streak: u32,
    #[serde(
        alias = "lastTaskDate",
        serialize_with = "serialize_task_date",
        deserialize_with = "deserialize_task_date"
    )]
    pub last_task_date: Option<NaiveDate>,
    pub avatar: String,
    pub tasks: Vec<Task>,
    pub history: Vec<HistoryEntry>,
    #[serde(alias = "purchasedAvatars")]
    pub purchased_avatars: BTreeSet<String>,
}

impl Default for Profile {
    fn default() -> Self {
        Self {
            xp: 0,
            coins: 0,
            level: 1,
            streak: 0,
            last_task_date: None,
            avatar: crate::catalog::FALLBACK_AVATAR.to_string(),
            tasks: Vec::new(),
            history: Vec::new(),
            purchased_avatars: BTreeSet::new(),
        }
    }
}

impl Profile {
    /// Decode a stored document, merging it over the defaults.
    ///
    /// `null` yields the default profile. Keys whose values fail to decode are
    /// dropped one at a time so the remaining fields survive.
    pub fn from_document(document: serde_json::Value) -> Self {
        let stored = match document {
            serde_json::Value::Null => return Self::default(),
            serde_json::Value::Object(map) => map,
            other => {
                warn!("Profile document is not an object ({}), using defaults", kind_of(&other));
                return Self::default();
            }
        };

        if let Ok(profile) = serde_json::from_value::<Profile>(serde_json::Value::Object(stored.clone())) {
            return profile;
        }

        let mut merged = serde_json::Map::new();
        for (key, value) in stored {
            // list fields keep their good entries instead of failing as a whole
            let value = match key.as_str() {
                "tasks" => keep_valid_entries::<Task>(&key, value),
                "history" => keep_valid_entries::<HistoryEntry>(&key, value),
                "purchased_avatars" | "purchasedAvatars" => keep_valid_entries::<String>(&key, value),
                _ => value,
            };
            let mut candidate = merged.clone();
            candidate.insert(key.clone(), value);
            if serde_json::from_value::<Profile>(serde_json::Value::Object(candidate.clone())).is_ok() {
                merged = candidate;
            } else {
                warn!("Dropping malformed profile field '{}'", key);
            }
        }

        serde_json::from_value(serde_json::Value::Object(merged)).unwrap_or_default()
    }

    /// Encode as a store document
    pub fn to_document(&self) -> serde_json::Result<serde_json::Value> {
        serde_json::to_value(self)
    }

    /// Restore the profile invariants after loading untrusted data.
    pub fn repair(&mut self, catalog: &Catalog) {
        if self.level == 0 {
            self.level = 1;
        }
        // an over-threshold xp from an older document levels up now
        progression::apply_xp(self, 0);

        if !catalog.is_selectable(&self.avatar, &self.purchased_avatars) {
            warn!("Avatar '{}' is not owned, resetting", self.avatar);
            self.avatar = catalog.first_default().to_string();
        }
    }

    /// Whether the avatar is owned
    pub fn owns(&self, avatar: &str) -> bool {
        self.purchased_avatars.contains(avatar)
    }
}

fn keep_valid_entries<T: DeserializeOwned>(key: &str, value: serde_json::Value) -> serde_json::Value {
    let serde_json::Value::Array(items) = value else {
        return value;
    };

    let total = items.len();
    let kept: Vec<serde_json::Value> = items
        .into_iter()
        .filter(|item| serde_json::from_value::<T>(item.clone()).is_ok())
        .collect();
    if kept.len() < total {
        warn!("Dropping {} malformed entries from profile field '{}'", total - kept.len(), key);
    }
    serde_json::Value::Array(kept)
}

fn kind_of(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "bool",
        serde_json::Value::Number(_) => "number",
        serde_json::Value::String(_) => "string",
        serde_json::Value::Array(_) => "array",
        serde_json::Value::Object(_) => "object",
    }
}

fn serialize_task_date<S>(date: &Option<NaiveDate>, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    match date {
        Some(date) => serializer.serialize_str(&date.format("%Y-%m-%d").to_string()),
        None => serializer.serialize_str(""),
    }
}

fn deserialize_task_date<'de, D>(deserializer: D) -> Result<Option<NaiveDate>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<String> = Option::deserialize(deserializer)?;
    let Some(raw) = raw else {
        return Ok(None);
    };
    let raw = raw.trim();
    if raw.is_empty() {
        return Ok(None);
    }
    match NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        Ok(date) => Ok(Some(date)),
        Err(_) => {
            warn!("Unparseable last_task_date '{}', treating as unset", raw);
            Ok(None)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_default_document_shape() {
        let doc = Profile::default().to_document().unwrap();
        assert_eq!(doc, json!({
            "xp": 0,
            "coins": 0,
            "level": 1,
            "streak": 0,
            "last_task_date": "",
            "avatar": "🐱",
            "tasks": [],
            "history": [],
            "purchased_avatars": []
        }));
    }

    #[test]
    fn test_round_trip_is_deeply_equal() {
        let mut profile = Profile::default();
        profile.xp = 120;
        profile.level = 3;
        profile.coins = 40;
        profile.streak = 2;
        profile.last_task_date = Some(date(2024, 5, 2));
        profile.avatar = "🧙".to_string();
        profile.tasks.push(Task::new("Run", TaskKind::Habit));
        profile.tasks.push(Task { title: "Ship".into(), kind: TaskKind::Goal, completed: true });
        profile.history.push(HistoryEntry { title: "Ship".into(), date: date(2024, 5, 2) });
        profile.purchased_avatars.insert("🧙".to_string());

        let text = serde_json::to_string(&profile).unwrap();
        let decoded: Profile = serde_json::from_str(&text).unwrap();
        assert_eq!(decoded, profile);
    }

    #[test]
    fn test_task_kind_serialized_as_type() {
        let value = serde_json::to_value(Task::new("Read", TaskKind::Goal)).unwrap();
        assert_eq!(value, json!({"title": "Read", "type": "goal", "completed": false}));
    }

    #[test]
    fn test_missing_fields_take_defaults() {
        let profile = Profile::from_document(json!({"xp": 30, "coins": 5}));
        assert_eq!(profile.xp, 30);
        assert_eq!(profile.coins, 5);
        assert_eq!(profile.level, 1);
        assert!(profile.tasks.is_empty());
        assert!(profile.last_task_date.is_none());
    }

    #[test]
    fn test_null_document_is_default() {
        assert_eq!(Profile::from_document(serde_json::Value::Null), Profile::default());
        assert_eq!(Profile::from_document(json!("garbage")), Profile::default());
    }

    #[test]
    fn test_malformed_field_is_dropped() {
        let profile = Profile::from_document(json!({
            "xp": "lots",
            "coins": 70,
            "streak": 4,
            "last_task_date": "2024-01-09"
        }));
        assert_eq!(profile.xp, 0);
        assert_eq!(profile.coins, 70);
        assert_eq!(profile.streak, 4);
        assert_eq!(profile.last_task_date, Some(date(2024, 1, 9)));
    }

    #[test]
    fn test_camel_case_aliases_accepted() {
        let profile = Profile::from_document(json!({
            "lastTaskDate": "2024-03-01",
            "purchasedAvatars": ["🦊", "🦊"],
            "tasks": [{"title": "Walk", "kind": "habit", "completed": false}]
        }));
        assert_eq!(profile.last_task_date, Some(date(2024, 3, 1)));
        assert_eq!(profile.purchased_avatars.len(), 1);
        assert_eq!(profile.tasks[0].kind, TaskKind::Habit);
    }

    #[test]
    fn test_malformed_list_entries_dropped_individually() {
        let profile = Profile::from_document(json!({
            "coins": 12,
            "tasks": [
                {"title": "Walk", "type": "habit", "completed": true},
                {"title": "Broken", "type": "chore"},
                {"title": "Ship", "type": "goal"}
            ],
            "history": [
                {"title": "Walk", "date": "2024-03-01"},
                {"title": "Walk", "date": "not a date"},
                {"title": "Walk", "date": "2024-03-02"}
            ]
        }));

        assert_eq!(profile.coins, 12);
        let titles: Vec<&str> = profile.tasks.iter().map(|t| t.title.as_str()).collect();
        assert_eq!(titles, ["Walk", "Ship"]);
        assert_eq!(profile.history.len(), 2);
        assert_eq!(profile.history[1].date, date(2024, 3, 2));
    }

    #[test]
    fn test_bad_date_is_unset() {
        let profile = Profile::from_document(json!({"last_task_date": "yesterday"}));
        assert!(profile.last_task_date.is_none());
    }

    #[test]
    fn test_repair_restores_invariants() {
        let catalog = Catalog::default();
        let mut profile = Profile::from_document(json!({
            "level": 0,
            "xp": 150,
            "avatar": "🦊"
        }));
        profile.repair(&catalog);

        assert_eq!(profile.level, 2);
        assert_eq!(profile.xp, 50);
        assert_eq!(profile.avatar, "🐱");
    }

    #[test]
    fn test_repair_huge_level_and_xp() {
        let mut profile = Profile::from_document(json!({
            "level": u32::MAX,
            "xp": u64::MAX
        }));
        profile.repair(&Catalog::default());

        assert_eq!(profile.level, u32::MAX);
        assert!(profile.xp < progression::xp_threshold(u32::MAX));
    }
}
