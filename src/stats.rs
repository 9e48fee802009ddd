//! Read-only views over a profile: progress bar, weekly chart, reminder

use chrono::{Datelike, NaiveDate, Weekday};
use serde::Serialize;

use crate::catalog::Catalog;
use crate::progression;
use crate::types::{HistoryEntry, Profile};

pub const DAILY_REMINDER: &str = "🌟 Time to level up your life!";

/// Sidebar numbers for a profile
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProgressSummary {
    pub avatar: String,
    pub level: u32,
    pub xp: u64,
    pub xp_to_next_level: u64,
    pub progress: f64,
    pub coins: u64,
    pub streak: u32,
    pub open_tasks: usize,
    pub completed_tasks: usize,
}

impl ProgressSummary {
    pub fn of(profile: &Profile) -> Self {
        let completed = profile.tasks.iter().filter(|t| t.completed).count();
        Self {
            avatar: profile.avatar.clone(),
            level: profile.level,
            xp: profile.xp,
            xp_to_next_level: progression::xp_threshold(profile.level.max(1)),
            progress: progression::progress(profile),
            coins: profile.coins,
            streak: profile.streak,
            open_tasks: profile.tasks.len() - completed,
            completed_tasks: completed,
        }
    }
}

/// Completions on one weekday
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WeekdayCount {
    pub day: String,
    pub completions: usize,
}

/// Completions grouped by weekday, Monday first, every day present
pub fn weekly_completions(history: &[HistoryEntry]) -> Vec<WeekdayCount> {
    let mut counts = [0usize; 7];
    for entry in history {
        counts[entry.date.weekday().num_days_from_monday() as usize] += 1;
    }

    let days = [
        Weekday::Mon,
        Weekday::Tue,
        Weekday::Wed,
        Weekday::Thu,
        Weekday::Fri,
        Weekday::Sat,
        Weekday::Sun,
    ];
    days.iter()
        .zip(counts)
        .map(|(day, completions)| WeekdayCount {
            day: weekday_name(*day).to_string(),
            completions,
        })
        .collect()
}

fn weekday_name(day: Weekday) -> &'static str {
    match day {
        Weekday::Mon => "Monday",
        Weekday::Tue => "Tuesday",
        Weekday::Wed => "Wednesday",
        Weekday::Thu => "Thursday",
        Weekday::Fri => "Friday",
        Weekday::Sat => "Saturday",
        Weekday::Sun => "Sunday",
    }
}

/// Daily reminder and whether today already counts toward the streak
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Reminder {
    pub message: String,
    pub completed_today: bool,
    pub streak: u32,
}

pub fn reminder(profile: &Profile, today: NaiveDate) -> Reminder {
    Reminder {
        message: DAILY_REMINDER.to_string(),
        completed_today: profile.last_task_date == Some(today),
        streak: profile.streak,
    }
}

/// Where a shop item stands for this user
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ShopStatus {
    Owned,
    Affordable,
    InsufficientCoins,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ShopEntry {
    pub emoji: String,
    pub price: u64,
    pub status: ShopStatus,
}

/// The shop as one user sees it
pub fn shop_view(catalog: &Catalog, profile: &Profile) -> Vec<ShopEntry> {
    catalog
        .shop
        .iter()
        .map(|item| {
            let status = if profile.owns(&item.emoji) {
                ShopStatus::Owned
            } else if profile.coins >= item.price {
                ShopStatus::Affordable
            } else {
                ShopStatus::InsufficientCoins
            };
            ShopEntry {
                emoji: item.emoji.clone(),
                price: item.price,
                status,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Task, TaskKind};

    fn entry(date: &str) -> HistoryEntry {
        HistoryEntry {
            title: "x".to_string(),
            date: NaiveDate::parse_from_str(date, "%Y-%m-%d").unwrap(),
        }
    }

    #[test]
    fn test_summary() {
        let mut profile = Profile { xp: 141, level: 2, coins: 30, streak: 4, ..Profile::default() };
        profile.tasks.push(Task::new("a", TaskKind::Habit));
        profile.tasks.push(Task { title: "b".into(), kind: TaskKind::Goal, completed: true });

        let summary = ProgressSummary::of(&profile);
        assert_eq!(summary.xp_to_next_level, 282);
        assert_eq!(summary.progress, 0.5);
        assert_eq!(summary.open_tasks, 1);
        assert_eq!(summary.completed_tasks, 1);
    }

    #[test]
    fn test_weekly_completions() {
        // 2024-06-10 is a Monday
        let history = vec![entry("2024-06-10"), entry("2024-06-17"), entry("2024-06-16")];
        let chart = weekly_completions(&history);

        assert_eq!(chart.len(), 7);
        assert_eq!(chart[0], WeekdayCount { day: "Monday".into(), completions: 2 });
        assert_eq!(chart[6], WeekdayCount { day: "Sunday".into(), completions: 1 });
        assert_eq!(chart.iter().map(|c| c.completions).sum::<usize>(), 3);
    }

    #[test]
    fn test_reminder() {
        let today = NaiveDate::from_ymd_opt(2024, 6, 10).unwrap();
        let profile = Profile { streak: 2, last_task_date: Some(today), ..Profile::default() };
        let r = reminder(&profile, today);
        assert!(r.completed_today);
        assert_eq!(r.message, DAILY_REMINDER);
        assert!(!reminder(&Profile::default(), today).completed_today);
    }

    #[test]
    fn test_shop_view() {
        let catalog = Catalog::default();
        let mut profile = Profile { coins: 60, ..Profile::default() };
        let view = shop_view(&catalog, &profile);
        assert_eq!(view[0].status, ShopStatus::Affordable);
        assert_eq!(view[1].status, ShopStatus::InsufficientCoins);

        profile.purchased_avatars.insert("🧙".to_string());
        assert_eq!(shop_view(&catalog, &profile)[0].status, ShopStatus::Owned);
    }
}
