//! Progression engine
//!
//! Pure functions over a [`Profile`]: the XP curve, level-up cascades and
//! daily streak transitions. Nothing here touches storage or the clock.

use chrono::NaiveDate;
use serde::Serialize;

use crate::types::Profile;

/// XP needed to leave `level`: `floor(100 * level^1.5)`.
pub fn xp_threshold(level: u32) -> u64 {
    (100.0 * f64::from(level).powf(1.5)) as u64
}

/// Add XP and level up as many times as it covers.
///
/// Returns the number of levels gained. Afterwards `xp < xp_threshold(level)`;
/// at `u32::MAX` the level stops rising and excess XP is discarded.
pub fn apply_xp(profile: &mut Profile, amount: u64) -> u32 {
    if profile.level == 0 {
        profile.level = 1;
    }
    profile.xp = profile.xp.saturating_add(amount);

    let mut gained = 0;
    loop {
        let threshold = xp_threshold(profile.level);
        if profile.xp < threshold {
            break;
        }
        if profile.level == u32::MAX {
            // top of the curve: keep the xp invariant, drop the excess
            profile.xp = threshold - 1;
            break;
        }
        profile.xp -= threshold;
        profile.level += 1;
        gained += 1;
    }
    gained
}

/// How a completion on a given day moved the streak
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StreakChange {
    /// First completion ever
    Started,
    /// Completed the day after the last completion
    Extended,
    /// One or more days were skipped
    Reset,
    /// Already completed something today
    SameDay,
    /// `today` is before the last completion; nothing changes
    Backdated,
}

/// Move the streak for a completion on `today`.
pub fn update_streak(profile: &mut Profile, today: NaiveDate) -> StreakChange {
    let change = match profile.last_task_date {
        None => {
            profile.streak = 1;
            StreakChange::Started
        }
        Some(last) if today == last => StreakChange::SameDay,
        Some(last) if today < last => return StreakChange::Backdated,
        Some(last) if last.succ_opt() == Some(today) => {
            profile.streak = profile.streak.saturating_add(1);
            StreakChange::Extended
        }
        Some(_) => {
            profile.streak = 1;
            StreakChange::Reset
        }
    };
    profile.last_task_date = Some(today);
    change
}

/// Fraction of the way to the next level, in `[0, 1)`.
pub fn progress(profile: &Profile) -> f64 {
    let threshold = xp_threshold(profile.level.max(1));
    (profile.xp as f64 / threshold as f64).min(1.0)
}

/// One row of the level table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct LevelRow {
    pub level: u32,
    /// XP needed to go from this level to the next
    pub threshold: u64,
    /// Total XP earned by the time this level is reached
    pub cumulative: u64,
}

/// Thresholds for levels `1..=up_to`
pub fn level_table(up_to: u32) -> Vec<LevelRow> {
    let mut cumulative = 0u64;
    (1..=up_to)
        .map(|level| {
            let row = LevelRow {
                level,
                threshold: xp_threshold(level),
                cumulative,
            };
            cumulative = cumulative.saturating_add(row.threshold);
            row
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, d).unwrap()
    }

    fn at(xp: u64, level: u32) -> Profile {
        Profile { xp, level, ..Profile::default() }
    }

    #[test]
    fn test_level_stops_at_u32_max() {
        let mut profile = at(u64::MAX, u32::MAX);
        assert_eq!(apply_xp(&mut profile, 1), 0);
        assert_eq!(profile.level, u32::MAX);
        assert!(profile.xp < xp_threshold(u32::MAX));

        let mut profile = at(xp_threshold(u32::MAX - 1), u32::MAX - 1);
        assert_eq!(apply_xp(&mut profile, u64::MAX), 1);
        assert_eq!(profile.level, u32::MAX);
        assert_eq!(profile.xp, xp_threshold(u32::MAX) - 1);
    }

    #[test]
    fn test_threshold_values() {
        assert_eq!(xp_threshold(1), 100);
        assert_eq!(xp_threshold(2), 282);
        assert_eq!(xp_threshold(3), 519);
        assert_eq!(xp_threshold(4), 800);
        assert_eq!(xp_threshold(10), 3162);
    }

    #[test]
    fn test_threshold_is_superlinear() {
        for level in 1..50 {
            let step = xp_threshold(level + 1) - xp_threshold(level);
            let next_step = xp_threshold(level + 2) - xp_threshold(level + 1);
            assert!(next_step >= step);
        }
    }

    #[test]
    fn test_apply_xp_below_threshold() {
        let mut profile = at(0, 1);
        assert_eq!(apply_xp(&mut profile, 50), 0);
        assert_eq!(profile.xp, 50);
        assert_eq!(profile.level, 1);
    }

    #[test]
    fn test_apply_xp_exact_threshold_levels_up() {
        let mut profile = at(50, 1);
        assert_eq!(apply_xp(&mut profile, 50), 1);
        assert_eq!(profile.xp, 0);
        assert_eq!(profile.level, 2);
    }

    #[test]
    fn test_apply_xp_multi_level() {
        let mut profile = at(90, 1);
        let gained = apply_xp(&mut profile, 500);
        // 590 - 100 = 490, 490 - 282 = 208 < 519
        assert_eq!(gained, 2);
        assert_eq!(profile.level, 3);
        assert_eq!(profile.xp, 208);
        assert!(profile.xp < xp_threshold(profile.level));
    }

    #[test]
    fn test_apply_xp_invariant_holds() {
        for amount in [0u64, 1, 99, 100, 281, 382, 1_000, 12_345, 1_000_000] {
            let mut profile = at(0, 1);
            apply_xp(&mut profile, amount);
            assert!(profile.xp < xp_threshold(profile.level), "amount {}", amount);
        }
    }

    #[test]
    fn test_apply_xp_level_zero_is_treated_as_one() {
        let mut profile = at(10, 0);
        apply_xp(&mut profile, 0);
        assert_eq!(profile.level, 1);
        assert_eq!(profile.xp, 10);
    }

    #[test]
    fn test_streak_sequence() {
        let mut profile = Profile::default();
        assert_eq!(update_streak(&mut profile, day(1)), StreakChange::Started);
        assert_eq!(profile.streak, 1);
        assert_eq!(update_streak(&mut profile, day(2)), StreakChange::Extended);
        assert_eq!(profile.streak, 2);
        assert_eq!(update_streak(&mut profile, day(5)), StreakChange::Reset);
        assert_eq!(profile.streak, 1);
        assert_eq!(profile.last_task_date, Some(day(5)));
    }

    #[test]
    fn test_streak_same_day_is_unchanged() {
        let mut profile = Profile { streak: 3, last_task_date: Some(day(4)), ..Profile::default() };
        assert_eq!(update_streak(&mut profile, day(4)), StreakChange::SameDay);
        assert_eq!(profile.streak, 3);
        assert_eq!(profile.last_task_date, Some(day(4)));
    }

    #[test]
    fn test_streak_backdated_is_ignored() {
        let mut profile = Profile { streak: 3, last_task_date: Some(day(10)), ..Profile::default() };
        assert_eq!(update_streak(&mut profile, day(8)), StreakChange::Backdated);
        assert_eq!(profile.streak, 3);
        assert_eq!(profile.last_task_date, Some(day(10)));
    }

    #[test]
    fn test_streak_across_month_boundary() {
        let mut profile = Profile {
            streak: 5,
            last_task_date: NaiveDate::from_ymd_opt(2024, 2, 29),
            ..Profile::default()
        };
        assert_eq!(update_streak(&mut profile, day(1)), StreakChange::Extended);
        assert_eq!(profile.streak, 6);
    }

    #[test]
    fn test_progress_fraction() {
        assert_eq!(progress(&at(0, 1)), 0.0);
        assert_eq!(progress(&at(50, 1)), 0.5);
        assert!(progress(&at(281, 2)) < 1.0);
    }

    #[test]
    fn test_level_table() {
        let table = level_table(3);
        assert_eq!(table.len(), 3);
        assert_eq!(table[0], LevelRow { level: 1, threshold: 100, cumulative: 0 });
        assert_eq!(table[1], LevelRow { level: 2, threshold: 282, cumulative: 100 });
        assert_eq!(table[2].cumulative, 382);
    }
}
