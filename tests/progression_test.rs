//! Game rules exercised through the public API

use chrono::{Duration, NaiveDate};

use levelup::progression::{apply_xp, update_streak, xp_threshold};
use levelup::{
    Change, Intent, Outcome, Profile, ProfileStore, Rejection, SessionController, SqliteStore, TaskKind,
};

fn day(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

#[test]
fn test_xp_below_threshold_after_any_award() {
    for start_level in 1..=6u32 {
        for amount in (0..5_000u64).step_by(37) {
            let mut profile = Profile { level: start_level, ..Profile::default() };
            profile.xp = xp_threshold(start_level) - 1;
            apply_xp(&mut profile, amount);
            assert!(
                profile.xp < xp_threshold(profile.level),
                "level {} xp {} after +{}",
                profile.level,
                profile.xp,
                amount
            );
            assert!(profile.level >= start_level);
        }
    }
}

#[test]
fn test_large_award_crosses_several_levels() {
    let mut profile = Profile { xp: 90, level: 1, ..Profile::default() };
    let gained = apply_xp(&mut profile, 500);
    assert_eq!(gained, 2);
    assert_eq!(profile.level, 3);
    assert_eq!(profile.xp, 590 - 100 - 282);
}

#[test]
fn test_streak_over_a_month() {
    let mut profile = Profile::default();
    let start = day(2024, 1, 20);
    for offset in 0..30 {
        update_streak(&mut profile, start + Duration::days(offset));
        // twice on the same day changes nothing
        update_streak(&mut profile, start + Duration::days(offset));
    }
    assert_eq!(profile.streak, 30);
    assert_eq!(profile.last_task_date, Some(day(2024, 2, 18)));

    update_streak(&mut profile, day(2024, 2, 21));
    assert_eq!(profile.streak, 1);
}

#[test]
fn test_daily_routine() {
    let controller = SessionController::default();
    let mut profile = Profile::default();

    for (offset, title) in ["Stretch", "Read", "Walk"].iter().enumerate() {
        let today = day(2024, 6, 10) + Duration::days(offset as i64);
        let add = Intent::AddTask { title: Some(title.to_string()), kind: TaskKind::Habit };
        controller.dispatch(&mut profile, add, today);
        let outcome = controller.dispatch(&mut profile, Intent::CompleteTask { index: offset }, today);
        assert!(matches!(outcome, Outcome::Applied(Change::TaskCompleted { .. })));
    }

    assert_eq!(profile.streak, 3);
    assert_eq!(profile.coins, 30);
    assert_eq!(profile.level, 2);
    assert_eq!(profile.xp, 50);
    assert_eq!(profile.history.len(), 3);
}

#[test]
fn test_shop_rules() {
    let controller = SessionController::default();
    let today = day(2024, 6, 10);
    let buy = || Intent::PurchaseAvatar { emoji: "🧙".to_string() };

    let mut poor = Profile { coins: 40, ..Profile::default() };
    let outcome = controller.dispatch(&mut poor, buy(), today);
    assert_eq!(outcome, Outcome::Rejected(Rejection::InsufficientCoins { coins: 40, price: 50 }));
    assert_eq!(poor.coins, 40);
    assert!(poor.purchased_avatars.is_empty());

    let mut rich = Profile { coins: 100, ..Profile::default() };
    assert!(controller.dispatch(&mut rich, buy(), today).is_applied());
    let outcome = controller.dispatch(&mut rich, buy(), today);
    assert!(!outcome.is_applied());
    assert_eq!(rich.coins, 50);
    assert_eq!(rich.purchased_avatars.len(), 1);
}

#[tokio::test]
async fn test_profile_survives_sqlite_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let store = SqliteStore::new(dir.path().join("profiles.db")).await.unwrap();

    let controller = SessionController::default();
    let today = day(2024, 6, 10);
    let mut profile = Profile { coins: 95, ..Profile::default() };
    controller.dispatch(&mut profile, Intent::AddTask { title: None, kind: TaskKind::Goal }, today);
    controller.dispatch(&mut profile, Intent::CompleteTask { index: 0 }, today);
    controller.dispatch(&mut profile, Intent::PurchaseAvatar { emoji: "🦊".to_string() }, today);
    controller.dispatch(&mut profile, Intent::SelectAvatar { avatar: "🦊".to_string() }, today);

    store.save("u1", &profile).await.unwrap();
    let loaded = store.load("u1").await.unwrap();
    assert_eq!(loaded, profile);
    assert_eq!(loaded.avatar, "🦊");
    assert_eq!(loaded.tasks[0].title, "New Goal");
}
