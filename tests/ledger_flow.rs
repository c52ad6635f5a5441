//! End-to-end ledger tests over a file-backed database: the properties a
//! rewrite must not break. Each test opens its own tempfile store.

use chrono::{Days, NaiveDate};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tempfile::TempDir;

use smallstep::catalog::Catalog;
use smallstep::config::Config;
use smallstep::engine::Engine;
use smallstep::error::LedgerError;
use smallstep::shop;
use smallstep::store::LedgerStore;
use smallstep::wager::{Prediction, WagerGame};

fn day(s: &str) -> NaiveDate {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
}

struct Fixture {
    _dir: TempDir,
    store: LedgerStore,
    engine: Engine,
}

fn fixture() -> Fixture {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("ledger.sqlite");
    let mut store = LedgerStore::open(path.to_str().unwrap()).unwrap();
    store.init().unwrap();
    store.register(1, Some("ana")).unwrap();

    let mut cfg = Config::from_env();
    cfg.base_reward = 5;
    cfg.freeze_cost = 50;
    cfg.freeze_days = 2;
    cfg.double_cost = 100;
    cfg.double_days = 7;
    cfg.recent_window = 5;
    let engine = Engine::new(cfg, Catalog::builtin());
    Fixture { _dir: dir, store, engine }
}

#[test]
fn total_completed_counts_successful_calls_only() {
    let mut f = fixture();
    let mut d = day("2026-08-01");
    for expected in 1..=10u32 {
        let out = f.engine.complete(&mut f.store, 1, d).unwrap();
        assert_eq!(out.total_completed, expected);
        // A same-day repeat never counts.
        assert!(matches!(
            f.engine.complete(&mut f.store, 1, d),
            Err(LedgerError::AlreadyCompletedToday)
        ));
        d = d.checked_add_days(Days::new(1)).unwrap();
    }
    let u = f.store.get_user(1).unwrap().unwrap();
    assert_eq!(u.total_completed, 10);
    assert_eq!(u.streak, 10);
    assert!(u.longest_streak >= u.streak);
}

#[test]
fn rejected_completion_leaves_every_field_unchanged() {
    let mut f = fixture();
    f.engine.complete(&mut f.store, 1, day("2026-08-30")).unwrap();
    let before = f.store.get_user(1).unwrap().unwrap();

    let err = f.engine.complete(&mut f.store, 1, day("2026-08-30")).unwrap_err();
    assert!(matches!(err, LedgerError::AlreadyCompletedToday));

    let after = f.store.get_user(1).unwrap().unwrap();
    assert_eq!(after.streak, before.streak);
    assert_eq!(after.longest_streak, before.longest_streak);
    assert_eq!(after.total_completed, before.total_completed);
    assert_eq!(after.coins, before.coins);
    assert_eq!(after.last_completed_date, before.last_completed_date);
    assert_eq!(after.achievements, before.achievements);
}

#[test]
fn streak_continuation_reset_and_freeze() {
    let mut f = fixture();

    // Yesterday -> continuation.
    f.store.apply_completion(1, 4, 5, day("2026-08-29"), None, None).unwrap();
    let out = f.engine.complete(&mut f.store, 1, day("2026-08-30")).unwrap();
    assert_eq!(out.streak, 5);

    // Three-day gap, no freeze -> reset to 1.
    let out = f.engine.complete(&mut f.store, 1, day("2026-09-03")).unwrap();
    assert_eq!(out.streak, 1);

    // Build a streak, buy a freeze, skip days: streak preserved, not grown.
    f.store.apply_completion(1, 6, 5, day("2026-09-10"), None, None).unwrap();
    f.store.add_coins(1, 50).unwrap();
    shop::buy_streak_freeze(&f.engine.cfg, &mut f.store, 1, day("2026-09-12")).unwrap();
    let out = f.engine.complete(&mut f.store, 1, day("2026-09-13")).unwrap();
    assert_eq!(out.streak, 6, "freeze preserves but does not advance");
}

#[test]
fn double_boost_pays_ten_inside_window_five_outside() {
    let mut f = fixture();
    f.store.add_coins(1, 100).unwrap();
    let p = shop::buy_double_coins(&f.engine.cfg, &mut f.store, 1, day("2026-08-30")).unwrap();
    assert_eq!(p.active_until, day("2026-09-06"));

    let out = f.engine.complete(&mut f.store, 1, day("2026-09-06")).unwrap();
    assert_eq!(out.coins_earned, 10, "inclusive expiry still doubles");
    let out = f.engine.complete(&mut f.store, 1, day("2026-09-07")).unwrap();
    assert_eq!(out.coins_earned, 5);
}

#[test]
fn purchase_rejection_preserves_balance() {
    let mut f = fixture();
    f.store.add_coins(1, 49).unwrap();
    let err = shop::buy_streak_freeze(&f.engine.cfg, &mut f.store, 1, day("2026-08-30")).unwrap_err();
    assert!(matches!(err, LedgerError::InsufficientFunds { needed: 50, balance: 49 }));
    assert_eq!(f.store.get_user(1).unwrap().unwrap().coins, 49);
}

#[test]
fn achievements_grant_once_with_their_rewards() {
    let mut f = fixture();
    let report = f.engine.complete_with_rewards(&mut f.store, 1, day("2026-08-30")).unwrap();

    // First completion earns "first_step" exactly once.
    let ids: Vec<&str> = report.new_achievements.iter().map(|a| a.id.as_str()).collect();
    assert_eq!(ids, vec!["first_step"]);
    let granted: i64 = report.new_achievements.iter().map(|a| a.reward).sum();
    let u = f.store.get_user(1).unwrap().unwrap();
    assert_eq!(u.coins, report.outcome.coins_earned + granted);

    // The next completion re-evaluates the same conditions and grants
    // nothing again.
    let report = f.engine.complete_with_rewards(&mut f.store, 1, day("2026-08-31")).unwrap();
    assert!(report.new_achievements.is_empty());
    let u2 = f.store.get_user(1).unwrap().unwrap();
    assert_eq!(u2.achievements.iter().filter(|a| a.as_str() == "first_step").count(), 1);
}

#[test]
fn streak_milestone_scenario() {
    let mut f = fixture();
    // streak=5, total=20, completing today -> streak 6, which is a
    // configured streak milestone.
    for i in 0..19 {
        let d = day("2026-07-01").checked_add_days(Days::new(i * 3)).unwrap();
        f.store.apply_completion(1, 1, 5, d, None, None).unwrap();
    }
    f.store.apply_completion(1, 5, 5, day("2026-08-29"), None, None).unwrap();

    let report = f.engine.complete_with_rewards(&mut f.store, 1, day("2026-08-30")).unwrap();
    assert_eq!(report.outcome.streak, 6);
    assert_eq!(report.outcome.total_completed, 21);
    assert!(!report.milestones.is_empty(), "streak 6 milestone must fire");
    assert!(!report.level.is_empty());
}

#[test]
fn wager_fairness_and_settlement_over_ten_thousand_days() {
    let mut f = fixture();
    let game = WagerGame::new(&f.engine.cfg);
    let rounds = 10_000u64;
    let bet = 10i64;
    let bankroll = bet * rounds as i64;
    f.store.add_coins(1, bankroll).unwrap();

    let mut rng = StdRng::seed_from_u64(42);
    let mut d = day("2026-01-01");
    let mut wins = 0u64;
    let mut expected = bankroll;

    for _ in 0..rounds {
        let prediction = if rng.gen_bool(0.5) { Prediction::High } else { Prediction::Low };
        let out = game.play(&mut f.store, &mut rng, 1, bet, prediction, d).unwrap();

        // Settlement is exact: +bet on a win, -bet on a loss.
        expected += if out.won { bet } else { -bet };
        assert_eq!(out.balance, expected);

        // No second round on the same simulated day.
        assert!(matches!(
            game.play(&mut f.store, &mut rng, 1, bet, prediction, d),
            Err(LedgerError::AlreadyPlayedToday)
        ));

        if out.won {
            wins += 1;
        }
        d = d.checked_add_days(Days::new(1)).unwrap();
    }

    let win_rate = wins as f64 / rounds as f64;
    assert!(
        (win_rate - 0.5).abs() <= 0.02,
        "win rate {} outside 50% +/- 2 pts",
        win_rate
    );
    assert_eq!(f.store.get_user(1).unwrap().unwrap().coins, expected);
}

#[test]
fn assignment_feeds_category_achievements() {
    let mut f = fixture();
    let mut rng = StdRng::seed_from_u64(3);
    let mut d = day("2026-08-01");
    for _ in 0..10 {
        f.engine.assign_challenge(&mut f.store, &mut rng, 1, "sport").unwrap();
        f.engine.complete_with_rewards(&mut f.store, 1, d).unwrap();
        d = d.checked_add_days(Days::new(1)).unwrap();
    }
    let u = f.store.get_user(1).unwrap().unwrap();
    assert!(u.achievements.iter().any(|a| a == "sport_fan"), "10 sport completions unlock sport_fan");
    assert_eq!(f.store.category_counts(1).unwrap().get("sport"), Some(&10));
}
