//! Offline wager simulation: plays N seeded rounds against an in-memory
//! ledger, one per simulated day, and prints a JSON summary. Used to sanity
//! check fairness and settlement accounting.
//!
//! Env: SIM_ROUNDS (default 10000), SIM_SEED (default 42), SIM_BET (default 10).

use anyhow::{bail, Result};
use chrono::{Days, NaiveDate};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde_json::json;

use smallstep::config::Config;
use smallstep::store::LedgerStore;
use smallstep::wager::{Prediction, WagerGame};

fn env_u64(key: &str, default: u64) -> u64 {
    std::env::var(key).ok().and_then(|v| v.parse().ok()).unwrap_or(default)
}

fn main() -> Result<()> {
    let rounds = env_u64("SIM_ROUNDS", 10_000);
    let seed = env_u64("SIM_SEED", 42);
    let bet = env_u64("SIM_BET", 10) as i64;

    let cfg = Config::from_env();
    let game = WagerGame::new(&cfg);
    let mut store = LedgerStore::open_in_memory()?;
    store.init()?;
    store.register(1, Some("sim"))?;

    // Bankroll large enough that losses never block a round.
    let bankroll = bet * rounds as i64;
    store.add_coins(1, bankroll)?;

    let mut rng = StdRng::seed_from_u64(seed);
    let mut day = NaiveDate::from_ymd_opt(2026, 1, 1).expect("valid date");
    let mut wins = 0u64;
    let mut expected = bankroll;

    for _ in 0..rounds {
        let prediction = if rng.gen_bool(0.5) { Prediction::High } else { Prediction::Low };
        let out = game.play(&mut store, &mut rng, 1, bet, prediction, day)?;
        expected += out.delta;
        if out.balance != expected {
            bail!("balance drift: got {}, expected {}", out.balance, expected);
        }
        if out.won {
            wins += 1;
        }
        day = day.checked_add_days(Days::new(1)).expect("date overflow");
    }

    let final_balance = store.get_user(1)?.map(|u| u.coins).unwrap_or(0);
    let win_rate = wins as f64 / rounds as f64;
    println!(
        "{}",
        json!({
            "rounds": rounds,
            "seed": seed,
            "bet": bet,
            "wins": wins,
            "win_rate": win_rate,
            "start_balance": bankroll,
            "final_balance": final_balance,
            "net": final_balance - bankroll,
        })
    );
    Ok(())
}
