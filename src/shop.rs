//! Consumable store: streak freezes and the double-coin boost.
//!
//! The stacking rule for both: the new expiry extends from whichever is
//! later, today or the current unexpired expiry, so a purchase can never
//! shorten an active boost. Debit and expiry update land in one conditional
//! UPDATE inside the store.

use chrono::{Days, NaiveDate};

use crate::config::Config;
use crate::error::LedgerError;
use crate::ledger::PurchaseOutcome;
use crate::logging::{log, obj, v_int, v_str, Domain, Level};
use crate::store::{Boost, LedgerStore};

fn stacked_until(current: Option<NaiveDate>, today: NaiveDate, days: u32) -> NaiveDate {
    let base = match current {
        Some(until) if until > today => until,
        _ => today,
    };
    base.checked_add_days(Days::new(days as u64)).unwrap_or(base)
}

/// Generic purchase with explicit price and duration, for callers that carry
/// their own price list. The config-driven wrappers below are the usual path.
pub fn buy_boost(
    store: &mut LedgerStore,
    user_id: i64,
    cost: i64,
    boost: Boost,
    days: u32,
    today: NaiveDate,
) -> Result<PurchaseOutcome, LedgerError> {
    let user = store.get_user(user_id)?.ok_or(LedgerError::UserNotFound(user_id))?;
    if user.coins < cost {
        return Err(LedgerError::InsufficientFunds { needed: cost, balance: user.coins });
    }
    let current = match boost {
        Boost::StreakFreeze => user.streak_freeze_until,
        Boost::DoubleCoins => user.double_coins_until,
    };
    let active_until = stacked_until(current, today, days);
    let coins_left = store.apply_purchase(user_id, cost, boost, active_until)?;
    log(
        Level::Info,
        Domain::Shop,
        "boost.purchased",
        obj(&[
            ("user_id", v_int(user_id)),
            ("boost", v_str(match boost {
                Boost::StreakFreeze => "streak_freeze",
                Boost::DoubleCoins => "double_coins",
            })),
            ("cost", v_int(cost)),
            ("coins_left", v_int(coins_left)),
        ]),
    );
    Ok(PurchaseOutcome { coins_left, active_until })
}

/// Buy `cfg.freeze_days` of streak protection for `cfg.freeze_cost`.
pub fn buy_streak_freeze(
    cfg: &Config,
    store: &mut LedgerStore,
    user_id: i64,
    today: NaiveDate,
) -> Result<PurchaseOutcome, LedgerError> {
    buy_boost(store, user_id, cfg.freeze_cost, Boost::StreakFreeze, cfg.freeze_days, today)
}

/// Buy the fixed double-coin window (`cfg.double_days`, 7 by default) for
/// `cfg.double_cost`.
pub fn buy_double_coins(
    cfg: &Config,
    store: &mut LedgerStore,
    user_id: i64,
    today: NaiveDate,
) -> Result<PurchaseOutcome, LedgerError> {
    buy_boost(store, user_id, cfg.double_cost, Boost::DoubleCoins, cfg.double_days, today)
}
