//! Coin-flip wager: one round per user per calendar day.
//!
//! State machine: Idle -> BetChosen -> Resolving -> Settled. Choosing a bet
//! reserves nothing; `start` is the durable check-and-mark that stamps
//! `last_coinflip_date` BEFORE the roll, so a concurrent second attempt is
//! rejected no matter how the first resolves. Settlement applies the signed
//! stake in one atomic update. If settlement fails after the stamp, the day
//! is consumed (fails closed) and the round is logged in the audit domain
//! for manual reconciliation.

use chrono::NaiveDate;
use rand::Rng;
use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use crate::config::Config;
use crate::error::LedgerError;
use crate::ledger::WagerOutcome;
use crate::logging::{log, obj, v_bool, v_int, v_str, Domain, Level};
use crate::store::LedgerStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Prediction {
    /// Roll lands above the midpoint (4..=6).
    High,
    /// Roll lands at or below the midpoint (1..=3).
    Low,
}

impl Prediction {
    pub fn wins(&self, roll: u8) -> bool {
        match self {
            Prediction::High => roll > 3,
            Prediction::Low => roll <= 3,
        }
    }

    fn as_str(&self) -> &'static str {
        match self {
            Prediction::High => "high",
            Prediction::Low => "low",
        }
    }
}

/// A chosen stake and direction. Pure intent: dropping it is a free cancel,
/// since no balance moves before `start`.
#[derive(Debug, Clone, Copy)]
pub struct BetSlip {
    pub bet: i64,
    pub prediction: Prediction,
}

/// Process-local ticket proving this user has a round in flight. Released on
/// drop, whatever path the round takes. Defense in depth against UI
/// double-clicks; the durable per-day stamp is the real lock.
#[derive(Debug)]
struct InFlight {
    set: Arc<Mutex<HashSet<i64>>>,
    user_id: i64,
}

impl Drop for InFlight {
    fn drop(&mut self) {
        if let Ok(mut set) = self.set.lock() {
            set.remove(&self.user_id);
        }
    }
}

/// A round past the durable check-and-mark, ready to roll and settle.
#[derive(Debug)]
pub struct Round {
    pub user_id: i64,
    pub bet: i64,
    pub prediction: Prediction,
    _ticket: InFlight,
}

pub struct WagerGame {
    bets: Vec<i64>,
    in_flight: Arc<Mutex<HashSet<i64>>>,
}

impl WagerGame {
    pub fn new(cfg: &Config) -> Self {
        Self {
            bets: cfg.wager_bets.clone(),
            in_flight: Arc::new(Mutex::new(HashSet::new())),
        }
    }

    /// Idle -> BetChosen. Validates the stake against the fixed menu.
    pub fn choose(&self, bet: i64, prediction: Prediction) -> Result<BetSlip, LedgerError> {
        if !self.bets.contains(&bet) {
            return Err(LedgerError::InvalidBetAmount(bet));
        }
        Ok(BetSlip { bet, prediction })
    }

    /// BetChosen -> Resolving. Takes the process-local ticket, then durably
    /// re-verifies funds and the one-play-per-day rule while stamping the
    /// date. On any error the ticket is released and the ledger is
    /// untouched (except the documented stamp-without-payout window, which
    /// cannot happen here because the stamp is the last durable step).
    pub fn start(
        &self,
        store: &mut LedgerStore,
        user_id: i64,
        slip: BetSlip,
        today: NaiveDate,
    ) -> Result<Round, LedgerError> {
        let ticket = {
            let mut set = self
                .in_flight
                .lock()
                .map_err(|_| LedgerError::AlreadyPlayedToday)?;
            if !set.insert(user_id) {
                return Err(LedgerError::AlreadyPlayedToday);
            }
            InFlight { set: Arc::clone(&self.in_flight), user_id }
        };

        store.begin_wager(user_id, slip.bet, today)?;
        log(
            Level::Info,
            Domain::Wager,
            "round.started",
            obj(&[
                ("user_id", v_int(user_id)),
                ("bet", v_int(slip.bet)),
                ("prediction", v_str(slip.prediction.as_str())),
            ]),
        );
        Ok(Round { user_id, bet: slip.bet, prediction: slip.prediction, _ticket: ticket })
    }

    /// Uniform d6 roll. Always called after `start`, never before.
    pub fn roll(&self, rng: &mut impl Rng) -> u8 {
        rng.gen_range(1..=6)
    }

    /// Resolving -> Settled. One atomic balance update; the round (and its
    /// ticket) is consumed either way. A persistence failure here leaves the
    /// day's stamp set with no payout: logged distinctly, never retried.
    pub fn settle(
        &self,
        store: &mut LedgerStore,
        round: Round,
        roll: u8,
    ) -> Result<WagerOutcome, LedgerError> {
        let won = round.prediction.wins(roll);
        let delta = if won { round.bet } else { -round.bet };
        match store.settle_wager(round.user_id, delta) {
            Ok(balance) => {
                log(
                    Level::Info,
                    Domain::Wager,
                    "round.settled",
                    obj(&[
                        ("user_id", v_int(round.user_id)),
                        ("roll", v_int(roll as i64)),
                        ("won", v_bool(won)),
                        ("delta", v_int(delta)),
                        ("balance", v_int(balance)),
                    ]),
                );
                Ok(WagerOutcome { roll, won, delta, balance })
            }
            Err(e) => {
                // The day lock is already durable; the round is lost, not
                // retried (a retry could double-settle).
                log(
                    Level::Error,
                    Domain::Audit,
                    "wager.settle_failed",
                    obj(&[
                        ("user_id", v_int(round.user_id)),
                        ("bet", v_int(round.bet)),
                        ("prediction", v_str(round.prediction.as_str())),
                        ("roll", v_int(roll as i64)),
                        ("won", v_bool(won)),
                        ("error", v_str(&e.to_string())),
                    ]),
                );
                Err(e)
            }
        }
    }

    /// Full round for schedulers and simulations: choose, start, roll,
    /// settle. Interactive callers drive the steps separately so they can
    /// pause for the dice animation between start and settle.
    pub fn play(
        &self,
        store: &mut LedgerStore,
        rng: &mut impl Rng,
        user_id: i64,
        bet: i64,
        prediction: Prediction,
        today: NaiveDate,
    ) -> Result<WagerOutcome, LedgerError> {
        let slip = self.choose(bet, prediction)?;
        let round = self.start(store, user_id, slip, today)?;
        let roll = self.roll(rng);
        self.settle(store, round, roll)
    }
}
