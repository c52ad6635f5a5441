//! Per-user ledger state and the structured records operations return.

use chrono::NaiveDate;
use serde::Serialize;
use std::collections::BTreeMap;

/// One row of the `users` table. The mutable heart of the system: every
/// completion, purchase, wager and admin action ends up here.
#[derive(Debug, Clone)]
pub struct UserRow {
    pub user_id: i64,
    pub username: Option<String>,
    pub streak: u32,
    pub longest_streak: u32,
    pub total_completed: u32,
    pub coins: i64,
    pub last_completed_date: Option<NaiveDate>,
    pub current_challenge: Option<String>,
    pub current_category: Option<String>,
    /// Inclusive expiry of streak protection.
    pub streak_freeze_until: Option<NaiveDate>,
    /// Inclusive expiry of the 2x reward boost.
    pub double_coins_until: Option<NaiveDate>,
    /// Durable witness of the day's coin-flip play.
    pub last_coinflip_date: Option<NaiveDate>,
    pub achievements: Vec<String>,
    pub warnings: u32,
}

/// Immutable history entry, appended once per successful completion.
#[derive(Debug, Clone, Serialize)]
pub struct CompletionRecord {
    pub date: NaiveDate,
    pub category: Option<String>,
    pub challenge: Option<String>,
}

/// Result of a successful `complete()` call.
#[derive(Debug, Clone, Serialize)]
pub struct CompletionOutcome {
    pub streak: u32,
    pub total_completed: u32,
    pub coins_earned: i64,
    pub total_coins: i64,
}

/// Completion plus everything the post-completion hook decided.
#[derive(Debug, Clone, Serialize)]
pub struct CompletionReport {
    #[serde(flatten)]
    pub outcome: CompletionOutcome,
    pub new_achievements: Vec<EarnedAchievement>,
    pub milestones: Vec<String>,
    pub level: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct EarnedAchievement {
    pub id: String,
    pub name: String,
    pub reward: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct PurchaseOutcome {
    pub coins_left: i64,
    pub active_until: NaiveDate,
}

#[derive(Debug, Clone, Serialize)]
pub struct WagerOutcome {
    pub roll: u8,
    pub won: bool,
    /// Signed balance change: +bet on a win, -bet on a loss.
    pub delta: i64,
    pub balance: i64,
}

/// Read-only snapshot for the stats screen and the achievement evaluator.
#[derive(Debug, Clone, Serialize)]
pub struct UserStats {
    pub streak: u32,
    pub longest_streak: u32,
    pub total_completed: u32,
    pub coins: i64,
    pub last_completed_date: Option<NaiveDate>,
    pub achievements: Vec<String>,
    pub category_counts: BTreeMap<String, u32>,
}
