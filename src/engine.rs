//! Challenge/completion engine: the daily gate, the streak state machine,
//! challenge assignment with an anti-repeat window, and the streak-expiry
//! sweep. The engine computes; `LedgerStore` persists atomically.

use chrono::NaiveDate;
use rand::Rng;

use crate::achievements::{self, LedgerSnapshot};
use crate::catalog::Catalog;
use crate::config::Config;
use crate::error::LedgerError;
use crate::ledger::{CompletionOutcome, CompletionReport, EarnedAchievement};
use crate::logging::{log, obj, v_int, v_str, Domain, Level};
use crate::store::LedgerStore;

/// A freeze protects (inclusively) through its expiry date.
pub fn freeze_covers(freeze_until: Option<NaiveDate>, today: NaiveDate) -> bool {
    matches!(freeze_until, Some(until) if until >= today)
}

/// Streak value a completion today would produce. Same-day repeats are
/// rejected before this is called.
pub fn next_streak(
    last_completed: Option<NaiveDate>,
    streak: u32,
    freeze_until: Option<NaiveDate>,
    today: NaiveDate,
) -> u32 {
    let last = match last_completed {
        Some(d) => d,
        None => return 1,
    };
    match (today - last).num_days() {
        1 => streak + 1,
        gap if gap > 1 && freeze_covers(freeze_until, today) => {
            // The freeze forgives the gap but never grows the streak. A
            // freeze can also outlive a sweep that already reset the user;
            // completing again always counts for at least itself.
            streak.max(1)
        }
        _ => 1,
    }
}

/// Whether a streak survives the nightly sweep: yesterday (or today) still
/// counts, otherwise only an active freeze saves it. Shares the freeze rule
/// with `next_streak` so the sweep and `complete` can never disagree.
pub fn streak_survives_sweep(
    last_completed: Option<NaiveDate>,
    freeze_until: Option<NaiveDate>,
    today: NaiveDate,
) -> bool {
    match last_completed {
        Some(last) => (today - last).num_days() <= 1 || freeze_covers(freeze_until, today),
        None => false,
    }
}

pub struct Engine {
    pub cfg: Config,
    pub catalog: Catalog,
}

impl Engine {
    pub fn new(cfg: Config, catalog: Catalog) -> Self {
        Self { cfg, catalog }
    }

    /// Mark today's challenge complete: one atomic ledger mutation plus one
    /// history append, capturing the pending challenge/category as they were
    /// before the update.
    pub fn complete(
        &self,
        store: &mut LedgerStore,
        user_id: i64,
        today: NaiveDate,
    ) -> Result<CompletionOutcome, LedgerError> {
        let user = store.get_user(user_id)?.ok_or(LedgerError::UserNotFound(user_id))?;
        if user.last_completed_date == Some(today) {
            return Err(LedgerError::AlreadyCompletedToday);
        }

        let new_streak = next_streak(user.last_completed_date, user.streak, user.streak_freeze_until, today);
        let reward = if freeze_covers(user.double_coins_until, today) {
            self.cfg.base_reward * 2
        } else {
            self.cfg.base_reward
        };

        let (total_completed, total_coins) = store.apply_completion(
            user_id,
            new_streak,
            reward,
            today,
            user.current_challenge.as_deref(),
            user.current_category.as_deref(),
        )?;

        log(
            Level::Info,
            Domain::Ledger,
            "challenge.completed",
            obj(&[
                ("user_id", v_int(user_id)),
                ("streak", v_int(new_streak as i64)),
                ("total", v_int(total_completed as i64)),
                ("reward", v_int(reward)),
            ]),
        );

        Ok(CompletionOutcome {
            streak: new_streak,
            total_completed,
            coins_earned: reward,
            total_coins,
        })
    }

    /// `complete` plus the post-completion hook: achievement grants,
    /// milestone messages and the level label, bundled for the caller.
    pub fn complete_with_rewards(
        &self,
        store: &mut LedgerStore,
        user_id: i64,
        today: NaiveDate,
    ) -> Result<CompletionReport, LedgerError> {
        let mut outcome = self.complete(store, user_id, today)?;

        let user = store.get_user(user_id)?.ok_or(LedgerError::UserNotFound(user_id))?;
        let snapshot = LedgerSnapshot {
            streak: user.streak,
            total_completed: user.total_completed,
            category_counts: store.category_counts(user_id)?,
            earned: user.achievements.clone(),
        };

        let mut new_achievements = Vec::new();
        for a in achievements::evaluate(&self.catalog, &snapshot) {
            if store.grant_achievement(user_id, &a.id, a.reward)? {
                log(
                    Level::Info,
                    Domain::Ledger,
                    "achievement.earned",
                    obj(&[("user_id", v_int(user_id)), ("id", v_str(&a.id)), ("reward", v_int(a.reward))]),
                );
                outcome.total_coins += a.reward;
                new_achievements.push(EarnedAchievement {
                    id: a.id.clone(),
                    name: a.name.clone(),
                    reward: a.reward,
                });
            }
        }

        let milestones = achievements::milestones(&self.catalog, outcome.streak, outcome.total_completed);
        let level = achievements::level_for(&self.catalog, outcome.total_completed).to_string();

        Ok(CompletionReport { outcome, new_achievements, milestones, level })
    }

    /// Assign a random challenge from the category pool, skipping the last
    /// few shown to this user in this category. When the exclusion empties
    /// the pool, the window resets and selection runs over the full pool.
    pub fn assign_challenge(
        &self,
        store: &mut LedgerStore,
        rng: &mut impl Rng,
        user_id: i64,
        category_id: &str,
    ) -> Result<String, LedgerError> {
        let category = self
            .catalog
            .category(category_id)
            .ok_or_else(|| LedgerError::UnknownCategory(category_id.to_string()))?;
        store.get_user(user_id)?.ok_or(LedgerError::UserNotFound(user_id))?;

        let recent = store.recent_challenges(user_id, category_id)?;
        let mut pool: Vec<&String> =
            category.challenges.iter().filter(|c| !recent.contains(*c)).collect();
        if pool.is_empty() {
            store.clear_recent(user_id, category_id)?;
            pool = category.challenges.iter().collect();
        }

        let pick = pool[rng.gen_range(0..pool.len())].clone();
        store.set_assignment(user_id, category_id, &pick, self.cfg.recent_window)?;
        Ok(pick)
    }

    /// Nightly sweep: reset the streaks that did not survive the day
    /// boundary. Returns how many users were reset.
    pub fn expire_streaks(&self, store: &mut LedgerStore, today: NaiveDate) -> Result<usize, LedgerError> {
        let expired: Vec<i64> = store
            .streak_candidates()?
            .into_iter()
            .filter(|(_, last, freeze)| !streak_survives_sweep(*last, *freeze, today))
            .map(|(id, _, _)| id)
            .collect();
        let n = store.reset_streaks(&expired)?;
        log(
            Level::Info,
            Domain::Sweep,
            "streaks.expired",
            obj(&[("reset", v_int(n as i64))]),
        );
        Ok(n)
    }
}
