//! SQLite-backed user ledger.
//!
//! One canonical snake_case schema, one access layer. Every multi-field
//! mutation is either a single conditional UPDATE computing all derived
//! fields in one pass, or an explicit transaction committed as a unit, so a
//! failed operation never leaves partial state behind.

use chrono::NaiveDate;
use rusqlite::{params, Connection, OptionalExtension};
use std::collections::BTreeMap;

use crate::error::LedgerError;
use crate::ledger::{CompletionRecord, UserRow, UserStats};

const DATE_FMT: &str = "%Y-%m-%d";

fn d2s(d: NaiveDate) -> String {
    d.format(DATE_FMT).to_string()
}

fn s2d(s: Option<String>) -> Option<NaiveDate> {
    s.and_then(|v| NaiveDate::parse_from_str(&v, DATE_FMT).ok())
}

pub struct LedgerStore {
    conn: Connection,
}

impl LedgerStore {
    pub fn open(path: &str) -> Result<Self, LedgerError> {
        Ok(Self { conn: Connection::open(path)? })
    }

    pub fn open_in_memory() -> Result<Self, LedgerError> {
        Ok(Self { conn: Connection::open_in_memory()? })
    }

    pub fn init(&mut self) -> Result<(), LedgerError> {
        self.conn.execute_batch(
            "BEGIN;
            CREATE TABLE IF NOT EXISTS users (
                user_id INTEGER PRIMARY KEY,
                username TEXT,
                streak INTEGER NOT NULL DEFAULT 0,
                longest_streak INTEGER NOT NULL DEFAULT 0,
                total_completed INTEGER NOT NULL DEFAULT 0,
                coins INTEGER NOT NULL DEFAULT 0,
                last_completed_date TEXT,
                current_challenge TEXT,
                current_category TEXT,
                streak_freeze_until TEXT,
                double_coins_until TEXT,
                last_coinflip_date TEXT,
                achievements TEXT NOT NULL DEFAULT '[]',
                warnings INTEGER NOT NULL DEFAULT 0,
                created_at TEXT DEFAULT CURRENT_TIMESTAMP
            );
            CREATE TABLE IF NOT EXISTS history (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id INTEGER NOT NULL,
                date TEXT NOT NULL,
                category TEXT,
                challenge TEXT,
                FOREIGN KEY (user_id) REFERENCES users(user_id)
            );
            CREATE TABLE IF NOT EXISTS recent_challenges (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id INTEGER NOT NULL,
                category TEXT NOT NULL,
                challenge TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_history_user ON history(user_id);
            CREATE INDEX IF NOT EXISTS idx_recent_user_cat ON recent_challenges(user_id, category);
            COMMIT;",
        )?;
        Ok(())
    }

    /// Create-on-first-contact; a repeat call is a no-op.
    pub fn register(&mut self, user_id: i64, username: Option<&str>) -> Result<(), LedgerError> {
        self.conn.execute(
            "INSERT OR IGNORE INTO users (user_id, username) VALUES (?1, ?2)",
            params![user_id, username],
        )?;
        Ok(())
    }

    pub fn get_user(&self, user_id: i64) -> Result<Option<UserRow>, LedgerError> {
        let row = self
            .conn
            .query_row(
                "SELECT user_id, username, streak, longest_streak, total_completed, coins,
                        last_completed_date, current_challenge, current_category,
                        streak_freeze_until, double_coins_until, last_coinflip_date,
                        achievements, warnings
                 FROM users WHERE user_id = ?1",
                params![user_id],
                |r| {
                    Ok(UserRow {
                        user_id: r.get(0)?,
                        username: r.get(1)?,
                        streak: r.get::<_, i64>(2)? as u32,
                        longest_streak: r.get::<_, i64>(3)? as u32,
                        total_completed: r.get::<_, i64>(4)? as u32,
                        coins: r.get(5)?,
                        last_completed_date: s2d(r.get(6)?),
                        current_challenge: r.get(7)?,
                        current_category: r.get(8)?,
                        streak_freeze_until: s2d(r.get(9)?),
                        double_coins_until: s2d(r.get(10)?),
                        last_coinflip_date: s2d(r.get(11)?),
                        achievements: serde_json::from_str(&r.get::<_, String>(12)?).unwrap_or_default(),
                        warnings: r.get::<_, i64>(13)? as u32,
                    })
                },
            )
            .optional()?;
        Ok(row)
    }

    fn require_user(&self, user_id: i64) -> Result<UserRow, LedgerError> {
        self.get_user(user_id)?.ok_or(LedgerError::UserNotFound(user_id))
    }

    /// Persist one completion: streak, high-water mark, counters, reward and
    /// the history append commit together or not at all. Returns the new
    /// (total_completed, coins).
    pub fn apply_completion(
        &mut self,
        user_id: i64,
        new_streak: u32,
        reward: i64,
        today: NaiveDate,
        challenge: Option<&str>,
        category: Option<&str>,
    ) -> Result<(u32, i64), LedgerError> {
        let tx = self.conn.transaction()?;
        let changed = tx.execute(
            "UPDATE users
             SET streak = ?1,
                 longest_streak = MAX(longest_streak, ?1),
                 total_completed = total_completed + 1,
                 coins = coins + ?2,
                 last_completed_date = ?3
             WHERE user_id = ?4",
            params![new_streak as i64, reward, d2s(today), user_id],
        )?;
        if changed == 0 {
            return Err(LedgerError::UserNotFound(user_id));
        }
        tx.execute(
            "INSERT INTO history (user_id, date, category, challenge) VALUES (?1, ?2, ?3, ?4)",
            params![user_id, d2s(today), category, challenge],
        )?;
        let (total, coins) = tx.query_row(
            "SELECT total_completed, coins FROM users WHERE user_id = ?1",
            params![user_id],
            |r| Ok((r.get::<_, i64>(0)? as u32, r.get::<_, i64>(1)?)),
        )?;
        tx.commit()?;
        Ok((total, coins))
    }

    /// Overwrite the pending assignment and remember it in the anti-repeat
    /// window, trimmed to `window` entries per user+category.
    pub fn set_assignment(
        &mut self,
        user_id: i64,
        category: &str,
        challenge: &str,
        window: usize,
    ) -> Result<(), LedgerError> {
        let tx = self.conn.transaction()?;
        tx.execute(
            "UPDATE users SET current_challenge = ?1, current_category = ?2 WHERE user_id = ?3",
            params![challenge, category, user_id],
        )?;
        tx.execute(
            "INSERT INTO recent_challenges (user_id, category, challenge) VALUES (?1, ?2, ?3)",
            params![user_id, category, challenge],
        )?;
        tx.execute(
            "DELETE FROM recent_challenges
             WHERE user_id = ?1 AND category = ?2 AND id NOT IN (
                SELECT id FROM recent_challenges
                WHERE user_id = ?1 AND category = ?2
                ORDER BY id DESC LIMIT ?3
             )",
            params![user_id, category, window as i64],
        )?;
        tx.commit()?;
        Ok(())
    }

    pub fn recent_challenges(&self, user_id: i64, category: &str) -> Result<Vec<String>, LedgerError> {
        let mut stmt = self.conn.prepare(
            "SELECT challenge FROM recent_challenges
             WHERE user_id = ?1 AND category = ?2 ORDER BY id DESC",
        )?;
        let rows = stmt.query_map(params![user_id, category], |r| r.get(0))?;
        let mut out = Vec::new();
        for r in rows {
            out.push(r?);
        }
        Ok(out)
    }

    pub fn clear_recent(&mut self, user_id: i64, category: &str) -> Result<(), LedgerError> {
        self.conn.execute(
            "DELETE FROM recent_challenges WHERE user_id = ?1 AND category = ?2",
            params![user_id, category],
        )?;
        Ok(())
    }

    /// Debit `cost` and set a boost expiry column in one conditional UPDATE;
    /// zero rows means the funds check failed (or the user is gone) and
    /// nothing was written.
    pub fn apply_purchase(
        &mut self,
        user_id: i64,
        cost: i64,
        boost: Boost,
        new_until: NaiveDate,
    ) -> Result<i64, LedgerError> {
        let sql = match boost {
            Boost::StreakFreeze => {
                "UPDATE users SET coins = coins - ?1, streak_freeze_until = ?2
                 WHERE user_id = ?3 AND coins >= ?1"
            }
            Boost::DoubleCoins => {
                "UPDATE users SET coins = coins - ?1, double_coins_until = ?2
                 WHERE user_id = ?3 AND coins >= ?1"
            }
        };
        let changed = self.conn.execute(sql, params![cost, d2s(new_until), user_id])?;
        if changed == 0 {
            let user = self.require_user(user_id)?;
            return Err(LedgerError::InsufficientFunds { needed: cost, balance: user.coins });
        }
        let user = self.require_user(user_id)?;
        Ok(user.coins)
    }

    /// Durable check-and-mark for a wager round: verifies funds and the
    /// one-play-per-day rule and stamps today's date in the same statement,
    /// before any randomness. Zero rows affected means the round is refused
    /// with the ledger untouched.
    pub fn begin_wager(&mut self, user_id: i64, bet: i64, today: NaiveDate) -> Result<(), LedgerError> {
        let changed = self.conn.execute(
            "UPDATE users SET last_coinflip_date = ?1
             WHERE user_id = ?2 AND coins >= ?3
               AND (last_coinflip_date IS NULL OR last_coinflip_date <> ?1)",
            params![d2s(today), user_id, bet],
        )?;
        if changed == 1 {
            return Ok(());
        }
        let user = self.require_user(user_id)?;
        if user.last_coinflip_date == Some(today) {
            Err(LedgerError::AlreadyPlayedToday)
        } else {
            Err(LedgerError::InsufficientFunds { needed: bet, balance: user.coins })
        }
    }

    /// Atomic wager settlement: apply the signed delta and read the new
    /// balance inside one transaction.
    pub fn settle_wager(&mut self, user_id: i64, delta: i64) -> Result<i64, LedgerError> {
        let tx = self.conn.transaction()?;
        let changed = tx.execute(
            "UPDATE users SET coins = coins + ?1 WHERE user_id = ?2",
            params![delta, user_id],
        )?;
        if changed == 0 {
            return Err(LedgerError::UserNotFound(user_id));
        }
        let balance =
            tx.query_row("SELECT coins FROM users WHERE user_id = ?1", params![user_id], |r| r.get(0))?;
        tx.commit()?;
        Ok(balance)
    }

    /// Append an achievement id and credit its reward in one transaction.
    /// Returns false (and writes nothing) when the id is already earned.
    pub fn grant_achievement(&mut self, user_id: i64, achievement_id: &str, reward: i64) -> Result<bool, LedgerError> {
        let tx = self.conn.transaction()?;
        let raw: String = tx
            .query_row("SELECT achievements FROM users WHERE user_id = ?1", params![user_id], |r| r.get(0))
            .optional()?
            .ok_or(LedgerError::UserNotFound(user_id))?;
        let mut earned: Vec<String> = serde_json::from_str(&raw).unwrap_or_default();
        if earned.iter().any(|a| a == achievement_id) {
            return Ok(false);
        }
        earned.push(achievement_id.to_string());
        let encoded = serde_json::to_string(&earned).unwrap_or_else(|_| "[]".to_string());
        tx.execute(
            "UPDATE users SET achievements = ?1, coins = coins + ?2 WHERE user_id = ?3",
            params![encoded, reward, user_id],
        )?;
        tx.commit()?;
        Ok(true)
    }

    /// Admin coin award.
    pub fn add_coins(&mut self, user_id: i64, amount: i64) -> Result<i64, LedgerError> {
        self.settle_wager(user_id, amount)
    }

    /// Moderation counter; the moderation flow itself lives outside the core.
    pub fn add_warning(&mut self, user_id: i64) -> Result<(), LedgerError> {
        let changed = self
            .conn
            .execute("UPDATE users SET warnings = warnings + 1 WHERE user_id = ?1", params![user_id])?;
        if changed == 0 {
            return Err(LedgerError::UserNotFound(user_id));
        }
        Ok(())
    }

    pub fn all_users(&self) -> Result<Vec<i64>, LedgerError> {
        let mut stmt = self.conn.prepare("SELECT user_id FROM users")?;
        let rows = stmt.query_map([], |r| r.get(0))?;
        let mut out = Vec::new();
        for r in rows {
            out.push(r?);
        }
        Ok(out)
    }

    /// Users with a live streak, as (id, last_completed, freeze_until) for
    /// the expiry sweep.
    pub fn streak_candidates(&self) -> Result<Vec<(i64, Option<NaiveDate>, Option<NaiveDate>)>, LedgerError> {
        let mut stmt = self.conn.prepare(
            "SELECT user_id, last_completed_date, streak_freeze_until FROM users WHERE streak > 0",
        )?;
        let rows = stmt.query_map([], |r| {
            Ok((r.get::<_, i64>(0)?, r.get::<_, Option<String>>(1)?, r.get::<_, Option<String>>(2)?))
        })?;
        let mut out = Vec::new();
        for r in rows {
            let (id, last, freeze) = r?;
            out.push((id, s2d(last), s2d(freeze)));
        }
        Ok(out)
    }

    /// Reset the listed users' streaks to zero in one transaction.
    pub fn reset_streaks(&mut self, user_ids: &[i64]) -> Result<usize, LedgerError> {
        let tx = self.conn.transaction()?;
        let mut n = 0;
        for id in user_ids {
            n += tx.execute("UPDATE users SET streak = 0 WHERE user_id = ?1", params![id])?;
        }
        tx.commit()?;
        Ok(n)
    }

    /// Chronological completion history, oldest first.
    pub fn history(&self, user_id: i64) -> Result<Vec<CompletionRecord>, LedgerError> {
        let mut stmt = self.conn.prepare(
            "SELECT date, category, challenge FROM history WHERE user_id = ?1 ORDER BY id ASC",
        )?;
        let rows = stmt.query_map(params![user_id], |r| {
            Ok((r.get::<_, String>(0)?, r.get::<_, Option<String>>(1)?, r.get::<_, Option<String>>(2)?))
        })?;
        let mut out = Vec::new();
        for r in rows {
            let (date, category, challenge) = r?;
            if let Some(date) = s2d(Some(date)) {
                out.push(CompletionRecord { date, category, challenge });
            }
        }
        Ok(out)
    }

    /// Completions per category, from the append-only history.
    pub fn category_counts(&self, user_id: i64) -> Result<BTreeMap<String, u32>, LedgerError> {
        let mut stmt = self.conn.prepare(
            "SELECT COALESCE(category, 'unknown'), COUNT(*) FROM history
             WHERE user_id = ?1 GROUP BY COALESCE(category, 'unknown')",
        )?;
        let rows = stmt.query_map(params![user_id], |r| {
            Ok((r.get::<_, String>(0)?, r.get::<_, i64>(1)? as u32))
        })?;
        let mut out = BTreeMap::new();
        for r in rows {
            let (cat, n) = r?;
            out.insert(cat, n);
        }
        Ok(out)
    }

    pub fn stats(&self, user_id: i64) -> Result<UserStats, LedgerError> {
        let user = self.require_user(user_id)?;
        let category_counts = self.category_counts(user_id)?;
        Ok(UserStats {
            streak: user.streak,
            longest_streak: user.longest_streak,
            total_completed: user.total_completed,
            coins: user.coins,
            last_completed_date: user.last_completed_date,
            achievements: user.achievements,
            category_counts,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Boost {
    StreakFreeze,
    DoubleCoins,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> LedgerStore {
        let mut s = LedgerStore::open_in_memory().unwrap();
        s.init().unwrap();
        s
    }

    fn day(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, DATE_FMT).unwrap()
    }

    #[test]
    fn register_is_idempotent() {
        let mut s = store();
        s.register(1, Some("ana")).unwrap();
        s.register(1, Some("other")).unwrap();
        let u = s.get_user(1).unwrap().unwrap();
        assert_eq!(u.username.as_deref(), Some("ana"));
        assert_eq!(u.streak, 0);
        assert_eq!(u.coins, 0);
    }

    #[test]
    fn missing_user_reads_as_none() {
        let s = store();
        assert!(s.get_user(42).unwrap().is_none());
    }

    #[test]
    fn apply_completion_updates_all_fields_together() {
        let mut s = store();
        s.register(1, None).unwrap();
        let (total, coins) = s.apply_completion(1, 3, 5, day("2026-08-30"), Some("walk"), Some("sport")).unwrap();
        assert_eq!(total, 1);
        assert_eq!(coins, 5);
        let u = s.get_user(1).unwrap().unwrap();
        assert_eq!(u.streak, 3);
        assert_eq!(u.longest_streak, 3);
        assert_eq!(u.last_completed_date, Some(day("2026-08-30")));
        assert_eq!(s.category_counts(1).unwrap().get("sport"), Some(&1));
        let hist = s.history(1).unwrap();
        assert_eq!(hist.len(), 1);
        assert_eq!(hist[0].challenge.as_deref(), Some("walk"));
        assert_eq!(hist[0].date, day("2026-08-30"));
    }

    #[test]
    fn longest_streak_is_a_high_water_mark() {
        let mut s = store();
        s.register(1, None).unwrap();
        s.apply_completion(1, 5, 5, day("2026-08-01"), None, None).unwrap();
        s.apply_completion(1, 1, 5, day("2026-08-10"), None, None).unwrap();
        let u = s.get_user(1).unwrap().unwrap();
        assert_eq!(u.streak, 1);
        assert_eq!(u.longest_streak, 5);
    }

    #[test]
    fn purchase_rejected_without_funds_leaves_row_unchanged() {
        let mut s = store();
        s.register(1, None).unwrap();
        s.add_coins(1, 49).unwrap();
        let err = s.apply_purchase(1, 50, Boost::StreakFreeze, day("2026-09-01")).unwrap_err();
        assert!(matches!(err, LedgerError::InsufficientFunds { needed: 50, balance: 49 }));
        let u = s.get_user(1).unwrap().unwrap();
        assert_eq!(u.coins, 49);
        assert_eq!(u.streak_freeze_until, None);
    }

    #[test]
    fn begin_wager_stamps_date_once() {
        let mut s = store();
        s.register(1, None).unwrap();
        s.add_coins(1, 100).unwrap();
        s.begin_wager(1, 10, day("2026-08-30")).unwrap();
        let err = s.begin_wager(1, 10, day("2026-08-30")).unwrap_err();
        assert!(matches!(err, LedgerError::AlreadyPlayedToday));
        // Next calendar day opens the gate again.
        s.begin_wager(1, 10, day("2026-08-31")).unwrap();
    }

    #[test]
    fn begin_wager_needs_funds() {
        let mut s = store();
        s.register(1, None).unwrap();
        s.add_coins(1, 5).unwrap();
        let err = s.begin_wager(1, 10, day("2026-08-30")).unwrap_err();
        assert!(matches!(err, LedgerError::InsufficientFunds { needed: 10, balance: 5 }));
        let u = s.get_user(1).unwrap().unwrap();
        assert_eq!(u.last_coinflip_date, None);
    }

    #[test]
    fn grant_achievement_is_idempotent() {
        let mut s = store();
        s.register(1, None).unwrap();
        assert!(s.grant_achievement(1, "first_step", 10).unwrap());
        assert!(!s.grant_achievement(1, "first_step", 10).unwrap());
        let u = s.get_user(1).unwrap().unwrap();
        assert_eq!(u.achievements, vec!["first_step".to_string()]);
        assert_eq!(u.coins, 10);
    }

    #[test]
    fn stats_snapshot_includes_category_histogram() {
        let mut s = store();
        s.register(1, None).unwrap();
        s.apply_completion(1, 1, 5, day("2026-08-28"), Some("a"), Some("sport")).unwrap();
        s.apply_completion(1, 2, 5, day("2026-08-29"), Some("b"), Some("sport")).unwrap();
        s.apply_completion(1, 3, 5, day("2026-08-30"), Some("c"), Some("creative")).unwrap();
        s.add_warning(1).unwrap();

        let st = s.stats(1).unwrap();
        assert_eq!(st.streak, 3);
        assert_eq!(st.total_completed, 3);
        assert_eq!(st.coins, 15);
        assert_eq!(st.category_counts.get("sport"), Some(&2));
        assert_eq!(st.category_counts.get("creative"), Some(&1));
        assert_eq!(s.get_user(1).unwrap().unwrap().warnings, 1);
    }

    #[test]
    fn recent_window_is_trimmed() {
        let mut s = store();
        s.register(1, None).unwrap();
        for i in 0..7 {
            s.set_assignment(1, "sport", &format!("c{}", i), 5).unwrap();
        }
        let recent = s.recent_challenges(1, "sport").unwrap();
        assert_eq!(recent.len(), 5);
        assert_eq!(recent[0], "c6");
        assert!(!recent.contains(&"c0".to_string()));
        let u = s.get_user(1).unwrap().unwrap();
        assert_eq!(u.current_challenge.as_deref(), Some("c6"));
        assert_eq!(u.current_category.as_deref(), Some("sport"));
    }
}
