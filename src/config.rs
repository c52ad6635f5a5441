/// Runtime configuration, env-var driven with workable defaults.
#[derive(Clone, Debug)]
pub struct Config {
    pub sqlite_path: String,
    /// Offset of the bot's "calendar day" from UTC, in hours.
    pub tz_offset_hours: i32,
    pub base_reward: i64,
    pub freeze_cost: i64,
    pub freeze_days: u32,
    pub double_cost: i64,
    pub double_days: u32,
    /// Allowed coin-flip stakes, comma separated in WAGER_BETS.
    pub wager_bets: Vec<i64>,
    /// Anti-repeat window for challenge assignment, per user+category.
    pub recent_window: usize,
    pub sweep_secs: u64,
    /// Optional JSON catalog file; builtin catalog when unset.
    pub catalog_path: Option<String>,
}

impl Config {
    pub fn from_env() -> Self {
        Self {
            sqlite_path: std::env::var("SQLITE_PATH").unwrap_or_else(|_| "./smallstep.sqlite".to_string()),
            tz_offset_hours: std::env::var("TZ_OFFSET_HOURS").ok().and_then(|v| v.parse().ok()).unwrap_or(3),
            base_reward: std::env::var("BASE_REWARD").ok().and_then(|v| v.parse().ok()).unwrap_or(5),
            freeze_cost: std::env::var("FREEZE_COST").ok().and_then(|v| v.parse().ok()).unwrap_or(50),
            freeze_days: std::env::var("FREEZE_DAYS").ok().and_then(|v| v.parse().ok()).unwrap_or(1),
            double_cost: std::env::var("DOUBLE_COST").ok().and_then(|v| v.parse().ok()).unwrap_or(100),
            double_days: std::env::var("DOUBLE_DAYS").ok().and_then(|v| v.parse().ok()).unwrap_or(7),
            wager_bets: std::env::var("WAGER_BETS")
                .ok()
                .map(|v| v.split(',').filter_map(|p| p.trim().parse().ok()).collect())
                .filter(|v: &Vec<i64>| !v.is_empty())
                .unwrap_or_else(|| vec![5, 10, 15, 20]),
            recent_window: std::env::var("RECENT_WINDOW").ok().and_then(|v| v.parse().ok()).unwrap_or(5),
            sweep_secs: std::env::var("SWEEP_SECS").ok().and_then(|v| v.parse().ok()).unwrap_or(86_400),
            catalog_path: std::env::var("CATALOG_PATH").ok(),
        }
    }

    /// Seconds until the next sweep boundary, aligned to `sweep_secs`.
    pub fn sleep_until_next_sweep(&self, now_ts: u64) -> u64 {
        let next = ((now_ts / self.sweep_secs) + 1) * self.sweep_secs;
        next.saturating_sub(now_ts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sweep_alignment() {
        let mut cfg = Config::from_env();
        cfg.sweep_secs = 3600;
        assert_eq!(cfg.sleep_until_next_sweep(3600), 3600);
        assert_eq!(cfg.sleep_until_next_sweep(3601), 3599);
        assert_eq!(cfg.sleep_until_next_sweep(7199), 1);
    }
}
