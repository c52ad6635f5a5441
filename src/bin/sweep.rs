//! One-shot streak-expiry sweep, for running from cron instead of the
//! long-lived daemon.

use anyhow::Result;

use smallstep::catalog::Catalog;
use smallstep::clock::Clock;
use smallstep::config::Config;
use smallstep::engine::Engine;
use smallstep::logging::{json_log, obj, v_int, v_str, Domain};
use smallstep::store::LedgerStore;

fn main() -> Result<()> {
    let cfg = Config::from_env();
    let clock = Clock::fixed(cfg.tz_offset_hours);
    let catalog = Catalog::load(&cfg)?;
    let mut store = LedgerStore::open(&cfg.sqlite_path)?;
    store.init()?;

    let engine = Engine::new(cfg, catalog);
    let today = clock.today();
    let reset = engine.expire_streaks(&mut store, today)?;
    json_log(
        Domain::Sweep,
        "sweep.done",
        obj(&[("date", v_str(&today.to_string())), ("reset", v_int(reset as i64))]),
    );
    Ok(())
}
