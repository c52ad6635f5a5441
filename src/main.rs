use anyhow::Result;
use tokio::time::{sleep, Duration};

use smallstep::catalog::Catalog;
use smallstep::clock::{now_ts, Clock};
use smallstep::config::Config;
use smallstep::engine::Engine;
use smallstep::logging::{json_log, obj, v_int, v_str, Domain};
use smallstep::store::LedgerStore;

/// Sweep daemon: once per sweep boundary, reset the streaks that did not
/// survive the day. The chat dispatcher runs as a separate process and talks
/// to the same database through the library API.
#[tokio::main]
async fn main() -> Result<()> {
    let cfg = Config::from_env();
    let clock = Clock::fixed(cfg.tz_offset_hours);
    let catalog = Catalog::load(&cfg)?;
    let mut store = LedgerStore::open(&cfg.sqlite_path)?;
    store.init()?;

    json_log(
        Domain::System,
        "daemon.started",
        obj(&[
            ("sqlite_path", v_str(&cfg.sqlite_path)),
            ("sweep_secs", v_int(cfg.sweep_secs as i64)),
            ("users", v_int(store.all_users()?.len() as i64)),
            ("categories", v_int(catalog.categories.len() as i64)),
            ("achievements", v_int(catalog.achievements.len() as i64)),
        ]),
    );

    let engine = Engine::new(cfg, catalog);
    loop {
        let today = clock.today();
        match engine.expire_streaks(&mut store, today) {
            Ok(reset) => {
                json_log(
                    Domain::Sweep,
                    "sweep.done",
                    obj(&[("date", v_str(&today.to_string())), ("reset", v_int(reset as i64))]),
                );
            }
            Err(e) => {
                json_log(Domain::Sweep, "sweep.failed", obj(&[("error", v_str(&e.to_string()))]));
            }
        }
        let pause = engine.cfg.sleep_until_next_sweep(now_ts());
        sleep(Duration::from_secs(pause)).await;
    }
}
