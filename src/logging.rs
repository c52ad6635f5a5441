//! Structured JSON-line logging.
//!
//! One line per event on stdout (optionally mirrored to LOG_FILE), with a
//! level, a domain tag for filtering, a monotonic sequence number and a
//! free-form data object. The `audit` domain is reserved for events that
//! require operator follow-up (wager settlement failures).

use chrono::Utc;
use serde_json::{json, Map, Value};
use std::fs::OpenOptions;
use std::io::{BufWriter, Write};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, OnceLock};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Level {
    Debug = 0,
    Info = 1,
    Warn = 2,
    Error = 3,
}

impl Level {
    pub fn from_env() -> Self {
        match std::env::var("LOG_LEVEL").as_deref() {
            Ok("debug") => Level::Debug,
            Ok("warn") => Level::Warn,
            Ok("error") => Level::Error,
            _ => Level::Info,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Level::Debug => "debug",
            Level::Info => "info",
            Level::Warn => "warn",
            Level::Error => "error",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Domain {
    Ledger, // completions, streak math, achievements
    Shop,   // consumable purchases
    Wager,  // coin-flip rounds
    Sweep,  // daily expiry / reminder batches
    Audit,  // events needing manual reconciliation
    System, // startup, shutdown, config
}

impl Domain {
    pub fn as_str(&self) -> &'static str {
        match self {
            Domain::Ledger => "ledger",
            Domain::Shop => "shop",
            Domain::Wager => "wager",
            Domain::Sweep => "sweep",
            Domain::Audit => "audit",
            Domain::System => "system",
        }
    }

    /// LOG_DOMAINS, when set, is a comma-separated allowlist. Audit events
    /// are never filtered out.
    pub fn is_enabled(&self) -> bool {
        if *self == Domain::Audit {
            return true;
        }
        match std::env::var("LOG_DOMAINS") {
            Ok(list) => list.split(',').any(|d| d.trim() == self.as_str()),
            Err(_) => true,
        }
    }
}

static LOG_SEQ: AtomicU64 = AtomicU64::new(0);
static LOG_FILE: OnceLock<Option<Mutex<BufWriter<std::fs::File>>>> = OnceLock::new();

fn file_writer() -> &'static Option<Mutex<BufWriter<std::fs::File>>> {
    LOG_FILE.get_or_init(|| {
        let path = std::env::var("LOG_FILE").ok()?;
        let file = OpenOptions::new().create(true).append(true).open(path).ok()?;
        Some(Mutex::new(BufWriter::new(file)))
    })
}

pub fn ts_now() -> String {
    Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true)
}

/// Emit a structured log entry.
pub fn log(level: Level, domain: Domain, event: &str, data: Map<String, Value>) {
    if level < Level::from_env() || !domain.is_enabled() {
        return;
    }

    let mut entry = Map::new();
    entry.insert("ts".to_string(), json!(ts_now()));
    entry.insert("seq".to_string(), json!(LOG_SEQ.fetch_add(1, Ordering::SeqCst)));
    entry.insert("lvl".to_string(), json!(level.as_str()));
    entry.insert("domain".to_string(), json!(domain.as_str()));
    entry.insert("event".to_string(), json!(event));
    entry.insert("data".to_string(), Value::Object(data));

    let line = Value::Object(entry).to_string();
    if let Some(w) = file_writer() {
        if let Ok(mut w) = w.lock() {
            let _ = writeln!(w, "{}", line);
            let _ = w.flush();
        }
    }
    println!("{}", line);
}

/// Info-level shorthand used by the binaries.
pub fn json_log(domain: Domain, event: &str, data: Map<String, Value>) {
    log(Level::Info, domain, event, data);
}

pub fn obj(pairs: &[(&str, Value)]) -> Map<String, Value> {
    let mut m = Map::new();
    for (k, v) in pairs {
        m.insert((*k).to_string(), v.clone());
    }
    m
}

pub fn v_str(s: &str) -> Value {
    Value::String(s.to_string())
}

pub fn v_int(n: i64) -> Value {
    json!(n)
}

pub fn v_bool(b: bool) -> Value {
    Value::Bool(b)
}
