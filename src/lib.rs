//! Habit/reward ledger core for the "smallstep" daily-challenge bot.
//!
//! The chat transport, keyboards and message templating live elsewhere; this
//! crate owns the per-user ledger (streak, coins, consumables, achievements),
//! the completion/reward rules, the consumable store and the coin-flip wager
//! state machine. Every operation takes a user id plus primitives and returns
//! a structured result record for the caller to render.

pub mod achievements;
pub mod catalog;
pub mod clock;
pub mod config;
pub mod engine;
pub mod error;
pub mod ledger;
pub mod logging;
pub mod shop;
pub mod store;
pub mod wager;

pub use config::Config;
pub use engine::Engine;
pub use error::LedgerError;
pub use store::LedgerStore;
