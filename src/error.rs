use thiserror::Error;

/// Domain errors crossing the core/transport boundary. The transport layer
/// owns the user-facing phrasing; these carry the machine-readable kind plus
/// whatever numbers the caller needs to render a message.
#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("user {0} not found")]
    UserNotFound(i64),

    #[error("challenge already completed today")]
    AlreadyCompletedToday,

    #[error("insufficient funds: need {needed}, have {balance}")]
    InsufficientFunds { needed: i64, balance: i64 },

    #[error("invalid bet amount: {0}")]
    InvalidBetAmount(i64),

    #[error("coin flip already played today")]
    AlreadyPlayedToday,

    #[error("unknown category: {0}")]
    UnknownCategory(String),

    #[error("persistence failure: {0}")]
    Persistence(#[from] rusqlite::Error),
}

impl LedgerError {
    /// Stable identifier for logs and transport-side dispatch.
    pub fn kind(&self) -> &'static str {
        match self {
            LedgerError::UserNotFound(_) => "user_not_found",
            LedgerError::AlreadyCompletedToday => "already_completed_today",
            LedgerError::InsufficientFunds { .. } => "insufficient_funds",
            LedgerError::InvalidBetAmount(_) => "invalid_bet_amount",
            LedgerError::AlreadyPlayedToday => "already_played_today",
            LedgerError::UnknownCategory(_) => "unknown_category",
            LedgerError::Persistence(_) => "persistence_failure",
        }
    }
}
