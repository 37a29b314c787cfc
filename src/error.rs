use thiserror::Error;

/// Failure reported by a [`LedgerGateway`](crate::domain::ports::LedgerGateway).
#[derive(Error, Debug, Clone, PartialEq)]
pub enum LedgerError {
    /// The wallet owner declined to sign (EIP-1193 code 4001).
    #[error("Transaction rejected by user.")]
    UserRejected,
    #[error("RPC error {code}: {message}")]
    Rpc { code: i64, message: String },
    #[error("Ledger transport error: {0}")]
    Transport(String),
    #[error("Malformed ledger response: {0}")]
    Decode(String),
    #[error("Transaction {0} reverted")]
    Reverted(String),
}

/// Failure reported by a [`PaymentBackend`](crate::domain::ports::PaymentBackend).
#[derive(Error, Debug, Clone, PartialEq)]
pub enum BackendError {
    #[error("Backend returned {status}: {message}")]
    Status { status: u16, message: String },
    #[error("Backend rejected the request: {0}")]
    Rejected(String),
    #[error("Backend unreachable: {0}")]
    Transport(String),
    #[error("Malformed backend response: {0}")]
    Decode(String),
}

impl BackendError {
    /// The human-readable part of the error, without the status prefix.
    pub fn message(&self) -> &str {
        match self {
            BackendError::Status { message, .. } => message,
            BackendError::Rejected(message)
            | BackendError::Transport(message)
            | BackendError::Decode(message) => message,
        }
    }
}

impl From<reqwest::Error> for BackendError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            BackendError::Decode(err.to_string())
        } else {
            BackendError::Transport(err.to_string())
        }
    }
}

/// Failure of the hosted checkout session itself, as opposed to a
/// payment declined inside it.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CheckoutError {
    #[error("Checkout server error: {0}")]
    Server(String),
    #[error("Checkout session closed before a result was posted")]
    Closed,
    #[error("Checkout timed out after {0} seconds")]
    TimedOut(u64),
}

#[derive(Error, Debug)]
pub enum PaymentError {
    #[error("Validation error: {0}")]
    Validation(String),
    #[error("{0}")]
    NoResource(String),
    #[error("A payment is already awaiting a provider response")]
    Busy,
    #[error(transparent)]
    Ledger(#[from] LedgerError),
    #[error(transparent)]
    Backend(#[from] BackendError),
    #[error(transparent)]
    Checkout(#[from] CheckoutError),
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

pub type Result<T> = std::result::Result<T, PaymentError>;
