//! Application-wide error types.
//!
//! Each collaborator has its own error enum ([`LedgerError`], [`WalletError`]).
//! The adapters translate those into [`DappError`], the taxonomy every caller
//! of the presentation layer sees.

use thiserror::Error;

/// Failures talking to a ledger node (live or fixture).
#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Ledger rejected request ({code}): {message}")]
    Rejected { code: String, message: String },

    #[error("Unexpected ledger response: {0}")]
    Unexpected(String),
}

/// Failures reported by the wallet collaborator.
#[derive(Debug, Error)]
pub enum WalletError {
    #[error("No wallet account connected")]
    NotConnected,

    #[error("User declined the signature request")]
    Declined,

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Wallet bridge error: {0}")]
    Bridge(String),
}

/// Failures that cross the boundary of the view and transaction adapters.
#[derive(Debug, Error)]
pub enum DappError {
    /// Network or decoding failure on a read.
    #[error("Query failed: {0}")]
    QueryFailed(String),

    /// A well-formed query for an entity the ledger does not hold.
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Signature request declined")]
    SignatureDeclined,

    /// The ledger refused the transaction or aborted it during execution.
    #[error("Submission failed: {0}")]
    SubmissionFailed(String),

    #[error("Confirmation of transaction {hash} not observed in time")]
    ConfirmationTimeout { hash: String },

    #[error("Stopped waiting for transaction {hash}")]
    Abandoned { hash: String },

    #[error("No wallet account connected")]
    WalletNotConnected,

    #[error("Wallet unavailable: {0}")]
    WalletUnavailable(String),

    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl From<WalletError> for DappError {
    fn from(err: WalletError) -> Self {
        match err {
            WalletError::NotConnected => DappError::WalletNotConnected,
            WalletError::Declined => DappError::SignatureDeclined,
            other => DappError::WalletUnavailable(other.to_string()),
        }
    }
}

pub type Result<T> = std::result::Result<T, DappError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wallet_errors_map_onto_taxonomy() {
        assert!(matches!(
            DappError::from(WalletError::Declined),
            DappError::SignatureDeclined
        ));
        assert!(matches!(
            DappError::from(WalletError::NotConnected),
            DappError::WalletNotConnected
        ));
        assert!(matches!(
            DappError::from(WalletError::Bridge("offline".into())),
            DappError::WalletUnavailable(msg) if msg.contains("offline")
        ));
    }
}
