use alloy_primitives::B256;
use thiserror::Error;

use crate::transaction::TransactionKind;

/// EIP-1193 error code for a request the user declined in the wallet.
pub const USER_REJECTED_REQUEST: i64 = 4001;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum WalletError {
    #[error("no wallet provider available")]
    NoProvider,

    #[error("wallet connection rejected: {0}")]
    ConnectionRejected(String),

    #[error("invalid amount {input:?}: {reason}")]
    InvalidAmount { input: String, reason: String },

    #[error("no signer available, wallet is not connected")]
    NoSigner,

    #[error("a {0} is already in flight for this account")]
    TransactionInFlight(TransactionKind),

    #[error("{kind} submission failed: {reason}")]
    TransactionSubmission { kind: TransactionKind, reason: String },

    #[error("{kind} confirmation failed: {reason}")]
    TransactionConfirmation { kind: TransactionKind, reason: String },

    #[error("balance fetch failed: {0}")]
    BalanceFetch(String),

    #[error("transaction {0} reverted")]
    Reverted(B256),

    #[error("provider error {code}: {message}")]
    Rpc { code: i64, message: String },

    #[error("transport error: {0}")]
    Transport(String),
}

pub type Result<T, E = WalletError> = std::result::Result<T, E>;

impl WalletError {
    pub fn invalid_amount(input: &str, reason: impl Into<String>) -> Self {
        WalletError::InvalidAmount {
            input: input.to_string(),
            reason: reason.into(),
        }
    }

    /// Whether the wallet reported that the user declined the request.
    pub fn is_user_rejection(&self) -> bool {
        matches!(self, WalletError::Rpc { code, .. } if *code == USER_REJECTED_REQUEST)
    }

    /// The text shown in the single error slot of the presentation layer.
    pub fn user_message(&self) -> String {
        match self {
            WalletError::NoProvider => {
                "No wallet detected. Install a wallet to continue.".to_string()
            }
            WalletError::ConnectionRejected(_) => {
                "Failed to connect wallet. Please try again.".to_string()
            }
            WalletError::InvalidAmount { .. } => {
                "Enter a valid amount greater than zero.".to_string()
            }
            WalletError::NoSigner => "Connect your wallet first.".to_string(),
            WalletError::TransactionInFlight(kind) => {
                format!("A {kind} is already pending. Wait for it to settle.")
            }
            WalletError::TransactionSubmission { kind, .. }
            | WalletError::TransactionConfirmation { kind, .. } => {
                kind.failure_message().to_string()
            }
            WalletError::BalanceFetch(_) => "Could not refresh balance.".to_string(),
            WalletError::Reverted(_) | WalletError::Rpc { .. } | WalletError::Transport(_) => {
                "Wallet request failed. Please try again.".to_string()
            }
        }
    }
}

impl From<reqwest::Error> for WalletError {
    fn from(err: reqwest::Error) -> Self {
        WalletError::Transport(err.to_string())
    }
}

impl From<serde_json::Error> for WalletError {
    fn from(err: serde_json::Error) -> Self {
        WalletError::Transport(format!("malformed response: {err}"))
    }
}
