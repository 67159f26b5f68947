//! Wallet connection and vault transaction controllers.
//!
//! A [`session::WalletSession`] connects to an EIP-1193 wallet, tracks the
//! first authorized account, keeps its native balance fresh and drives
//! deposits and withdrawals against the vault contract.

pub mod amount;
pub mod api;
pub mod balance;
pub mod config;
pub mod connection;
pub mod contract;
pub mod error;
pub mod session;
pub mod state;
pub mod transaction;
pub mod utils;
pub mod wallet;

#[cfg(test)]
mod testing;

pub use error::{Result, WalletError};
pub use session::{SessionView, WalletSession};
