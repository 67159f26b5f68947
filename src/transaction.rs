//! Submit, wait and settle for vault deposits and withdrawals.

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use alloy_primitives::U256;
use parking_lot::Mutex;

use crate::amount::parse_amount;
use crate::balance::BalanceSync;
use crate::connection::ConnectionController;
use crate::contract::ContractGateway;
use crate::error::{Result, WalletError};
use crate::state::{ErrorState, Revision};
use crate::wallet::TransactionReceipt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransactionKind {
    Deposit,
    Withdraw,
}

impl TransactionKind {
    pub fn failure_message(&self) -> &'static str {
        match self {
            TransactionKind::Deposit => "Deposit failed. Please check your balance and try again.",
            TransactionKind::Withdraw => {
                "Withdrawal failed. Please check your balance and try again."
            }
        }
    }

    pub fn success_message(&self) -> &'static str {
        match self {
            TransactionKind::Deposit => "Deposit successful",
            TransactionKind::Withdraw => "Withdrawal successful",
        }
    }
}

impl fmt::Display for TransactionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransactionKind::Deposit => f.write_str("deposit"),
            TransactionKind::Withdraw => f.write_str("withdrawal"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransactionRequest {
    pub kind: TransactionKind,
    pub amount: U256,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionResult {
    Success,
    Failure,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionOutcome {
    pub kind: TransactionKind,
    pub result: TransactionResult,
    pub error_message: Option<String>,
}

impl TransactionOutcome {
    pub fn is_success(&self) -> bool {
        self.result == TransactionResult::Success
    }
}

type InFlightKey = (TransactionKind, String);

/// Marks one (kind, account) pair as in flight until dropped.
struct InFlightGuard<'a> {
    slots: &'a Mutex<HashSet<InFlightKey>>,
    revision: &'a Revision,
    key: InFlightKey,
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.slots.lock().remove(&self.key);
        self.revision.bump();
    }
}

pub struct TransactionController {
    connection: Arc<ConnectionController>,
    balance: Arc<BalanceSync>,
    contract: ContractGateway,
    errors: ErrorState,
    revision: Revision,
    in_flight: Mutex<HashSet<InFlightKey>>,
}

impl TransactionController {
    pub fn new(
        connection: Arc<ConnectionController>,
        balance: Arc<BalanceSync>,
        contract: ContractGateway,
        errors: ErrorState,
        revision: Revision,
    ) -> Self {
        Self {
            connection,
            balance,
            contract,
            errors,
            revision,
            in_flight: Mutex::new(HashSet::new()),
        }
    }

    pub async fn deposit(&self, amount_text: &str) -> TransactionOutcome {
        self.execute(TransactionKind::Deposit, amount_text).await
    }

    pub async fn withdraw(&self, amount_text: &str) -> TransactionOutcome {
        self.execute(TransactionKind::Withdraw, amount_text).await
    }

    /// Whether a transaction of `kind` is pending for any account.
    pub fn is_in_flight(&self, kind: TransactionKind) -> bool {
        self.in_flight.lock().iter().any(|(k, _)| *k == kind)
    }

    async fn execute(&self, kind: TransactionKind, amount_text: &str) -> TransactionOutcome {
        self.errors.clear();
        match self.run(kind, amount_text).await {
            Ok(receipt) => {
                tracing::info!(%kind, hash = %receipt.transaction_hash, "transaction settled");
                TransactionOutcome {
                    kind,
                    result: TransactionResult::Success,
                    error_message: None,
                }
            }
            Err(err) => {
                tracing::warn!(%kind, error = %err, "transaction failed");
                let message = err.user_message();
                self.errors.set(message.clone());
                TransactionOutcome {
                    kind,
                    result: TransactionResult::Failure,
                    error_message: Some(message),
                }
            }
        }
    }

    async fn run(&self, kind: TransactionKind, amount_text: &str) -> Result<TransactionReceipt> {
        let amount = parse_amount(amount_text)?;
        let signer = self.connection.signer()?;
        let request = TransactionRequest { kind, amount };
        let guard = self.claim(kind, signer.address())?;

        let vault = self.contract.bind_writable(signer);
        let pending = vault
            .submit(&request)
            .await
            .map_err(|e| WalletError::TransactionSubmission {
                kind,
                reason: e.to_string(),
            })?;
        let receipt = pending
            .confirmed()
            .await
            .map_err(|e| WalletError::TransactionConfirmation {
                kind,
                reason: e.to_string(),
            })?;
        drop(guard);

        // the account may have changed or disconnected while we waited
        if let Some(address) = self.connection.address() {
            self.balance.refresh(&address).await;
            self.balance.refresh_vault().await;
        }
        Ok(receipt)
    }

    fn claim(&self, kind: TransactionKind, address: &str) -> Result<InFlightGuard<'_>> {
        let key = (kind, address.to_string());
        if !self.in_flight.lock().insert(key.clone()) {
            return Err(WalletError::TransactionInFlight(kind));
        }
        self.revision.bump();
        Ok(InFlightGuard {
            slots: &self.in_flight,
            revision: &self.revision,
            key,
        })
    }
}
