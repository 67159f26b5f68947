//! One page session: the controllers wired together and the surface the
//! window talks to.

use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::watch;

use crate::api::HttpWallet;
use crate::balance::BalanceSync;
use crate::config::Config;
use crate::connection::{ConnectionController, WalletConnection};
use crate::contract::ContractGateway;
use crate::state::{ErrorState, Revision};
use crate::transaction::{TransactionController, TransactionKind, TransactionOutcome};
use crate::utils::display_native;
use crate::wallet::{AccountSubscription, ProviderGateway};

/// Everything the window renders.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SessionView {
    pub connection: WalletConnection,
    pub balance: Option<String>,
    pub vault_balance: Option<String>,
    pub error: Option<String>,
    pub deposit_pending: bool,
    pub withdraw_pending: bool,
}

pub struct WalletSession {
    connection: Arc<ConnectionController>,
    balance: Arc<BalanceSync>,
    transactions: TransactionController,
    errors: ErrorState,
    revision: Revision,
    subscription: Mutex<Option<AccountSubscription>>,
}

impl WalletSession {
    pub fn new(gateway: ProviderGateway, contract: ContractGateway) -> Self {
        let revision = Revision::new();
        let errors = ErrorState::new(revision.clone());
        let balance = Arc::new(BalanceSync::new(gateway.clone(), contract, revision.clone()));
        let connection = Arc::new(ConnectionController::new(
            gateway,
            balance.clone(),
            errors.clone(),
            revision.clone(),
        ));
        let transactions = TransactionController::new(
            connection.clone(),
            balance.clone(),
            contract,
            errors.clone(),
            revision.clone(),
        );
        Self {
            connection,
            balance,
            transactions,
            errors,
            revision,
            subscription: Mutex::new(None),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        let gateway = match &config.wallet_rpc_url {
            Some(url) => {
                tracing::info!(%url, "using wallet provider");
                ProviderGateway::new(Arc::new(HttpWallet::new(
                    url.clone(),
                    config.account_poll_interval,
                    config.receipt_poll_interval,
                )))
            }
            None => {
                tracing::warn!("no wallet provider configured");
                ProviderGateway::absent()
            }
        };
        Self::new(gateway, ContractGateway::new(config.contract_address))
    }

    /// Registers for account changes, then probes for an existing
    /// authorization. Must be called from within a Tokio runtime.
    pub async fn start(&self) {
        match self.connection.subscribe() {
            Ok(subscription) => {
                let previous = self.subscription.lock().replace(subscription);
                if let Some(previous) = previous {
                    self.connection.unsubscribe(previous);
                }
            }
            Err(err) => tracing::info!(error = %err, "not watching account changes"),
        }
        self.connection.initialize().await;
    }

    pub async fn connect(&self) {
        self.connection.connect().await;
    }

    pub async fn deposit(&self, amount_text: &str) -> TransactionOutcome {
        self.transactions.deposit(amount_text).await
    }

    pub async fn withdraw(&self, amount_text: &str) -> TransactionOutcome {
        self.transactions.withdraw(amount_text).await
    }

    pub fn view(&self) -> SessionView {
        SessionView {
            connection: self.connection.connection(),
            balance: self.balance.current().map(|b| b.amount_native()),
            vault_balance: self.balance.vault().map(display_native),
            error: self.errors.current(),
            deposit_pending: self.transactions.is_in_flight(TransactionKind::Deposit),
            withdraw_pending: self.transactions.is_in_flight(TransactionKind::Withdraw),
        }
    }

    /// Ticks whenever anything in [`SessionView`] may have changed.
    pub fn changes(&self) -> watch::Receiver<u64> {
        self.revision.watch()
    }

    /// Releases the account subscription. Returns `false` if it was already
    /// released or never taken.
    pub fn shutdown(&self) -> bool {
        let subscription = self.subscription.lock().take();
        match subscription {
            Some(subscription) => {
                let released = self.connection.unsubscribe(subscription);
                tracing::info!("wallet session shut down");
                released
            }
            None => false,
        }
    }
}
