//! Adapter over the injected wallet provider.

use std::sync::Arc;

use alloy_primitives::{Address, Bytes, B256, U256, U64};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::task::JoinHandle;

use crate::error::{Result, WalletError};

/// A call or transaction against a contract, as sent over EIP-1193.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CallRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub from: Option<String>,
    pub to: Address,
    pub data: Bytes,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<U256>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionReceipt {
    pub transaction_hash: B256,
    #[serde(default)]
    pub block_number: Option<U64>,
    #[serde(default)]
    pub status: Option<U64>,
}

impl TransactionReceipt {
    /// Pre-byzantium receipts carry no status and are treated as successful.
    pub fn succeeded(&self) -> bool {
        self.status.map_or(true, |status| status == U64::from(1))
    }
}

/// The wallet as seen by this client.
#[async_trait]
pub trait WalletProvider: Send + Sync {
    /// Accounts already authorized for this client; never prompts.
    async fn accounts(&self) -> Result<Vec<String>>;

    /// Asks the user to authorize this client. May wait indefinitely.
    async fn request_accounts(&self) -> Result<Vec<String>>;

    async fn balance(&self, address: &str) -> Result<U256>;

    /// Hands the transaction to the wallet for signing and broadcast.
    async fn send_transaction(&self, tx: CallRequest) -> Result<B256>;

    async fn call(&self, call: CallRequest) -> Result<Bytes>;

    /// Resolves once the transaction is mined. The chain is the only timeout.
    async fn wait_for_confirmation(&self, hash: B256) -> Result<TransactionReceipt>;

    /// Stream of authorized account lists; an empty list means disconnected.
    fn account_changes(&self) -> broadcast::Receiver<Vec<String>>;
}

/// Receives `accountsChanged` notifications.
#[async_trait]
pub trait AccountsListener: Send + Sync {
    async fn accounts_changed(&self, accounts: Vec<String>);
}

/// Provider handle authorized to sign for one account.
#[derive(Clone)]
pub struct Signer {
    address: String,
    provider: Arc<dyn WalletProvider>,
}

impl Signer {
    pub fn address(&self) -> &str {
        &self.address
    }

    pub fn provider(&self) -> &Arc<dyn WalletProvider> {
        &self.provider
    }
}

impl std::fmt::Debug for Signer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Signer").field("address", &self.address).finish()
    }
}

/// Live registration of an [`AccountsListener`]. Released by
/// [`ProviderGateway::unsubscribe`] or on drop, whichever comes first.
#[derive(Debug)]
pub struct AccountSubscription {
    task: Option<JoinHandle<()>>,
}

impl AccountSubscription {
    /// Returns `true` only for the call that actually released the listener.
    fn release(&mut self) -> bool {
        match self.task.take() {
            Some(task) => {
                task.abort();
                true
            }
            None => false,
        }
    }
}

impl Drop for AccountSubscription {
    fn drop(&mut self) {
        if self.release() {
            tracing::debug!("account change subscription released on drop");
        }
    }
}

#[derive(Clone, Default)]
pub struct ProviderGateway {
    provider: Option<Arc<dyn WalletProvider>>,
}

impl ProviderGateway {
    pub fn new(provider: Arc<dyn WalletProvider>) -> Self {
        Self {
            provider: Some(provider),
        }
    }

    /// Gateway for a session with no wallet installed.
    pub fn absent() -> Self {
        Self { provider: None }
    }

    pub fn provider(&self) -> Result<&Arc<dyn WalletProvider>> {
        self.provider.as_ref().ok_or(WalletError::NoProvider)
    }

    pub async fn get_authorized_accounts(&self) -> Result<Vec<String>> {
        self.provider()?.accounts().await
    }

    pub async fn request_accounts(&self) -> Result<Vec<String>> {
        self.provider()?.request_accounts().await
    }

    pub async fn get_balance(&self, address: &str) -> Result<U256> {
        self.provider()?.balance(address).await
    }

    pub fn get_signer(&self, address: &str) -> Result<Signer> {
        Ok(Signer {
            address: address.to_string(),
            provider: self.provider()?.clone(),
        })
    }

    /// Must be called from within a Tokio runtime.
    pub fn subscribe_account_changes(
        &self,
        listener: Arc<dyn AccountsListener>,
    ) -> Result<AccountSubscription> {
        let mut changes = self.provider()?.account_changes();
        let task = tokio::spawn(async move {
            loop {
                match changes.recv().await {
                    Ok(accounts) => listener.accounts_changed(accounts).await,
                    Err(RecvError::Lagged(skipped)) => {
                        tracing::warn!(skipped, "account change notifications dropped");
                    }
                    Err(RecvError::Closed) => break,
                }
            }
            tracing::debug!("account change stream closed");
        });
        Ok(AccountSubscription { task: Some(task) })
    }

    pub fn unsubscribe(&self, mut subscription: AccountSubscription) -> bool {
        let released = subscription.release();
        if released {
            tracing::debug!("account change subscription released");
        }
        released
    }
}
