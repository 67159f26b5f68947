//! Cached native balances for the connected wallet and the vault contract.

use alloy_primitives::U256;
use parking_lot::Mutex;

use crate::contract::ContractGateway;
use crate::error::WalletError;
use crate::state::Revision;
use crate::utils::display_native;
use crate::wallet::ProviderGateway;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Balance {
    pub address: String,
    pub amount: U256,
}

impl Balance {
    /// Amount in ether as a decimal string.
    pub fn amount_native(&self) -> String {
        display_native(self.amount)
    }
}

#[derive(Debug, Default)]
struct Cache {
    /// Bumped on discard; refreshes issued under an older epoch are dropped.
    epoch: u64,
    wallet: Option<Balance>,
    vault: Option<U256>,
}

pub struct BalanceSync {
    gateway: ProviderGateway,
    contract: ContractGateway,
    cache: Mutex<Cache>,
    revision: Revision,
}

impl BalanceSync {
    pub fn new(gateway: ProviderGateway, contract: ContractGateway, revision: Revision) -> Self {
        Self {
            gateway,
            contract,
            cache: Mutex::new(Cache::default()),
            revision,
        }
    }

    /// Re-reads the balance of `address`. Failures keep the last known value.
    ///
    /// Overlapping refreshes race freely: whichever completes last is kept.
    pub async fn refresh(&self, address: &str) {
        if address.is_empty() {
            tracing::warn!("balance refresh skipped, no address");
            return;
        }

        let epoch = self.cache.lock().epoch;
        let amount = match self.gateway.get_balance(address).await {
            Ok(amount) => amount,
            Err(err) => {
                let err = WalletError::BalanceFetch(err.to_string());
                tracing::warn!(address, error = %err, "keeping last known balance");
                return;
            }
        };

        {
            let mut cache = self.cache.lock();
            if cache.epoch != epoch {
                tracing::debug!(address, "dropping balance for a previous connection");
                return;
            }
            cache.wallet = Some(Balance {
                address: address.to_string(),
                amount,
            });
        }
        tracing::debug!(address, %amount, "wallet balance updated");
        self.revision.bump();
    }

    pub async fn refresh_vault(&self) {
        let provider = match self.gateway.provider() {
            Ok(provider) => provider.clone(),
            Err(_) => return,
        };
        match self.contract.bind_read_only(provider).balance().await {
            Ok(amount) => {
                self.cache.lock().vault = Some(amount);
                self.revision.bump();
            }
            Err(err) => tracing::warn!(error = %err, "keeping last known vault balance"),
        }
    }

    /// Forgets the wallet balance. In-flight refreshes will not repopulate it.
    pub fn discard(&self) {
        let had_balance = {
            let mut cache = self.cache.lock();
            cache.epoch += 1;
            cache.wallet.take().is_some()
        };
        if had_balance {
            self.revision.bump();
        }
    }

    pub fn current(&self) -> Option<Balance> {
        self.cache.lock().wallet.clone()
    }

    pub fn vault(&self) -> Option<U256> {
        self.cache.lock().vault
    }
}
