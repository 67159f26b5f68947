//! Bindings for the vault contract.

use std::sync::Arc;

use alloy_primitives::{Address, Bytes, B256, U256};
use alloy_sol_types::{sol, SolCall};

use crate::error::{Result, WalletError};
use crate::transaction::{TransactionKind, TransactionRequest};
use crate::wallet::{CallRequest, Signer, TransactionReceipt, WalletProvider};

sol! {
    function deposit(uint256 amount) external payable;
    function withdraw(uint256 amount) external;
    function getBalance() external view returns (uint256);
}

/// Fixed contract address plus interface, not yet bound to a provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContractGateway {
    address: Address,
}

impl ContractGateway {
    pub fn new(address: Address) -> Self {
        Self { address }
    }

    pub fn bind_read_only(&self, provider: Arc<dyn WalletProvider>) -> ReadOnlyVault {
        ReadOnlyVault {
            address: self.address,
            provider,
        }
    }

    pub fn bind_writable(&self, signer: Signer) -> WritableVault {
        WritableVault {
            address: self.address,
            signer,
        }
    }
}

pub struct ReadOnlyVault {
    address: Address,
    provider: Arc<dyn WalletProvider>,
}

impl ReadOnlyVault {
    /// Native currency held by the contract.
    pub async fn balance(&self) -> Result<U256> {
        let call = CallRequest {
            from: None,
            to: self.address,
            data: getBalanceCall {}.abi_encode().into(),
            value: None,
        };
        let output = self.provider.call(call).await?;
        getBalanceCall::abi_decode_returns(&output)
            .map_err(|e| WalletError::Transport(format!("undecodable getBalance output: {e}")))
    }
}

#[derive(Debug)]
pub struct WritableVault {
    address: Address,
    signer: Signer,
}

impl WritableVault {
    /// The amount is both the call argument and the attached value; the
    /// contract expects them to match.
    pub async fn deposit(&self, amount: U256) -> Result<PendingTransaction> {
        let data = depositCall { amount }.abi_encode();
        self.send(data.into(), Some(amount)).await
    }

    pub async fn withdraw(&self, amount: U256) -> Result<PendingTransaction> {
        let data = withdrawCall { amount }.abi_encode();
        self.send(data.into(), None).await
    }

    pub async fn submit(&self, request: &TransactionRequest) -> Result<PendingTransaction> {
        match request.kind {
            TransactionKind::Deposit => self.deposit(request.amount).await,
            TransactionKind::Withdraw => self.withdraw(request.amount).await,
        }
    }

    async fn send(&self, data: Bytes, value: Option<U256>) -> Result<PendingTransaction> {
        let tx = CallRequest {
            from: Some(self.signer.address().to_string()),
            to: self.address,
            data,
            value,
        };
        let hash = self.signer.provider().send_transaction(tx).await?;
        tracing::info!(%hash, "transaction submitted");
        Ok(PendingTransaction {
            hash,
            provider: self.signer.provider().clone(),
        })
    }
}

/// A submitted transaction that has not settled yet.
pub struct PendingTransaction {
    hash: B256,
    provider: Arc<dyn WalletProvider>,
}

impl PendingTransaction {
    pub fn hash(&self) -> B256 {
        self.hash
    }

    /// Waits for the transaction to be mined; a reverted receipt is an error.
    pub async fn confirmed(self) -> Result<TransactionReceipt> {
        let receipt = self.provider.wait_for_confirmation(self.hash).await?;
        if !receipt.succeeded() {
            return Err(WalletError::Reverted(self.hash));
        }
        Ok(receipt)
    }
}

impl std::fmt::Debug for PendingTransaction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PendingTransaction").field("hash", &self.hash).finish()
    }
}
