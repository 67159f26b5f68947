//! Scripted in-memory wallet used by the controller tests.

use std::collections::{HashMap, VecDeque};

use alloy_primitives::{Bytes, B256, U256, U64};
use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::{broadcast, oneshot};

use crate::error::{Result, WalletError};
use crate::wallet::{CallRequest, TransactionReceipt, WalletProvider};

/// Lets spawned tasks on the current-thread test runtime run to their next
/// suspension point.
pub async fn settle() {
    for _ in 0..16 {
        tokio::task::yield_now().await;
    }
}

pub struct MockWallet {
    authorized: Mutex<Vec<String>>,
    fail_accounts: Mutex<bool>,
    grant: Mutex<Option<Vec<String>>>,
    request_gates: Mutex<VecDeque<oneshot::Receiver<Result<Vec<String>>>>>,
    balances: Mutex<HashMap<String, U256>>,
    fail_balance: Mutex<bool>,
    balance_gates: Mutex<VecDeque<oneshot::Receiver<Result<U256>>>>,
    balance_calls: Mutex<Vec<String>>,
    vault_balance: Mutex<U256>,
    sent: Mutex<Vec<CallRequest>>,
    send_error: Mutex<Option<WalletError>>,
    receipt_gates: Mutex<VecDeque<oneshot::Receiver<Result<TransactionReceipt>>>>,
    revert: Mutex<bool>,
    changes: broadcast::Sender<Vec<String>>,
}

impl MockWallet {
    pub fn new() -> Self {
        let (changes, _) = broadcast::channel(16);
        Self {
            authorized: Mutex::new(Vec::new()),
            fail_accounts: Mutex::new(false),
            grant: Mutex::new(None),
            request_gates: Mutex::new(VecDeque::new()),
            balances: Mutex::new(HashMap::new()),
            fail_balance: Mutex::new(false),
            balance_gates: Mutex::new(VecDeque::new()),
            balance_calls: Mutex::new(Vec::new()),
            vault_balance: Mutex::new(U256::ZERO),
            sent: Mutex::new(Vec::new()),
            send_error: Mutex::new(None),
            receipt_gates: Mutex::new(VecDeque::new()),
            revert: Mutex::new(false),
            changes,
        }
    }

    pub fn with_authorized(accounts: &[&str]) -> Self {
        let wallet = Self::new();
        wallet.set_authorized(accounts);
        wallet
    }

    pub fn set_authorized(&self, accounts: &[&str]) {
        *self.authorized.lock() = to_owned(accounts);
    }

    pub fn fail_accounts(&self) {
        *self.fail_accounts.lock() = true;
    }

    /// The next `eth_requestAccounts` authorizes these accounts. Without a
    /// grant the request is rejected by the user.
    pub fn grant_on_request(&self, accounts: &[&str]) {
        *self.grant.lock() = Some(to_owned(accounts));
    }

    /// Holds the next `eth_requestAccounts` until the returned sender fires.
    pub fn gate_request_accounts(&self) -> oneshot::Sender<Result<Vec<String>>> {
        let (tx, rx) = oneshot::channel();
        self.request_gates.lock().push_back(rx);
        tx
    }

    pub fn set_balance(&self, address: &str, wei: u64) {
        self.balances.lock().insert(address.to_string(), U256::from(wei));
    }

    pub fn fail_balance(&self, fail: bool) {
        *self.fail_balance.lock() = fail;
    }

    /// Holds the next balance query until the returned sender fires.
    pub fn gate_balance(&self) -> oneshot::Sender<Result<U256>> {
        let (tx, rx) = oneshot::channel();
        self.balance_gates.lock().push_back(rx);
        tx
    }

    pub fn balance_calls(&self) -> Vec<String> {
        self.balance_calls.lock().clone()
    }

    pub fn set_vault_balance(&self, wei: u64) {
        *self.vault_balance.lock() = U256::from(wei);
    }

    pub fn sent(&self) -> Vec<CallRequest> {
        self.sent.lock().clone()
    }

    pub fn fail_send(&self, err: WalletError) {
        *self.send_error.lock() = Some(err);
    }

    pub fn revert_transactions(&self) {
        *self.revert.lock() = true;
    }

    /// Holds the next confirmation until the returned sender fires.
    pub fn gate_confirmation(&self) -> oneshot::Sender<Result<TransactionReceipt>> {
        let (tx, rx) = oneshot::channel();
        self.receipt_gates.lock().push_back(rx);
        tx
    }

    pub fn emit_accounts(&self, accounts: &[&str]) {
        let _ = self.changes.send(to_owned(accounts));
    }

    pub fn account_listeners(&self) -> usize {
        self.changes.receiver_count()
    }
}

pub fn mined_receipt(hash: B256) -> TransactionReceipt {
    TransactionReceipt {
        transaction_hash: hash,
        block_number: Some(U64::from(1)),
        status: Some(U64::from(1)),
    }
}

fn to_owned(accounts: &[&str]) -> Vec<String> {
    accounts.iter().map(|a| a.to_string()).collect()
}

fn gate_closed(_: oneshot::error::RecvError) -> WalletError {
    WalletError::Transport("gate dropped".into())
}

#[async_trait]
impl WalletProvider for MockWallet {
    async fn accounts(&self) -> Result<Vec<String>> {
        if *self.fail_accounts.lock() {
            return Err(WalletError::Transport("wallet unreachable".into()));
        }
        Ok(self.authorized.lock().clone())
    }

    async fn request_accounts(&self) -> Result<Vec<String>> {
        let gate = self.request_gates.lock().pop_front();
        if let Some(gate) = gate {
            let accounts = gate.await.map_err(gate_closed)??;
            *self.authorized.lock() = accounts.clone();
            return Ok(accounts);
        }
        let granted = self.grant.lock().take();
        match granted {
            Some(accounts) => {
                *self.authorized.lock() = accounts.clone();
                Ok(accounts)
            }
            None => Err(WalletError::Rpc {
                code: crate::error::USER_REJECTED_REQUEST,
                message: "User rejected the request.".into(),
            }),
        }
    }

    async fn balance(&self, address: &str) -> Result<U256> {
        self.balance_calls.lock().push(address.to_string());
        let gate = self.balance_gates.lock().pop_front();
        if let Some(gate) = gate {
            return gate.await.map_err(gate_closed)?;
        }
        if *self.fail_balance.lock() {
            return Err(WalletError::Transport("balance unavailable".into()));
        }
        Ok(self.balances.lock().get(address).copied().unwrap_or_default())
    }

    async fn send_transaction(&self, tx: CallRequest) -> Result<B256> {
        if let Some(err) = self.send_error.lock().clone() {
            return Err(err);
        }
        let mut sent = self.sent.lock();
        sent.push(tx);
        Ok(B256::with_last_byte(sent.len() as u8))
    }

    async fn call(&self, _call: CallRequest) -> Result<Bytes> {
        let balance = *self.vault_balance.lock();
        Ok(Bytes::from(balance.to_be_bytes::<32>().to_vec()))
    }

    async fn wait_for_confirmation(&self, hash: B256) -> Result<TransactionReceipt> {
        let gate = self.receipt_gates.lock().pop_front();
        if let Some(gate) = gate {
            return gate.await.map_err(gate_closed)?;
        }
        let mut receipt = mined_receipt(hash);
        if *self.revert.lock() {
            receipt.status = Some(U64::ZERO);
        }
        Ok(receipt)
    }

    fn account_changes(&self) -> broadcast::Receiver<Vec<String>> {
        self.changes.subscribe()
    }
}
