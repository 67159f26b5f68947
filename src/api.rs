//! JSON-RPC over HTTP to a wallet that exposes the EIP-1193 methods.

use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use alloy_primitives::{Bytes, B256, U256};
use async_trait::async_trait;
use parking_lot::Mutex;
use reqwest::Url;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::{interval, sleep, MissedTickBehavior};

use crate::error::{Result, WalletError};
use crate::wallet::{CallRequest, TransactionReceipt, WalletProvider};

#[derive(Serialize)]
struct RpcRequest<'a, P> {
    jsonrpc: &'static str,
    id: u64,
    method: &'a str,
    params: P,
}

#[derive(Deserialize)]
struct RpcResponse {
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<RpcErrorObject>,
}

#[derive(Deserialize)]
struct RpcErrorObject {
    code: i64,
    message: String,
}

fn decode_response<R: DeserializeOwned>(response: RpcResponse) -> Result<R> {
    if let Some(error) = response.error {
        return Err(WalletError::Rpc {
            code: error.code,
            message: error.message,
        });
    }
    Ok(serde_json::from_value(response.result.unwrap_or(Value::Null))?)
}

#[derive(Debug)]
pub struct RpcClient {
    http: reqwest::Client,
    url: Url,
    next_id: AtomicU64,
}

impl RpcClient {
    pub fn new(url: Url) -> Self {
        Self {
            http: reqwest::Client::new(),
            url,
            next_id: AtomicU64::new(1),
        }
    }

    pub async fn request<P, R>(&self, method: &str, params: P) -> Result<R>
    where
        P: Serialize,
        R: DeserializeOwned,
    {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let body = RpcRequest {
            jsonrpc: "2.0",
            id,
            method,
            params,
        };

        let response = self.http.post(self.url.clone()).json(&body).send().await?;
        if !response.status().is_success() {
            return Err(WalletError::Transport(format!(
                "{method} returned HTTP {}",
                response.status()
            )));
        }

        let response: RpcResponse = response.json().await?;
        decode_response(response)
    }
}

/// Wallet reached over HTTP. `accountsChanged` is emulated by polling
/// `eth_accounts` while anyone is listening.
#[derive(Debug)]
pub struct HttpWallet {
    rpc: Arc<RpcClient>,
    account_poll_interval: Duration,
    receipt_poll_interval: Duration,
    changes: broadcast::Sender<Vec<String>>,
    watcher: Mutex<Option<JoinHandle<()>>>,
}

impl HttpWallet {
    pub fn new(url: Url, account_poll_interval: Duration, receipt_poll_interval: Duration) -> Self {
        let (changes, _) = broadcast::channel(16);
        Self {
            rpc: Arc::new(RpcClient::new(url)),
            account_poll_interval,
            receipt_poll_interval,
            changes,
            watcher: Mutex::new(None),
        }
    }
}

/// Records `accounts` as the latest poll result. Returns the list to emit,
/// which is `None` for the first observation and for unchanged lists.
fn observe_accounts(
    last: &mut Option<Vec<String>>,
    accounts: Vec<String>,
) -> Option<Vec<String>> {
    if last.as_ref() == Some(&accounts) {
        return None;
    }
    let baseline = last.is_none();
    *last = Some(accounts.clone());
    (!baseline).then_some(accounts)
}

/// Calls `fetch` until it yields a value, sleeping `period` between attempts.
async fn poll_until_some<T, F, Fut>(mut fetch: F, period: Duration) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<Option<T>>>,
{
    loop {
        if let Some(value) = fetch().await? {
            return Ok(value);
        }
        sleep(period).await;
    }
}

async fn watch_accounts(
    rpc: Arc<RpcClient>,
    changes: broadcast::Sender<Vec<String>>,
    period: Duration,
) {
    let mut ticker = interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut last: Option<Vec<String>> = None;

    loop {
        ticker.tick().await;
        if changes.receiver_count() == 0 {
            break;
        }
        match rpc.request::<_, Vec<String>>("eth_accounts", json!([])).await {
            Ok(accounts) => {
                if let Some(accounts) = observe_accounts(&mut last, accounts) {
                    tracing::debug!(?accounts, "wallet accounts changed");
                    let _ = changes.send(accounts);
                }
            }
            Err(err) => tracing::debug!(error = %err, "account poll failed"),
        }
    }
    tracing::debug!("account watcher stopped, no listeners left");
}

#[async_trait]
impl WalletProvider for HttpWallet {
    async fn accounts(&self) -> Result<Vec<String>> {
        self.rpc.request("eth_accounts", json!([])).await
    }

    async fn request_accounts(&self) -> Result<Vec<String>> {
        self.rpc.request("eth_requestAccounts", json!([])).await
    }

    async fn balance(&self, address: &str) -> Result<U256> {
        self.rpc
            .request("eth_getBalance", json!([address, "latest"]))
            .await
    }

    async fn send_transaction(&self, tx: CallRequest) -> Result<B256> {
        self.rpc.request("eth_sendTransaction", json!([tx])).await
    }

    async fn call(&self, call: CallRequest) -> Result<Bytes> {
        self.rpc.request("eth_call", json!([call, "latest"])).await
    }

    async fn wait_for_confirmation(&self, hash: B256) -> Result<TransactionReceipt> {
        poll_until_some(
            || self.rpc.request("eth_getTransactionReceipt", json!([hash])),
            self.receipt_poll_interval,
        )
        .await
    }

    fn account_changes(&self) -> broadcast::Receiver<Vec<String>> {
        let receiver = self.changes.subscribe();
        let mut watcher = self.watcher.lock();
        if watcher.as_ref().map_or(true, |task| task.is_finished()) {
            *watcher = Some(tokio::spawn(watch_accounts(
                self.rpc.clone(),
                self.changes.clone(),
                self.account_poll_interval,
            )));
        }
        receiver
    }
}

impl Drop for HttpWallet {
    fn drop(&mut self) {
        if let Some(task) = self.watcher.lock().take() {
            task.abort();
        }
    }
}
