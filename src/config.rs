use std::env;
use std::time::Duration;

use alloy_primitives::Address;
use anyhow::Context;
use reqwest::Url;

pub const DEFAULT_WALLET_RPC_URL: &str = "http://127.0.0.1:1248";
pub const DEFAULT_CONTRACT_ADDRESS: &str = "0x99CF4c4CAE3bA61754Abd22A8de7e8c7ba3C196d";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// `None` when no wallet is installed.
    pub wallet_rpc_url: Option<Url>,
    pub contract_address: Address,
    pub account_poll_interval: Duration,
    pub receipt_poll_interval: Duration,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let wallet_rpc_url = lookup("VAULT_WALLET_RPC_URL")
            .unwrap_or_else(|| DEFAULT_WALLET_RPC_URL.to_string());
        let wallet_rpc_url = match wallet_rpc_url.trim() {
            "" => None,
            url => Some(
                Url::parse(url).with_context(|| format!("invalid VAULT_WALLET_RPC_URL {url:?}"))?,
            ),
        };

        let contract_address = lookup("VAULT_CONTRACT_ADDRESS")
            .unwrap_or_else(|| DEFAULT_CONTRACT_ADDRESS.to_string());
        let contract_address: Address = contract_address
            .trim()
            .parse()
            .with_context(|| format!("invalid VAULT_CONTRACT_ADDRESS {contract_address:?}"))?;

        Ok(Config {
            wallet_rpc_url,
            contract_address,
            account_poll_interval: millis(&lookup, "VAULT_ACCOUNT_POLL_MS", 1000)?,
            receipt_poll_interval: millis(&lookup, "VAULT_RECEIPT_POLL_MS", 2000)?,
        })
    }
}

fn millis(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
    default: u64,
) -> anyhow::Result<Duration> {
    let ms = match lookup(key) {
        Some(value) => value
            .trim()
            .parse::<u64>()
            .with_context(|| format!("{key} must be a whole number of milliseconds"))?,
        None => default,
    };
    anyhow::ensure!(ms > 0, "{key} must be greater than zero");
    Ok(Duration::from_millis(ms))
}
