//! Wallet connection state machine.

use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::balance::BalanceSync;
use crate::error::{Result, WalletError};
use crate::state::{ErrorState, Revision};
use crate::wallet::{AccountSubscription, AccountsListener, ProviderGateway, Signer};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionStatus {
    #[default]
    Disconnected,
    Connecting,
    Connected,
}

/// Connection status plus the canonical account. The address is present
/// exactly when the status is `Connected`.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct WalletConnection {
    status: ConnectionStatus,
    address: Option<String>,
}

impl WalletConnection {
    pub fn disconnected() -> Self {
        Self::default()
    }

    pub fn connecting() -> Self {
        Self {
            status: ConnectionStatus::Connecting,
            address: None,
        }
    }

    pub fn connected(address: impl Into<String>) -> Self {
        Self {
            status: ConnectionStatus::Connected,
            address: Some(address.into()),
        }
    }

    pub fn status(&self) -> ConnectionStatus {
        self.status
    }

    pub fn address(&self) -> Option<&str> {
        self.address.as_deref()
    }

    pub fn is_connected(&self) -> bool {
        self.status == ConnectionStatus::Connected
    }

    /// State after the wallet reports `accounts`. Only the first-listed
    /// account is tracked.
    pub fn apply_accounts(&self, accounts: &[String]) -> Self {
        match accounts.first() {
            Some(first) => Self::connected(first.clone()),
            None => Self::disconnected(),
        }
    }
}

pub struct ConnectionController {
    gateway: ProviderGateway,
    state: Mutex<WalletConnection>,
    balance: Arc<BalanceSync>,
    errors: ErrorState,
    revision: Revision,
}

impl ConnectionController {
    pub fn new(
        gateway: ProviderGateway,
        balance: Arc<BalanceSync>,
        errors: ErrorState,
        revision: Revision,
    ) -> Self {
        Self {
            gateway,
            state: Mutex::new(WalletConnection::disconnected()),
            balance,
            errors,
            revision,
        }
    }

    pub fn connection(&self) -> WalletConnection {
        self.state.lock().clone()
    }

    pub fn address(&self) -> Option<String> {
        self.state.lock().address.clone()
    }

    /// Signer for the connected account.
    pub fn signer(&self) -> Result<Signer> {
        let address = self.address().ok_or(WalletError::NoSigner)?;
        self.gateway.get_signer(&address)
    }

    /// Registers this controller for `accountsChanged`. Must be called from
    /// within a Tokio runtime.
    pub fn subscribe(self: &Arc<Self>) -> Result<AccountSubscription> {
        self.gateway.subscribe_account_changes(self.clone())
    }

    pub fn unsubscribe(&self, subscription: AccountSubscription) -> bool {
        self.gateway.unsubscribe(subscription)
    }

    /// Background probe for accounts authorized in an earlier session. Never
    /// prompts and never reports an error.
    pub async fn initialize(&self) {
        match self.gateway.get_authorized_accounts().await {
            Ok(accounts) => match accounts.into_iter().next() {
                Some(address) => self.adopt(address).await,
                None => tracing::debug!("no previously authorized accounts"),
            },
            Err(WalletError::NoProvider) => tracing::info!("no wallet provider installed"),
            Err(err) => tracing::debug!(error = %err, "startup account probe failed"),
        }
    }

    /// User-triggered connection request.
    pub async fn connect(&self) {
        self.errors.clear();
        {
            let mut state = self.state.lock();
            if state.status != ConnectionStatus::Disconnected {
                tracing::debug!(status = ?state.status, "connect ignored");
                return;
            }
            *state = WalletConnection::connecting();
        }
        self.revision.bump();

        match self.request_first_account().await {
            Ok(address) => self.adopt(address).await,
            Err(err) => {
                tracing::warn!(error = %err, "wallet connection failed");
                // an accountsChanged that landed meanwhile owns the state now
                let reverted = {
                    let mut state = self.state.lock();
                    let pending = state.status == ConnectionStatus::Connecting;
                    if pending {
                        *state = WalletConnection::disconnected();
                    }
                    pending
                };
                if reverted {
                    self.revision.bump();
                    self.balance.discard();
                }
                self.errors.set(err.user_message());
            }
        }
    }

    async fn request_first_account(&self) -> Result<String> {
        let rejected = |err: WalletError| match err {
            WalletError::NoProvider => WalletError::NoProvider,
            other => WalletError::ConnectionRejected(other.to_string()),
        };
        self.gateway.request_accounts().await.map_err(rejected)?;
        let accounts = self
            .gateway
            .get_authorized_accounts()
            .await
            .map_err(rejected)?;
        accounts
            .into_iter()
            .next()
            .ok_or_else(|| WalletError::ConnectionRejected("wallet authorized no accounts".into()))
    }

    /// Applies an `accountsChanged` notification. Repeating the current
    /// account is a no-op.
    pub async fn on_accounts_changed(&self, accounts: Vec<String>) {
        match accounts.into_iter().next() {
            Some(address) => self.adopt(address).await,
            None => {
                if self.replace(WalletConnection::disconnected()) {
                    tracing::info!("wallet disconnected");
                }
                self.balance.discard();
            }
        }
    }

    /// Moves to `Connected(address)` and refreshes balances, unless already
    /// connected to that address.
    async fn adopt(&self, address: String) {
        let previous = {
            let mut state = self.state.lock();
            if state.is_connected() && state.address.as_deref() == Some(address.as_str()) {
                return;
            }
            std::mem::replace(&mut *state, WalletConnection::connected(address.clone()))
        };
        self.revision.bump();
        tracing::info!(%address, "wallet connected");

        if previous.address.is_some() {
            self.balance.discard();
        }
        self.balance.refresh(&address).await;
        self.balance.refresh_vault().await;
    }

    fn replace(&self, next: WalletConnection) -> bool {
        let changed = {
            let mut state = self.state.lock();
            if *state == next {
                false
            } else {
                *state = next;
                true
            }
        };
        if changed {
            self.revision.bump();
        }
        changed
    }
}

#[async_trait]
impl AccountsListener for ConnectionController {
    async fn accounts_changed(&self, accounts: Vec<String>) {
        self.on_accounts_changed(accounts).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contract::ContractGateway;
    use crate::testing::{settle, MockWallet};
    use alloy_primitives::{Address, U256};
    use proptest::prelude::*;

    struct Harness {
        wallet: Arc<MockWallet>,
        balance: Arc<BalanceSync>,
        errors: ErrorState,
        controller: Arc<ConnectionController>,
    }

    fn harness(wallet: MockWallet) -> Harness {
        with_gateway(Arc::new(wallet), |w| ProviderGateway::new(w))
    }

    fn with_gateway(
        wallet: Arc<MockWallet>,
        gateway: impl FnOnce(Arc<MockWallet>) -> ProviderGateway,
    ) -> Harness {
        let gateway = gateway(wallet.clone());
        let revision = Revision::new();
        let errors = ErrorState::new(revision.clone());
        let balance = Arc::new(BalanceSync::new(
            gateway.clone(),
            ContractGateway::new(Address::ZERO),
            revision.clone(),
        ));
        let controller = Arc::new(ConnectionController::new(
            gateway,
            balance.clone(),
            errors.clone(),
            revision,
        ));
        Harness {
            wallet,
            balance,
            errors,
            controller,
        }
    }

    fn accounts(list: &[&str]) -> Vec<String> {
        list.iter().map(|a| a.to_string()).collect()
    }

    proptest! {
        #[test]
        fn first_account_becomes_canonical(list in prop::collection::vec("0x[0-9a-f]{40}", 1..5)) {
            for prior in [
                WalletConnection::disconnected(),
                WalletConnection::connecting(),
                WalletConnection::connected("0xprior"),
            ] {
                let next = prior.apply_accounts(&list);
                prop_assert_eq!(next.status(), ConnectionStatus::Connected);
                prop_assert_eq!(next.address(), Some(list[0].as_str()));
            }
        }

        #[test]
        fn empty_accounts_always_disconnect(address in "0x[0-9a-f]{40}") {
            let next = WalletConnection::connected(address).apply_accounts(&[]);
            prop_assert_eq!(next, WalletConnection::disconnected());
        }
    }

    #[tokio::test]
    async fn initialize_adopts_authorized_account() {
        let h = harness(MockWallet::with_authorized(&["0xA"]));

        h.controller.initialize().await;

        assert_eq!(h.controller.connection(), WalletConnection::connected("0xA"));
        assert_eq!(h.wallet.balance_calls(), vec!["0xA".to_string()]);
    }

    #[tokio::test]
    async fn initialize_without_accounts_stays_disconnected() {
        let h = harness(MockWallet::new());

        h.controller.initialize().await;

        assert_eq!(h.controller.connection(), WalletConnection::disconnected());
        assert!(h.wallet.balance_calls().is_empty());
    }

    #[tokio::test]
    async fn initialize_failures_are_silent() {
        let wallet = MockWallet::new();
        wallet.fail_accounts();
        let h = harness(wallet);
        h.controller.initialize().await;
        assert_eq!(h.controller.connection().status(), ConnectionStatus::Disconnected);
        assert_eq!(h.errors.current(), None);

        let absent = with_gateway(Arc::new(MockWallet::new()), |_| ProviderGateway::absent());
        absent.controller.initialize().await;
        assert_eq!(absent.controller.connection().status(), ConnectionStatus::Disconnected);
        assert_eq!(absent.errors.current(), None);
    }

    #[tokio::test]
    async fn connect_adopts_granted_account() {
        let wallet = MockWallet::new();
        wallet.grant_on_request(&["0xB", "0xC"]);
        wallet.set_balance("0xB", 3);
        let h = harness(wallet);
        h.errors.set("stale");

        h.controller.connect().await;

        assert_eq!(h.controller.connection(), WalletConnection::connected("0xB"));
        assert_eq!(h.balance.current().unwrap().amount, U256::from(3u64));
        assert_eq!(h.errors.current(), None);
    }

    #[tokio::test]
    async fn rejected_connect_returns_to_disconnected() {
        let h = harness(MockWallet::new());

        h.controller.connect().await;

        assert_eq!(h.controller.connection(), WalletConnection::disconnected());
        assert_eq!(
            h.errors.current().as_deref(),
            Some("Failed to connect wallet. Please try again.")
        );
    }

    #[tokio::test]
    async fn late_rejection_keeps_account_adopted_meanwhile() {
        let wallet = MockWallet::new();
        wallet.set_balance("0xA", 7);
        let h = harness(wallet);
        let gate = h.wallet.gate_request_accounts();

        let controller = h.controller.clone();
        let connecting = tokio::spawn(async move { controller.connect().await });
        settle().await;
        assert_eq!(h.controller.connection(), WalletConnection::connecting());

        h.controller.on_accounts_changed(accounts(&["0xA"])).await;
        gate.send(Err(WalletError::Rpc {
            code: crate::error::USER_REJECTED_REQUEST,
            message: "User rejected the request.".into(),
        }))
        .unwrap();
        connecting.await.unwrap();

        assert_eq!(h.controller.connection(), WalletConnection::connected("0xA"));
        let balance = h.balance.current().unwrap();
        assert_eq!(balance.address, "0xA");
        assert_eq!(balance.amount, U256::from(7u64));
        assert_eq!(
            h.errors.current().as_deref(),
            Some("Failed to connect wallet. Please try again.")
        );
    }

    #[tokio::test]
    async fn gated_rejection_while_connecting_disconnects() {
        let h = harness(MockWallet::new());
        let gate = h.wallet.gate_request_accounts();

        let controller = h.controller.clone();
        let connecting = tokio::spawn(async move { controller.connect().await });
        settle().await;
        gate.send(Err(WalletError::Transport("wallet closed".into()))).unwrap();
        connecting.await.unwrap();

        assert_eq!(h.controller.connection(), WalletConnection::disconnected());
        assert!(h.balance.current().is_none());
        assert!(h.errors.current().is_some());
    }

    #[tokio::test]
    async fn connect_without_provider_reports_missing_wallet() {
        let h = with_gateway(Arc::new(MockWallet::new()), |_| ProviderGateway::absent());

        h.controller.connect().await;

        assert_eq!(h.controller.connection(), WalletConnection::disconnected());
        assert_eq!(
            h.errors.current(),
            Some(WalletError::NoProvider.user_message())
        );
    }

    #[tokio::test]
    async fn repeated_account_is_a_no_op() {
        let h = harness(MockWallet::with_authorized(&["0xA"]));
        h.controller.initialize().await;

        h.controller.on_accounts_changed(accounts(&["0xA", "0xB"])).await;

        assert_eq!(h.controller.connection(), WalletConnection::connected("0xA"));
        assert_eq!(h.wallet.balance_calls().len(), 1);
    }

    #[tokio::test]
    async fn switching_accounts_refreshes_new_address() {
        let wallet = MockWallet::with_authorized(&["0xA"]);
        wallet.set_balance("0xA", 1);
        wallet.set_balance("0xB", 2);
        let h = harness(wallet);
        h.controller.initialize().await;

        h.controller.on_accounts_changed(accounts(&["0xB"])).await;

        assert_eq!(h.controller.address().as_deref(), Some("0xB"));
        let balance = h.balance.current().unwrap();
        assert_eq!(balance.address, "0xB");
        assert_eq!(balance.amount, U256::from(2u64));
    }

    #[tokio::test]
    async fn empty_accounts_disconnect_and_drop_balance() {
        let wallet = MockWallet::with_authorized(&["0xA"]);
        wallet.set_balance("0xA", 1);
        let h = harness(wallet);
        h.controller.initialize().await;
        assert!(h.balance.current().is_some());

        h.controller.on_accounts_changed(Vec::new()).await;

        assert_eq!(h.controller.connection(), WalletConnection::disconnected());
        assert!(h.balance.current().is_none());
        assert_eq!(h.controller.signer().unwrap_err(), WalletError::NoSigner);
    }

    #[tokio::test]
    async fn subscription_drives_state_until_released() {
        let h = harness(MockWallet::new());
        let subscription = h.controller.subscribe().unwrap();

        h.wallet.emit_accounts(&["0xA"]);
        settle().await;
        assert_eq!(h.controller.address().as_deref(), Some("0xA"));

        assert!(h.controller.unsubscribe(subscription));
        settle().await;
        h.wallet.emit_accounts(&[]);
        settle().await;
        assert_eq!(h.controller.address().as_deref(), Some("0xA"));
    }
}
