mod app;
mod executor;
mod messages;

use iced::{Application, Settings};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use app::VaultApp;
use vault_dapp::config::Config;

fn main() -> anyhow::Result<()> {
    let config = Config::from_env()?;

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "vault_dapp=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!(
        contract = %config.contract_address,
        wallet = ?config.wallet_rpc_url.as_ref().map(|url| url.as_str()),
        "starting vault client"
    );

    let mut settings = Settings::with_flags(config);
    settings.window.resizable = false;
    settings.window.size = (480, 520);
    settings.exit_on_close_request = false;
    VaultApp::run(settings)?;
    Ok(())
}
