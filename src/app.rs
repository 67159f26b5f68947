use std::sync::Arc;

use iced::widget::{Button, Column, Container, Row, Text, TextInput};
use iced::{
    alignment, event, subscription, window, Alignment, Application, Color, Command, Element,
    Event, Length, Subscription, Theme,
};
use tokio::sync::watch;

use vault_dapp::config::Config;
use vault_dapp::connection::ConnectionStatus;
use vault_dapp::utils::short_address;
use vault_dapp::{SessionView, WalletSession};

use crate::executor::SessionExecutor;
use crate::messages::Message;

pub struct VaultApp {
    session: Arc<WalletSession>,
    snapshot: SessionView,
    amount_input: String,
    notice: Option<String>,
}

async fn next_change(mut changes: watch::Receiver<u64>) -> (Message, watch::Receiver<u64>) {
    if changes.changed().await.is_err() {
        // session dropped, nothing left to report
        futures::future::pending::<()>().await;
    }
    (Message::SessionChanged, changes)
}

fn close_requests(event: Event, _status: event::Status) -> Option<Message> {
    match event {
        Event::Window(window::Event::CloseRequested) => Some(Message::CloseRequested),
        _ => None,
    }
}

impl Application for VaultApp {
    type Message = Message;
    type Executor = SessionExecutor;
    type Flags = Config;
    type Theme = Theme;

    fn new(config: Config) -> (Self, Command<Message>) {
        let session = Arc::new(WalletSession::from_config(&config));
        let app = VaultApp {
            snapshot: session.view(),
            session: session.clone(),
            amount_input: String::new(),
            notice: None,
        };
        (
            app,
            Command::perform(async move { session.start().await }, |_| Message::Started),
        )
    }

    fn title(&self) -> String {
        String::from("Vault")
    }

    fn update(&mut self, message: Message) -> Command<Message> {
        match message {
            Message::Started | Message::SessionChanged | Message::ConnectFinished => {
                self.snapshot = self.session.view();
                Command::none()
            }
            Message::ConnectPressed => {
                self.notice = None;
                let session = self.session.clone();
                Command::perform(async move { session.connect().await }, |_| {
                    Message::ConnectFinished
                })
            }
            Message::AmountInputChanged(value) => {
                self.amount_input = value;
                Command::none()
            }
            Message::DepositPressed => {
                self.notice = None;
                let session = self.session.clone();
                let amount = self.amount_input.clone();
                Command::perform(
                    async move { session.deposit(&amount).await },
                    Message::TransactionSettled,
                )
            }
            Message::WithdrawPressed => {
                self.notice = None;
                let session = self.session.clone();
                let amount = self.amount_input.clone();
                Command::perform(
                    async move { session.withdraw(&amount).await },
                    Message::TransactionSettled,
                )
            }
            Message::TransactionSettled(outcome) => {
                if outcome.is_success() {
                    self.notice = Some(outcome.kind.success_message().to_string());
                }
                self.snapshot = self.session.view();
                Command::none()
            }
            Message::CloseRequested => {
                let session = self.session.clone();
                Command::perform(async move { session.shutdown() }, |_| {
                    Message::ShutdownComplete
                })
            }
            Message::ShutdownComplete => window::close(),
        }
    }

    fn subscription(&self) -> Subscription<Message> {
        Subscription::batch([
            subscription::unfold("session-changes", self.session.changes(), next_change),
            subscription::events_with(close_requests),
        ])
    }

    fn view(&self) -> Element<Message> {
        let title = Text::new("Vault")
            .size(24)
            .width(Length::Fill)
            .horizontal_alignment(alignment::Horizontal::Center);

        let mut content = Column::new()
            .push(title)
            .spacing(15)
            .padding(20)
            .width(Length::Fill)
            .align_items(Alignment::Center);

        let connection = &self.snapshot.connection;
        match (connection.status(), connection.address()) {
            (ConnectionStatus::Connected, Some(address)) => {
                let input = TextInput::new("Amount (ETH)", &self.amount_input)
                    .on_input(Message::AmountInputChanged)
                    .padding(10)
                    .size(16);

                let mut deposit = Button::new(Text::new("Deposit")).padding(10);
                if !self.snapshot.deposit_pending {
                    deposit = deposit.on_press(Message::DepositPressed);
                }
                let mut withdraw = Button::new(Text::new("Withdraw")).padding(10);
                if !self.snapshot.withdraw_pending {
                    withdraw = withdraw.on_press(Message::WithdrawPressed);
                }

                let balance = self.snapshot.balance.as_deref().unwrap_or("…");
                let mut balances = Column::new()
                    .push(Text::new(format!("Wallet Balance: {balance} ETH")).size(14))
                    .spacing(5);
                if let Some(vault) = &self.snapshot.vault_balance {
                    balances =
                        balances.push(Text::new(format!("Vault Balance: {vault} ETH")).size(14));
                }

                content = content
                    .push(Text::new(format!("Connected: {}", short_address(address))).size(14))
                    .push(input)
                    .push(Row::new().push(deposit).push(withdraw).spacing(10))
                    .push(balances);
            }
            (ConnectionStatus::Connecting, _) => {
                content = content.push(Button::new(Text::new("Connecting…")).padding(10));
            }
            _ => {
                content = content.push(
                    Button::new(Text::new("Connect Wallet"))
                        .on_press(Message::ConnectPressed)
                        .padding(10),
                );
            }
        }

        if let Some(notice) = &self.notice {
            content = content.push(
                Text::new(notice)
                    .size(14)
                    .style(Color::from_rgb(0.0, 0.5, 0.0)),
            );
        }

        if let Some(error) = &self.snapshot.error {
            content = content.push(
                Text::new(error)
                    .size(14)
                    .style(Color::from_rgb(0.8, 0.0, 0.0))
                    .width(Length::Fill)
                    .horizontal_alignment(alignment::Horizontal::Center),
            );
        }

        Container::new(content)
            .width(Length::Fill)
            .height(Length::Fill)
            .center_x()
            .padding(10)
            .into()
    }
}
