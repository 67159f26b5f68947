use vault_dapp::transaction::TransactionOutcome;

#[derive(Debug, Clone)]
pub enum Message {
    Started,
    SessionChanged,
    ConnectPressed,
    ConnectFinished,
    AmountInputChanged(String),
    DepositPressed,
    WithdrawPressed,
    TransactionSettled(TransactionOutcome),
    CloseRequested,
    ShutdownComplete,
}
