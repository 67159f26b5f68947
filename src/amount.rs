use alloy_primitives::{utils::parse_ether, U256};

use crate::error::{Result, WalletError};

/// Parses user-entered decimal text (in ether) into wei.
///
/// Rejects empty input, anything that is not a plain decimal number, negative
/// values and zero. The contract is the authority on everything else.
pub fn parse_amount(text: &str) -> Result<U256> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Err(WalletError::invalid_amount(text, "amount is empty"));
    }
    if trimmed.starts_with('-') {
        return Err(WalletError::invalid_amount(text, "amount must not be negative"));
    }
    if !trimmed.chars().all(|c| c.is_ascii_digit() || c == '.') {
        return Err(WalletError::invalid_amount(text, "amount is not a number"));
    }

    let wei = parse_ether(trimmed).map_err(|e| WalletError::invalid_amount(text, e.to_string()))?;
    if wei.is_zero() {
        return Err(WalletError::invalid_amount(text, "amount must be greater than zero"));
    }
    Ok(wei)
}
