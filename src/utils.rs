use alloy_primitives::{utils::format_ether, U256};

/// Formats wei as ether without trailing zeros, e.g. `1.5` or `0.01`.
pub fn display_native(wei: U256) -> String {
    let formatted = format_ether(wei);
    match formatted.split_once('.') {
        Some((whole, fraction)) => {
            let fraction = fraction.trim_end_matches('0');
            if fraction.is_empty() {
                format!("{whole}.0")
            } else {
                format!("{whole}.{fraction}")
            }
        }
        None => format!("{formatted}.0"),
    }
}

/// `0x1234…abcd` for display; short input is returned unchanged.
pub fn short_address(address: &str) -> String {
    if address.len() <= 12 || !address.is_char_boundary(6) {
        return address.to_string();
    }
    let tail = address.len() - 4;
    if !address.is_char_boundary(tail) {
        return address.to_string();
    }
    format!("{}…{}", &address[..6], &address[tail..])
}
