//! Core types used throughout the wallet core
//!
//! Fundamental aliases and amount conventions shared by all modules.

use rust_decimal::Decimal;

/// User ID - row id of a platform user in the backing store.
///
/// # Usage:
/// - Primary key for user and balance rows
/// - Carried explicitly in every core call (no ambient "current user")
pub type UserId = uuid::Uuid;

/// Transaction ID - row id of a wallet transaction in the backing store
pub type TxId = uuid::Uuid;

/// Display symbol of the platform currency
pub const CURRENCY: &str = "VDR";

/// Decimal places of the ledger's minimal unit (0.001 VDR)
pub const AMOUNT_DECIMALS: u32 = 3;

/// Format an amount for display: `12.345 VDR`
pub fn format_amount(amount: Decimal) -> String {
    format!(
        "{:.prec$} {}",
        amount,
        CURRENCY,
        prec = AMOUNT_DECIMALS as usize
    )
}

/// Parse a ledger-style amount string (`"12.345 VDR"`) into a Decimal.
///
/// Returns None if the string is malformed or names a different currency.
pub fn parse_ledger_amount(s: &str) -> Option<Decimal> {
    let mut parts = s.split_whitespace();
    let value: Decimal = parts.next()?.parse().ok()?;
    match parts.next() {
        Some(sym) if sym == CURRENCY => Some(value),
        Some(_) => None,
        None => Some(value),
    }
}
