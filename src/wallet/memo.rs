//! Memo correlation tokens
//!
//! A memo is the only mechanism correlating an off-platform intent to
//! an on-ledger settlement, so tokens must be unique per pending intent.
//! Deposit memos add a millisecond timestamp on top of the random token.

use chrono::Utc;
use rand::Rng;

const CHARSET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789";

/// Random alphanumeric token of `len` characters
pub fn random_token(len: usize) -> String {
    let mut rng = rand::thread_rng();
    (0..len)
        .map(|_| CHARSET[rng.gen_range(0..CHARSET.len())] as char)
        .collect()
}

/// Memo for an internal transfer when the sender gave none
pub fn transfer_memo() -> String {
    format!("TRANSFER_{}", random_token(6))
}

/// Single-use correlation memo for an external ledger transfer intent
pub fn external_transfer_memo() -> String {
    format!("BLOCKCHAIN_TRANSFER_{}", random_token(6))
}

/// Memo for a fiat-gateway deposit intent
pub fn fiat_deposit_memo() -> String {
    format!("FIAT_DEPOSIT_{}", random_token(8))
}

/// Globally unique memo for a direct-ledger deposit intent
pub fn ledger_deposit_memo() -> String {
    format!(
        "CHAIN_DEPOSIT_{}_{}",
        random_token(8),
        Utc::now().timestamp_millis()
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_token_charset_and_length() {
        let token = random_token(32);
        assert_eq!(token.len(), 32);
        assert!(token.chars().all(|c| c.is_ascii_alphanumeric()));
    }

    #[test]
    fn test_memo_prefixes() {
        assert!(transfer_memo().starts_with("TRANSFER_"));
        assert!(external_transfer_memo().starts_with("BLOCKCHAIN_TRANSFER_"));
        assert!(fiat_deposit_memo().starts_with("FIAT_DEPOSIT_"));
        assert!(ledger_deposit_memo().starts_with("CHAIN_DEPOSIT_"));
    }

    #[test]
    fn test_deposit_memos_are_distinct() {
        let memos: HashSet<_> = (0..100).map(|_| ledger_deposit_memo()).collect();
        assert_eq!(memos.len(), 100);
    }
}
