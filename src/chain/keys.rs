//! Syntactic checks on ledger signing secrets
//!
//! Format only: a WIF-encoded secret starts with one of a small set of
//! two-character prefixes and is at least 51 characters. Cryptographic
//! validation is the broadcast relay's job, never done here.

/// Accepted WIF prefixes
pub const WIF_PREFIXES: [&str; 10] = ["5J", "5K", "5H", "5W", "5Q", "5R", "5S", "5T", "5U", "5V"];

/// Minimum length of a WIF-encoded signing secret
pub const MIN_WIF_LEN: usize = 51;

/// Does `key` look like a WIF signing secret?
pub fn is_wif_format(key: &str) -> bool {
    key.len() >= MIN_WIF_LEN && WIF_PREFIXES.iter().any(|p| key.starts_with(p))
}

/// Does `name` look like a valid ledger account name?
///
/// Lowercase letters, digits, dots and dashes; 3 to 16 characters;
/// must start with a letter.
pub fn is_account_name(name: &str) -> bool {
    if name.len() < 3 || name.len() > 16 {
        return false;
    }
    let mut chars = name.chars();
    let first = chars.next().unwrap();
    first.is_ascii_lowercase()
        && chars.all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '.' || c == '-')
}
