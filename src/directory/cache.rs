//! TTL-based cache for hot directory lookups
//!
//! Uses the `cached` crate for automatic TTL expiration. Display flows
//! (transaction descriptions, profile chips) hit the same handful of
//! handles repeatedly; a short TTL keeps those reads off the directory
//! without holding identities long enough to go stale.

use cached::proc_macro::cached;
use std::sync::Arc;

use super::models::Identity;
use super::store::UserDirectory;

/// TTL for identity lookups in seconds
pub const TTL_SECONDS: u64 = 30;

/// Look up an identity by exact handle, cached for [`TTL_SECONDS`].
#[cached(
    time = 30,
    key = "String",
    convert = r#"{ handle.clone() }"#,
    result = true
)]
pub async fn find_by_handle_cached(
    directory: Arc<dyn UserDirectory>,
    handle: String,
) -> Result<Option<Identity>, String> {
    tracing::debug!("[cache] Loading identity @{} from directory", handle);
    directory
        .find_by_handle(&handle)
        .await
        .map_err(|e| format!("Failed to load identity: {}", e))
}
