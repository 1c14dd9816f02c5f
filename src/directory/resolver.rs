//! Identifier resolution over the user directory
//!
//! A human-entered identifier is tried against the directory in a fixed
//! order until something matches. The full chain ends with partial
//! matches, which are first-row-wins and therefore unsuitable for
//! routing money; money-moving callers use [`UserResolver::resolve_exact`].

use std::collections::HashSet;
use std::sync::Arc;

use super::models::Identity;
use super::store::{DirectoryError, UserDirectory};

/// Maximum identities returned by a prefix search
pub const SEARCH_LIMIT: usize = 10;

/// Minimum query length before the directory is consulted at all
pub const MIN_SEARCH_LEN: usize = 2;

pub struct UserResolver {
    directory: Arc<dyn UserDirectory>,
}

impl UserResolver {
    pub fn new(directory: Arc<dyn UserDirectory>) -> Self {
        Self { directory }
    }

    /// Resolve an identifier for display purposes.
    ///
    /// Tried in order, first match wins:
    /// 1. exact handle
    /// 2. exact display name
    /// 3. partial display-name match
    /// 4. partial handle match
    pub async fn resolve(&self, identifier: &str) -> Result<Option<Identity>, DirectoryError> {
        if let Some(found) = self.directory.find_by_handle(identifier).await? {
            return Ok(Some(found));
        }
        if let Some(found) = self.directory.find_by_display_name(identifier).await? {
            return Ok(Some(found));
        }
        if let Some(found) = self.directory.find_display_name_contains(identifier).await? {
            return Ok(Some(found));
        }
        self.directory.find_handle_contains(identifier).await
    }

    /// Resolve an identifier for money movement: exact matches only.
    ///
    /// A partial match could route funds to a similarly-named account,
    /// so the fuzzy steps of [`resolve`](Self::resolve) are skipped.
    pub async fn resolve_exact(
        &self,
        identifier: &str,
    ) -> Result<Option<Identity>, DirectoryError> {
        if let Some(found) = self.directory.find_by_handle(identifier).await? {
            return Ok(Some(found));
        }
        self.directory.find_by_display_name(identifier).await
    }

    /// Bounded, deduplicated prefix search with avatar annotation.
    ///
    /// Queries shorter than [`MIN_SEARCH_LEN`] return empty without
    /// touching the directory. `exclude_handle` drops the searching
    /// user from their own results.
    pub async fn search(
        &self,
        query: &str,
        exclude_handle: Option<&str>,
    ) -> Result<Vec<Identity>, DirectoryError> {
        if query.len() < MIN_SEARCH_LEN {
            return Ok(Vec::new());
        }

        // Over-fetch so dedup + self-exclusion still fill the page.
        let raw = self
            .directory
            .search(query, (SEARCH_LIMIT * 2) as i64)
            .await?;

        let mut seen = HashSet::new();
        let mut results = Vec::new();
        for mut identity in raw {
            if Some(identity.handle.as_str()) == exclude_handle {
                continue;
            }
            if !seen.insert(identity.account_id) {
                continue;
            }
            identity.avatar_url = Some(identity.avatar_or_default());
            results.push(identity);
            if results.len() == SEARCH_LIMIT {
                break;
            }
        }

        Ok(results)
    }
}
