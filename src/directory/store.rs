//! UserDirectory seam
//!
//! Lookup primitives over the user-directory collaborator. Each finder
//! returns at most one row (first row wins); ordering across finders is
//! the resolver's job.

use async_trait::async_trait;
use thiserror::Error;

use super::models::Identity;

#[derive(Debug, Error)]
pub enum DirectoryError {
    #[error("Directory unavailable: {0}")]
    Unavailable(String),
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

#[async_trait]
pub trait UserDirectory: Send + Sync {
    /// Exact handle match
    async fn find_by_handle(&self, handle: &str) -> Result<Option<Identity>, DirectoryError>;

    /// Exact display-name match
    async fn find_by_display_name(&self, name: &str) -> Result<Option<Identity>, DirectoryError>;

    /// First row whose display name contains `fragment` (case-insensitive)
    async fn find_display_name_contains(
        &self,
        fragment: &str,
    ) -> Result<Option<Identity>, DirectoryError>;

    /// First row whose handle contains `fragment` (case-insensitive)
    async fn find_handle_contains(
        &self,
        fragment: &str,
    ) -> Result<Option<Identity>, DirectoryError>;

    /// All rows whose handle or display name contains `fragment`
    /// (case-insensitive), up to `limit` raw rows. May contain the same
    /// account twice (handle and display name both matching).
    async fn search(&self, fragment: &str, limit: i64) -> Result<Vec<Identity>, DirectoryError>;
}
