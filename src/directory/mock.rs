//! In-memory user directory for tests and local development

use async_trait::async_trait;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use super::models::Identity;
use super::store::{DirectoryError, UserDirectory};

#[derive(Debug, Default)]
pub struct MockDirectory {
    rows: Mutex<Vec<Identity>>,
    queries: AtomicUsize,
}

impl MockDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, identity: Identity) {
        self.rows.lock().unwrap().push(identity);
    }

    /// Number of lookups that actually hit the directory
    pub fn query_count(&self) -> usize {
        self.queries.load(Ordering::SeqCst)
    }

    fn first_match<F>(&self, pred: F) -> Option<Identity>
    where
        F: Fn(&Identity) -> bool,
    {
        self.queries.fetch_add(1, Ordering::SeqCst);
        self.rows.lock().unwrap().iter().find(|i| pred(i)).cloned()
    }
}

#[async_trait]
impl UserDirectory for MockDirectory {
    async fn find_by_handle(&self, handle: &str) -> Result<Option<Identity>, DirectoryError> {
        Ok(self.first_match(|i| i.handle == handle))
    }

    async fn find_by_display_name(&self, name: &str) -> Result<Option<Identity>, DirectoryError> {
        Ok(self.first_match(|i| i.display_name == name))
    }

    async fn find_display_name_contains(
        &self,
        fragment: &str,
    ) -> Result<Option<Identity>, DirectoryError> {
        let needle = fragment.to_lowercase();
        Ok(self.first_match(|i| i.display_name.to_lowercase().contains(&needle)))
    }

    async fn find_handle_contains(
        &self,
        fragment: &str,
    ) -> Result<Option<Identity>, DirectoryError> {
        let needle = fragment.to_lowercase();
        Ok(self.first_match(|i| i.handle.to_lowercase().contains(&needle)))
    }

    async fn search(&self, fragment: &str, limit: i64) -> Result<Vec<Identity>, DirectoryError> {
        self.queries.fetch_add(1, Ordering::SeqCst);
        let needle = fragment.to_lowercase();
        let rows = self.rows.lock().unwrap();
        Ok(rows
            .iter()
            .filter(|i| {
                i.handle.to_lowercase().contains(&needle)
                    || i.display_name.to_lowercase().contains(&needle)
            })
            .take(limit as usize)
            .cloned()
            .collect())
    }
}
