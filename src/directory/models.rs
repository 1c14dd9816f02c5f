//! Identity model owned by the user directory
//!
//! The wallet core never owns identity rows; it only reads them through
//! the [`UserDirectory`](super::store::UserDirectory) seam.

use serde::{Deserialize, Serialize};

use crate::core_types::UserId;

/// A platform identity as the user directory reports it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub account_id: UserId,
    pub handle: String,
    pub display_name: String,
    pub avatar_url: Option<String>,
}

impl Identity {
    /// Avatar to display, falling back to a generated placeholder
    pub fn avatar_or_default(&self) -> String {
        self.avatar_url
            .clone()
            .unwrap_or_else(|| default_avatar_url(&self.handle))
    }
}

/// Deterministic placeholder avatar for identities without an upload
pub fn default_avatar_url(handle: &str) -> String {
    format!("https://api.dicebear.com/7.x/avataaars/svg?seed={}", handle)
}
