//! Explicit session context
//!
//! Every core call takes a `Session`; there is no ambient "current
//! user". Holding a session is the authenticated precondition: the
//! auth collaborator constructs one only after verifying credentials.

use crate::core_types::UserId;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub user_id: UserId,
    pub handle: String,
}

impl Session {
    pub fn new(user_id: UserId, handle: impl Into<String>) -> Self {
        Self {
            user_id,
            handle: handle.into(),
        }
    }
}
