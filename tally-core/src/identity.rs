use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Opaque reference to an authenticated principal. The `user_id` names the
/// persisted task namespace; the username is only for display.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub user_id: Uuid,
    pub username: String,
}

impl Identity {
    pub fn new(username: impl Into<String>) -> Self {
        Self {
            user_id: Uuid::new_v4(),
            username: username.into(),
        }
    }
}
