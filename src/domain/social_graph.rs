use serde::{Deserialize, Serialize};

/// Directed subscription edge: `user_id` follows `author_id`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct Follow {
    pub user_id: i64,
    pub author_id: i64,
}
