//! Room configuration.

use serde::{Deserialize, Serialize};

/// Settings applied to every room a registry creates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoomConfig {
    /// Capacity of each subscriber's inbox. When an inbox is full,
    /// further events for that subscriber are dropped.
    pub subscriber_capacity: usize,

    /// Longest display name accepted on create/join, in characters.
    pub max_name_len: usize,
}

impl Default for RoomConfig {
    fn default() -> Self {
        Self {
            subscriber_capacity: 10,
            max_name_len: 64,
        }
    }
}
