use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier of the chat user that owns a statistics record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(pub i64);

impl UserId {
    #[must_use]
    pub const fn get(self) -> i64 {
        self.0
    }

    /// Chat platforms hand out strictly positive ids.
    #[must_use]
    pub const fn is_well_formed(self) -> bool {
        self.0 > 0
    }
}

impl From<i64> for UserId {
    fn from(id: i64) -> Self {
        Self(id)
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
