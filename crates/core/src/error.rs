use filestats_models::{DescriptorError, UserId};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StatsError {
    /// The durable commit did not happen; the stored record is unchanged.
    #[error("Persistence failure: {0}")]
    Persistence(#[from] sqlx::Error),

    #[error("Stored record of user {user} could not be encoded or decoded: {source}")]
    Encoding {
        user: UserId,
        #[source]
        source: serde_json::Error,
    },

    #[error("Malformed file descriptor: {0}")]
    MalformedDescriptor(#[from] DescriptorError),

    #[error("Invalid user id {0}")]
    InvalidUserId(UserId),
}

impl StatsError {
    #[must_use]
    pub const fn is_persistence_failure(&self) -> bool {
        matches!(self, Self::Persistence(_))
    }
}

pub type Result<T> = std::result::Result<T, StatsError>;
