mod database_store;
mod error;
mod locks;
mod store;

pub use database_store::{SqliteStatsStore, StoreOptions};
pub use error::{Result, StatsError};
pub use locks::{UserGuard, UserLocks};
pub use store::StatsStore;
