mod delta;
mod descriptor;
mod locale;
mod record;
mod user;

pub use delta::{COUNTER_MAX, StatsDelta};
pub use descriptor::{DescriptorError, FileDescriptor, ValidatedSizes};
pub use locale::Locale;
pub use record::StatsRecord;
pub use user::UserId;

/// Category key used when neither a file name suffix nor a MIME type says anything useful.
pub const UNKNOWN_CATEGORY: &str = "unknown";
