mod catalog;
mod formatter;
mod plural;

pub use catalog::{BuiltinCatalog, Catalog, MessageKey};
pub use formatter::{Rendered, format_stats, translate};
pub use plural::{PluralCategory, plural_category};
