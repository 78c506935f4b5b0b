mod bytes;
pub mod media_types;
mod numbers;
mod path;

pub use bytes::{format_bytes, format_bytes_localized};
pub use media_types::{
    Classification, ClassificationSource, MediaKind, classify, extension_category, file_suffix, is_archive,
    is_streamable, normalize_extension,
};
pub use numbers::{NumberFormat, format_count};
pub use path::create_data_path;
