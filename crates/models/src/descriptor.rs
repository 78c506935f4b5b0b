use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Metadata about one file delivered through the chat, as reported by the transport.
///
/// Sizes are kept signed because that is what the wire gives us; [`FileDescriptor::validate`]
/// is the only way to turn them into counters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileDescriptor {
    pub name: Option<String>,
    pub size: Option<i64>,
    pub download_size: Option<i64>,
    pub mime_type: Option<String>,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DescriptorError {
    #[error("{field} must not be negative (got {value})")]
    NegativeSize { field: &'static str, value: i64 },

    #[error("file name contains a NUL byte")]
    NulInName,
}

/// Sizes of a descriptor that passed validation; unknown sizes count as zero.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ValidatedSizes {
    pub size: u64,
    pub download_size: u64,
}

impl FileDescriptor {
    #[must_use]
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            ..Self::default()
        }
    }

    #[must_use]
    pub const fn with_size(mut self, size: i64) -> Self {
        self.size = Some(size);
        self
    }

    #[must_use]
    pub const fn with_download_size(mut self, size: i64) -> Self {
        self.download_size = Some(size);
        self
    }

    #[must_use]
    pub fn with_mime_type(mut self, mime: impl Into<String>) -> Self {
        self.mime_type = Some(mime.into());
        self
    }

    /// File name with surrounding whitespace removed, or `None` if it is absent or blank.
    #[must_use]
    pub fn file_name(&self) -> Option<&str> {
        self.name.as_deref().map(str::trim).filter(|n| !n.is_empty())
    }

    #[must_use]
    pub fn mime(&self) -> Option<&str> {
        self.mime_type.as_deref().map(str::trim).filter(|m| !m.is_empty())
    }

    /// Rejects descriptors that would corrupt totals.
    ///
    /// # Errors
    ///
    /// Returns an error if a declared size is negative or the name contains a NUL byte.
    pub fn validate(&self) -> Result<ValidatedSizes, DescriptorError> {
        if self.name.as_deref().is_some_and(|n| n.contains('\0')) {
            return Err(DescriptorError::NulInName);
        }

        let size = non_negative("size", self.size)?;
        let download_size = non_negative("download_size", self.download_size)?;

        Ok(ValidatedSizes { size, download_size })
    }
}

#[allow(clippy::cast_sign_loss)]
fn non_negative(field: &'static str, value: Option<i64>) -> Result<u64, DescriptorError> {
    match value {
        None => Ok(0),
        Some(v) if v < 0 => Err(DescriptorError::NegativeSize { field, value: v }),
        Some(v) => Ok(v as u64),
    }
}
