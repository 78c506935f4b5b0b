//! Extension classification and streamable detection.
//!
//! Both answers come from the same suffix/MIME table so a file that lands in the
//! `video` bucket is always counted as streamable, and vice versa.

use filestats_models::{FileDescriptor, UNKNOWN_CATEGORY};
use regex::Regex;
use std::fmt;
use std::sync::LazyLock;

#[allow(clippy::expect_used)]
static SUFFIX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-z0-9]{1,10}$").expect("Failed to compile SUFFIX regex"));

#[allow(clippy::expect_used)]
static MIME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^([a-z]+)/([a-z0-9][a-z0-9.+\-]*)$").expect("Failed to compile MIME regex")
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MediaKind {
    Video,
    Audio,
    Image,
    Archive,
    Document,
}

impl MediaKind {
    /// Category key this kind is counted under.
    #[must_use]
    pub const fn category(self) -> &'static str {
        match self {
            Self::Video => "video",
            Self::Audio => "audio",
            Self::Image => "image",
            Self::Archive => "archive",
            Self::Document => "document",
        }
    }

    #[must_use]
    pub const fn is_streamable(self) -> bool {
        matches!(self, Self::Video | Self::Audio)
    }
}

impl fmt::Display for MediaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.category())
    }
}

/// Maps a lower-case suffix to its kind.
#[must_use]
pub fn kind_for_suffix(suffix: &str) -> Option<MediaKind> {
    match suffix {
        // Videos
        "mp4" | "mkv" | "avi" | "mov" | "wmv" | "flv" | "webm" | "m4v" | "mpg" | "mpeg" | "3gp" | "3g2" | "mts"
        | "m2ts" | "vob" | "ogv" => Some(MediaKind::Video),

        // Audio
        "mp3" | "wav" | "flac" | "aac" | "ogg" | "oga" | "opus" | "m4a" | "wma" | "alac" | "aiff" | "mka" => {
            Some(MediaKind::Audio)
        }

        // Images
        "jpg" | "jpeg" | "png" | "gif" | "bmp" | "webp" | "svg" | "ico" | "tiff" | "tif" | "heic" | "heif" => {
            Some(MediaKind::Image)
        }

        // Archives
        "zip" | "rar" | "7z" | "tar" | "gz" | "tgz" | "bz2" | "xz" | "zst" => Some(MediaKind::Archive),

        // Documents
        "pdf" | "doc" | "docx" | "xls" | "xlsx" | "ppt" | "pptx" | "txt" | "odt" | "ods" | "odp" | "rtf" | "epub" => {
            Some(MediaKind::Document)
        }

        _ => None,
    }
}

/// Kind whose category key is `name`, so a literal `.video` suffix is counted like any video.
#[must_use]
pub fn kind_for_category(name: &str) -> Option<MediaKind> {
    [
        MediaKind::Video,
        MediaKind::Audio,
        MediaKind::Image,
        MediaKind::Archive,
        MediaKind::Document,
    ]
    .into_iter()
    .find(|kind| kind.category() == name)
}

/// Maps a MIME type to its kind, using the subtype only where the top-level token is too broad.
#[must_use]
pub fn kind_for_mime(top: &str, subtype: &str) -> Option<MediaKind> {
    match (top, subtype) {
        ("video", _) => Some(MediaKind::Video),
        ("audio", _) => Some(MediaKind::Audio),
        ("image", _) => Some(MediaKind::Image),
        (
            "application",
            "zip" | "x-zip-compressed" | "vnd.rar" | "x-rar-compressed" | "x-7z-compressed" | "x-tar" | "gzip"
            | "x-gzip" | "x-bzip2" | "x-xz" | "zstd",
        ) => Some(MediaKind::Archive),
        ("application", "pdf" | "msword" | "rtf" | "epub+zip") | ("text", "plain") => Some(MediaKind::Document),
        ("application", s) if s.starts_with("vnd.openxmlformats-officedocument") || s.starts_with("vnd.oasis.opendocument") => {
            Some(MediaKind::Document)
        }
        _ => None,
    }
}

/// Where a classification came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClassificationSource {
    Suffix,
    Mime,
    /// Nothing usable; the file lands in the unknown bucket.
    Unknown,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classification {
    pub category: String,
    pub kind: Option<MediaKind>,
    pub streamable: bool,
    pub source: ClassificationSource,
}

impl Classification {
    #[must_use]
    pub fn is_degraded(&self) -> bool {
        self.source == ClassificationSource::Unknown
    }
}

/// Lower-case suffix of the last path component, if it looks like a real extension.
///
/// Dot-files (`.bashrc`) and suffixes with punctuation or more than ten characters have none.
#[must_use]
pub fn file_suffix(name: &str) -> Option<String> {
    let base = name.rsplit(['/', '\\']).next().unwrap_or(name).trim();
    let (stem, suffix) = base.rsplit_once('.')?;
    if stem.is_empty() {
        return None;
    }
    let suffix = suffix.to_ascii_lowercase();
    SUFFIX.is_match(&suffix).then_some(suffix)
}

/// Normalizes a user-supplied extension (`".MP4"`, `" mp4 "`) to the form [`file_suffix`] returns.
#[must_use]
pub fn normalize_extension(raw: &str) -> Option<String> {
    let suffix = raw.trim().trim_start_matches('.').to_ascii_lowercase();
    SUFFIX.is_match(&suffix).then_some(suffix)
}

/// Splits `type/subtype; params` into its lower-case tokens.
#[must_use]
pub fn parse_mime(mime: &str) -> Option<(String, String)> {
    let essence = mime.split(';').next().unwrap_or_default().trim().to_ascii_lowercase();
    let caps = MIME.captures(&essence)?;
    Some((caps[1].to_string(), caps[2].to_string()))
}

/// Classifies a file: suffix first, then MIME type, then the unknown bucket. Never fails.
#[must_use]
pub fn classify(descriptor: &FileDescriptor) -> Classification {
    let mime = descriptor.mime().and_then(parse_mime);
    let mime_kind = mime.as_ref().and_then(|(top, sub)| kind_for_mime(top, sub));
    let mime_streamable = mime_kind.is_some_and(MediaKind::is_streamable);

    // A literal ".unknown" suffix carries no more information than no suffix at all.
    let suffix = descriptor
        .file_name()
        .and_then(file_suffix)
        .filter(|suffix| suffix != UNKNOWN_CATEGORY);

    if let Some(suffix) = suffix {
        let kind = kind_for_suffix(&suffix).or_else(|| kind_for_category(&suffix));
        let category = kind.map_or(suffix, |k| k.category().to_string());
        return Classification {
            category,
            kind,
            streamable: kind.is_some_and(MediaKind::is_streamable) || mime_streamable,
            source: ClassificationSource::Suffix,
        };
    }

    // octet-stream says nothing beyond "bytes"
    let mime = mime.filter(|(top, sub)| top != UNKNOWN_CATEGORY && !(top == "application" && sub == "octet-stream"));

    match mime {
        Some((top, _)) => Classification {
            category: mime_kind.map_or(top, |k| k.category().to_string()),
            kind: mime_kind,
            streamable: mime_streamable,
            source: ClassificationSource::Mime,
        },
        None => Classification {
            category: UNKNOWN_CATEGORY.to_string(),
            kind: None,
            streamable: false,
            source: ClassificationSource::Unknown,
        },
    }
}

/// Category key a file is counted under.
#[must_use]
pub fn extension_category(descriptor: &FileDescriptor) -> String {
    classify(descriptor).category
}

#[must_use]
pub fn is_streamable(descriptor: &FileDescriptor) -> bool {
    classify(descriptor).streamable
}

#[must_use]
pub fn is_archive(name: &str) -> bool {
    file_suffix(name).as_deref().and_then(kind_for_suffix) == Some(MediaKind::Archive)
}
