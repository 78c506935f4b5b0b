use ahash::AHashMap;
use std::sync::LazyLock;

use crate::plural::PluralCategory;

/// Message identifiers used by the statistics report.
///
/// Templates may contain `{size}`, `{count}` and `{category}` placeholders.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageKey {
    TotalSize,
    TotalDownloadSize,
    FileCount,
    StreamableCount,
    ExtensionsHeader,
    ExtensionLine,
    NoFiles,
}

impl MessageKey {
    /// Last-resort English text, used only if a catalog has no entry even for the default language.
    #[must_use]
    pub const fn fallback_text(self) -> &'static str {
        match self {
            Self::TotalSize => "Total file size: {size}",
            Self::TotalDownloadSize => "Total download size: {size}",
            Self::FileCount => "Number of files uploaded: {count}",
            Self::StreamableCount => "Streamable files: {count}",
            Self::ExtensionsHeader => "Extensions:",
            Self::ExtensionLine => "{category}: {count}",
            Self::NoFiles => "No files uploaded yet.",
        }
    }
}

/// Translation source consulted by the formatter.
pub trait Catalog: Send + Sync {
    /// Whether templates exist for `language`.
    fn supports(&self, language: &str) -> bool;

    /// Template for `key` in the given plural form, if the catalog defines that form.
    fn template(&self, key: MessageKey, language: &str, category: PluralCategory) -> Option<&str>;
}

#[derive(Debug, Clone, Copy)]
struct Forms {
    zero: Option<&'static str>,
    one: Option<&'static str>,
    other: &'static str,
}

impl Forms {
    const fn invariant(text: &'static str) -> Self {
        Self {
            zero: None,
            one: None,
            other: text,
        }
    }

    const fn get(&self, category: PluralCategory) -> Option<&'static str> {
        match category {
            PluralCategory::Zero => self.zero,
            PluralCategory::One => self.one,
            PluralCategory::Few | PluralCategory::Many => None,
            PluralCategory::Other => Some(self.other),
        }
    }
}

static ENGLISH: &[(MessageKey, Forms)] = &[
    (MessageKey::TotalSize, Forms::invariant("Total file size: {size}")),
    (MessageKey::TotalDownloadSize, Forms::invariant("Total download size: {size}")),
    (
        MessageKey::FileCount,
        Forms {
            zero: Some("Number of files uploaded: none"),
            one: Some("Number of files uploaded: {count} file"),
            other: "Number of files uploaded: {count} files",
        },
    ),
    (
        MessageKey::StreamableCount,
        Forms {
            zero: Some("Streamable files: none"),
            one: Some("Streamable files: {count} file"),
            other: "Streamable files: {count} files",
        },
    ),
    (MessageKey::ExtensionsHeader, Forms::invariant("Extensions:")),
    (
        MessageKey::ExtensionLine,
        Forms {
            zero: None,
            one: Some("{category}: {count} file"),
            other: "{category}: {count} files",
        },
    ),
    (MessageKey::NoFiles, Forms::invariant("No files uploaded yet.")),
];

static ITALIAN: &[(MessageKey, Forms)] = &[
    (MessageKey::TotalSize, Forms::invariant("Dimensione totale dei file: {size}")),
    (
        MessageKey::TotalDownloadSize,
        Forms::invariant("Dimensione totale dei download: {size}"),
    ),
    (
        MessageKey::FileCount,
        Forms {
            zero: Some("Numero di file caricati: nessuno"),
            one: Some("Numero di file caricati: {count} file"),
            other: "Numero di file caricati: {count} file",
        },
    ),
    (
        MessageKey::StreamableCount,
        Forms {
            zero: Some("File riproducibili: nessuno"),
            one: Some("File riproducibili: {count} file"),
            other: "File riproducibili: {count} file",
        },
    ),
    (MessageKey::ExtensionsHeader, Forms::invariant("Estensioni:")),
    (
        MessageKey::ExtensionLine,
        Forms {
            zero: None,
            one: Some("{category}: {count} file"),
            other: "{category}: {count} file",
        },
    ),
    (MessageKey::NoFiles, Forms::invariant("Nessun file caricato.")),
];

static BUILTIN: LazyLock<AHashMap<&'static str, AHashMap<MessageKey, Forms>>> = LazyLock::new(|| {
    [("en", ENGLISH), ("it", ITALIAN)]
        .into_iter()
        .map(|(language, entries)| (language, entries.iter().copied().collect()))
        .collect()
});

/// Templates shipped with the binary: English and Italian.
#[derive(Debug, Clone, Copy, Default)]
pub struct BuiltinCatalog;

impl BuiltinCatalog {
    #[must_use]
    pub fn languages() -> Vec<&'static str> {
        let mut languages: Vec<_> = BUILTIN.keys().copied().collect();
        languages.sort_unstable();
        languages
    }
}

impl Catalog for BuiltinCatalog {
    fn supports(&self, language: &str) -> bool {
        BUILTIN.contains_key(language)
    }

    fn template(&self, key: MessageKey, language: &str, category: PluralCategory) -> Option<&str> {
        BUILTIN.get(language)?.get(&key)?.get(category)
    }
}
