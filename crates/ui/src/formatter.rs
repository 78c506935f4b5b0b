use filestats_models::{Locale, StatsRecord};
use filestats_utils::{format_bytes_localized, format_count};
use tracing::warn;

use crate::catalog::{Catalog, MessageKey};
use crate::plural::{PluralCategory, plural_category};

/// A rendered report plus the side-channel signals of rendering it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rendered {
    pub text: String,
    /// The requested language had no templates; the default language was used instead.
    pub locale_fallback: bool,
    /// Language whose templates produced `text`.
    pub language: String,
}

/// Picks the template for `key` and `count`.
///
/// A zero count prefers an explicit zero form. Missing forms fall back to `Other`, then to the
/// default language, and finally to the key's built-in English text.
#[must_use]
pub fn translate<'a>(catalog: &'a dyn Catalog, key: MessageKey, language: &str, count: u64) -> &'a str {
    let wanted = plural_category(language, count);
    let lookup = |language: &str| {
        (count == 0)
            .then(|| catalog.template(key, language, PluralCategory::Zero))
            .flatten()
            .or_else(|| catalog.template(key, language, wanted))
            .or_else(|| catalog.template(key, language, PluralCategory::Other))
    };

    lookup(language)
        .or_else(|| lookup(Locale::DEFAULT_LANGUAGE))
        .unwrap_or_else(|| key.fallback_text())
}

/// Renders `record` for `locale`.
///
/// Numbers always use the requested locale's separators; only the wording falls back.
#[must_use]
pub fn format_stats(record: &StatsRecord, locale: &Locale, catalog: &dyn Catalog) -> Rendered {
    let requested = locale.language();
    let locale_fallback = !catalog.supports(requested);
    let language = if locale_fallback {
        warn!(
            "No translation for locale {}, falling back to {}",
            locale,
            Locale::DEFAULT_LANGUAGE
        );
        Locale::DEFAULT_LANGUAGE
    } else {
        requested
    };

    let size = |bytes| format_bytes_localized(bytes, locale);
    let line = |key, count: u64| {
        translate(catalog, key, language, count).replace("{count}", &format_count(count, locale))
    };

    let mut lines = vec![
        translate(catalog, MessageKey::TotalSize, language, record.total_size)
            .replace("{size}", &size(record.total_size)),
        translate(catalog, MessageKey::TotalDownloadSize, language, record.total_download_size)
            .replace("{size}", &size(record.total_download_size)),
        line(MessageKey::FileCount, record.file_count),
        line(MessageKey::StreamableCount, record.streamable_count),
        translate(catalog, MessageKey::ExtensionsHeader, language, 1).to_string(),
    ];

    let extensions = record.sorted_extensions();
    if extensions.is_empty() {
        lines.push(translate(catalog, MessageKey::NoFiles, language, 0).to_string());
    } else {
        lines.extend(
            extensions
                .into_iter()
                .map(|(category, count)| line(MessageKey::ExtensionLine, count).replace("{category}", category)),
        );
    }

    Rendered {
        text: lines.join("\n"),
        locale_fallback,
        language: language.to_string(),
    }
}
