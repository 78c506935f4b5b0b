use filestats_models::Locale;

use crate::numbers::NumberFormat;

const UNITS: &[&str] = &["B", "KB", "MB", "GB", "TB"];

#[allow(clippy::cast_precision_loss)]
fn scale(bytes: u64) -> (f64, usize) {
    let mut size = bytes as f64;
    let mut unit_index = 0;

    while size >= 1024.0 && unit_index < UNITS.len() - 1 {
        size /= 1024.0;
        unit_index += 1;
    }

    // 1023.999 KB would print as "1024.00 KB"; move to the next unit instead.
    if unit_index > 0 && unit_index < UNITS.len() - 1 && (size * 100.0).round() >= 102_400.0 {
        size /= 1024.0;
        unit_index += 1;
    }

    (size, unit_index)
}

#[must_use]
pub fn format_bytes(bytes: u64) -> String {
    render(bytes, NumberFormat::POINT)
}

/// Same scale as [`format_bytes`], with the locale's separators ("1,50 KB" in Italian).
#[must_use]
pub fn format_bytes_localized(bytes: u64, locale: &Locale) -> String {
    render(bytes, NumberFormat::for_locale(locale))
}

fn render(bytes: u64, format: NumberFormat) -> String {
    let (size, unit_index) = scale(bytes);

    if unit_index == 0 {
        format!("{} {}", format.group_digits(bytes), UNITS[unit_index])
    } else {
        format!("{} {}", format.fixed(size, 2), UNITS[unit_index])
    }
}
