use filestats_models::Locale;

/// Decimal and digit-grouping separators of a locale.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NumberFormat {
    pub decimal: char,
    pub group: char,
}

impl NumberFormat {
    pub const POINT: Self = Self {
        decimal: '.',
        group: ',',
    };

    #[must_use]
    pub fn for_locale(locale: &Locale) -> Self {
        match (locale.language(), locale.region()) {
            ("de" | "it" | "fr", Some("CH")) => Self {
                decimal: '.',
                group: '\'',
            },
            ("de" | "it" | "es" | "pt" | "nl" | "id" | "da" | "tr" | "el" | "ro" | "hr" | "sl" | "sr", _) => Self {
                decimal: ',',
                group: '.',
            },
            (
                "fr" | "ru" | "uk" | "pl" | "cs" | "sk" | "sv" | "fi" | "nb" | "no" | "hu" | "bg" | "lt" | "lv"
                | "et",
                _,
            ) => Self {
                decimal: ',',
                group: '\u{a0}',
            },
            _ => Self::POINT,
        }
    }

    /// Groups the digits of `n` in threes.
    #[must_use]
    pub fn group_digits(&self, n: u64) -> String {
        let digits = n.to_string();
        let mut out = String::with_capacity(digits.len() + digits.len() / 3);
        for (i, c) in digits.chars().enumerate() {
            if i > 0 && (digits.len() - i) % 3 == 0 {
                out.push(self.group);
            }
            out.push(c);
        }
        out
    }

    /// Fixed-point rendering with `decimals` fractional digits.
    #[must_use]
    pub fn fixed(&self, value: f64, decimals: usize) -> String {
        let rendered = format!("{value:.decimals$}");
        if self.decimal == '.' {
            rendered
        } else {
            rendered.replace('.', &self.decimal.to_string())
        }
    }
}

/// Count rendered with the locale's grouping separator.
#[must_use]
pub fn format_count(n: u64, locale: &Locale) -> String {
    NumberFormat::for_locale(locale).group_digits(n)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_group_digits() {
        let f = NumberFormat::POINT;
        assert_eq!(f.group_digits(0), "0");
        assert_eq!(f.group_digits(999), "999");
        assert_eq!(f.group_digits(1000), "1,000");
        assert_eq!(f.group_digits(1_234_567), "1,234,567");
        assert_eq!(f.group_digits(u64::MAX), "18,446,744,073,709,551,615");
    }

    #[test]
    fn test_format_count_by_locale() {
        assert_eq!(format_count(1_234_567, &Locale::parse("en")), "1,234,567");
        assert_eq!(format_count(1_234_567, &Locale::parse("it")), "1.234.567");
        assert_eq!(format_count(1_234_567, &Locale::parse("fr")), "1\u{a0}234\u{a0}567");
        assert_eq!(format_count(1_234_567, &Locale::parse("de-CH")), "1'234'567");
        assert_eq!(format_count(12, &Locale::parse("xx")), "12");
    }

    #[test]
    fn test_fixed() {
        assert_eq!(NumberFormat::POINT.fixed(1.5, 2), "1.50");
        assert_eq!(NumberFormat::for_locale(&Locale::parse("it")).fixed(1.5, 2), "1,50");
        assert_eq!(NumberFormat::for_locale(&Locale::parse("it")).fixed(3.0, 0), "3");
    }
}
