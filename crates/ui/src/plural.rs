/// CLDR plural categories. `Zero` is only chosen when a catalog has an explicit zero form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PluralCategory {
    Zero,
    One,
    Few,
    Many,
    Other,
}

/// Category of an integer count under the language's cardinal rules.
#[must_use]
pub fn plural_category(language: &str, n: u64) -> PluralCategory {
    match language {
        // No grammatical number.
        "ja" | "zh" | "ko" | "th" | "vi" | "id" => PluralCategory::Other,
        "fr" | "pt" => {
            if n <= 1 {
                PluralCategory::One
            } else {
                PluralCategory::Other
            }
        }
        "ru" | "uk" | "be" | "sr" | "hr" => slavic_east(n),
        "pl" => polish(n),
        "cs" | "sk" => match n {
            1 => PluralCategory::One,
            2..=4 => PluralCategory::Few,
            _ => PluralCategory::Other,
        },
        _ => {
            if n == 1 {
                PluralCategory::One
            } else {
                PluralCategory::Other
            }
        }
    }
}

fn slavic_east(n: u64) -> PluralCategory {
    let (mod10, mod100) = (n % 10, n % 100);
    if mod10 == 1 && mod100 != 11 {
        PluralCategory::One
    } else if (2..=4).contains(&mod10) && !(12..=14).contains(&mod100) {
        PluralCategory::Few
    } else {
        PluralCategory::Many
    }
}

fn polish(n: u64) -> PluralCategory {
    let (mod10, mod100) = (n % 10, n % 100);
    if n == 1 {
        PluralCategory::One
    } else if (2..=4).contains(&mod10) && !(12..=14).contains(&mod100) {
        PluralCategory::Few
    } else {
        PluralCategory::Many
    }
}
