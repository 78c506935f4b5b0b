use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Language (and optional region) a report is rendered in.
///
/// Accepts BCP 47 style tags (`pt-BR`) as well as POSIX locale strings (`it_IT.UTF-8`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "String", from = "String")]
pub struct Locale {
    language: String,
    region: Option<String>,
}

impl Locale {
    pub const DEFAULT_LANGUAGE: &'static str = "en";

    #[must_use]
    pub fn parse(tag: &str) -> Self {
        // Drop POSIX codeset and modifier: "it_IT.UTF-8@euro" -> "it_IT"
        let tag = tag.split(['.', '@']).next().unwrap_or_default().trim();
        let mut parts = tag.split(['-', '_']).filter(|p| !p.is_empty());

        let language = parts
            .next()
            .map(str::to_ascii_lowercase)
            .filter(|l| !l.is_empty())
            .unwrap_or_else(|| Self::DEFAULT_LANGUAGE.to_string());
        let region = parts
            .next()
            .filter(|r| r.len() == 2 && r.chars().all(|c| c.is_ascii_alphabetic()))
            .map(str::to_ascii_uppercase);

        Self { language, region }
    }

    #[must_use]
    pub fn language(&self) -> &str {
        &self.language
    }

    #[must_use]
    pub fn region(&self) -> Option<&str> {
        self.region.as_deref()
    }
}

impl Default for Locale {
    fn default() -> Self {
        Self {
            language: Self::DEFAULT_LANGUAGE.to_string(),
            region: None,
        }
    }
}

impl FromStr for Locale {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::parse(s))
    }
}

impl From<String> for Locale {
    fn from(tag: String) -> Self {
        Self::parse(&tag)
    }
}

impl From<Locale> for String {
    fn from(locale: Locale) -> Self {
        locale.to_string()
    }
}

impl fmt::Display for Locale {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.region {
            Some(region) => write!(f, "{}-{}", self.language, region),
            None => write!(f, "{}", self.language),
        }
    }
}
