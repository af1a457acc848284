// src/models/language.rs

//! Supported publication languages.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::AppError;

/// Language of a conference or talk, keyed by the site's `lang` code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    Eng,
    Spa,
}

impl Language {
    pub const ALL: [Language; 2] = [Language::Eng, Language::Spa];

    /// The code used in URLs and in the state store.
    pub fn code(&self) -> &'static str {
        match self {
            Language::Eng => "eng",
            Language::Spa => "spa",
        }
    }

    /// Detect the language from a URL's `lang` query parameter.
    pub fn from_url(url: &str) -> Option<Self> {
        let parsed = url::Url::parse(url).ok()?;
        parsed
            .query_pairs()
            .find(|(key, _)| key == "lang")
            .and_then(|(_, value)| value.parse().ok())
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for Language {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "eng" | "en" => Ok(Language::Eng),
            "spa" | "es" => Ok(Language::Spa),
            other => Err(AppError::validation(format!("unsupported language '{other}'"))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_codes() {
        assert_eq!("eng".parse::<Language>().unwrap(), Language::Eng);
        assert_eq!("SPA".parse::<Language>().unwrap(), Language::Spa);
        assert!("fra".parse::<Language>().is_err());
    }

    #[test]
    fn test_from_url() {
        assert_eq!(
            Language::from_url("https://example.org/study/general-conference/2024/04?lang=spa"),
            Some(Language::Spa)
        );
        assert_eq!(Language::from_url("https://example.org/study"), None);
    }
}
