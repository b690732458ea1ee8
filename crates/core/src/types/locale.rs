//! Recipient locale for push message selection.

use core::fmt;
use core::str::FromStr;

use serde::{Deserialize, Serialize};

/// Errors that can occur when parsing a [`Locale`].
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum LocaleError {
    /// The input string is empty.
    #[error("locale cannot be empty")]
    Empty,
    /// The input is not a two or three letter language code.
    #[error("locale must be a 2-3 letter language code, got {0:?}")]
    Malformed(String),
}

/// A lowercase ISO 639 language code (`ro`, `ru`, `en`, ...).
///
/// Region subtags are stripped on parse (`ru-RU` → `ru`) because message
/// variants are only keyed by language.
///
/// ```
/// use orderdesk_core::Locale;
///
/// assert_eq!(Locale::parse("RU-ru").unwrap().as_str(), "ru");
/// assert!(Locale::parse("").is_err());
/// assert!(Locale::parse("russian").is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Locale(String);

impl Locale {
    /// Parse and normalize a locale tag.
    ///
    /// # Errors
    ///
    /// Returns an error if the primary subtag is empty or not 2-3 ASCII letters.
    pub fn parse(s: &str) -> Result<Self, LocaleError> {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            return Err(LocaleError::Empty);
        }

        let primary = trimmed
            .split(['-', '_'])
            .next()
            .unwrap_or_default()
            .to_ascii_lowercase();

        if !(2..=3).contains(&primary.len()) || !primary.chars().all(|c| c.is_ascii_lowercase()) {
            return Err(LocaleError::Malformed(s.to_owned()));
        }

        Ok(Self(primary))
    }

    /// Returns the language code.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Locale {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for Locale {
    type Err = LocaleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for Locale {
    type Error = LocaleError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<Locale> for String {
    fn from(locale: Locale) -> Self {
        locale.0
    }
}

impl AsRef<str> for Locale {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
