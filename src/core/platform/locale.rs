// ─── Locale ───
// Language / country / variant triple used for <information> and <resources> matching.

use std::fmt;

/// A locale as written in a descriptor (`en`, `en_US`, `en_US_POSIX`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Locale {
    language: String,
    country: String,
    variant: String,
}

impl Locale {
    pub fn new(language: &str, country: &str, variant: &str) -> Self {
        Self {
            language: language.to_lowercase(),
            country: country.to_uppercase(),
            variant: variant.to_string(),
        }
    }

    /// Parse `language[_COUNTRY[_variant]]`. A `-` is accepted in place of `_`.
    pub fn parse(input: &str) -> Self {
        let mut parts = input.trim().splitn(3, ['_', '-']);
        let language = parts.next().unwrap_or_default();
        let country = parts.next().unwrap_or_default();
        let variant = parts.next().unwrap_or_default();
        Self::new(language, country, variant)
    }

    /// Locale of the current process, read from `LC_ALL`, `LC_MESSAGES` or `LANG`.
    ///
    /// Codeset and modifier suffixes (`.UTF-8`, `@euro`) are stripped; the
    /// `C` / `POSIX` locales and an unset environment map to `en`.
    pub fn from_env() -> Self {
        let raw = ["LC_ALL", "LC_MESSAGES", "LANG"]
            .iter()
            .filter_map(|key| std::env::var(key).ok())
            .find(|value| !value.trim().is_empty());

        match raw {
            Some(value) => Self::from_posix(&value),
            None => Self::new("en", "", ""),
        }
    }

    fn from_posix(value: &str) -> Self {
        let base = value
            .split(['.', '@'])
            .next()
            .unwrap_or_default();

        match base {
            "" | "C" | "POSIX" => Self::new("en", "", ""),
            other => Self::parse(other),
        }
    }

    pub fn language(&self) -> &str {
        &self.language
    }

    pub fn country(&self) -> &str {
        &self.country
    }

    pub fn variant(&self) -> &str {
        &self.variant
    }

    /// `language` only.
    pub fn language_locale(&self) -> Locale {
        Locale::new(&self.language, "", "")
    }

    /// `language_COUNTRY`.
    pub fn country_locale(&self) -> Locale {
        Locale::new(&self.language, &self.country, "")
    }

    /// The full `language_COUNTRY_variant` triple.
    pub fn variant_locale(&self) -> Locale {
        self.clone()
    }

    /// Lookup chain from most to least specific, without duplicates.
    pub fn fallbacks(&self) -> Vec<Locale> {
        let mut chain = vec![self.variant_locale()];
        for locale in [self.country_locale(), self.language_locale()] {
            if !chain.contains(&locale) {
                chain.push(locale);
            }
        }
        chain
    }
}

impl fmt::Display for Locale {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.language)?;
        if !self.country.is_empty() || !self.variant.is_empty() {
            write!(f, "_{}", self.country)?;
        }
        if !self.variant.is_empty() {
            write!(f, "_{}", self.variant)?;
        }
        Ok(())
    }
}
