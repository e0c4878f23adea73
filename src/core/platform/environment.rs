// ─── Environment ───
// The runtime facts conditional <resources> blocks are matched against.

use super::locale::Locale;

/// Operating system name, architecture and default locale of the running
/// process, in the vocabulary descriptors use (`os="Windows"`, `arch="x86_64"`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Environment {
    pub os_name: String,
    pub os_arch: String,
    pub locale: Locale,
}

impl Environment {
    pub fn new(os_name: impl Into<String>, os_arch: impl Into<String>, locale: Locale) -> Self {
        Self {
            os_name: os_name.into(),
            os_arch: os_arch.into(),
            locale,
        }
    }

    /// Detect the current platform.
    pub fn current() -> Self {
        Self::new(
            current_os_name(),
            std::env::consts::ARCH,
            Locale::from_env(),
        )
    }

    /// True if any key is a prefix of the runtime OS name.
    pub fn matches_os(&self, keys: &[String]) -> bool {
        keys.iter().any(|key| self.os_name.starts_with(key.as_str()))
    }

    /// True if any key is a prefix of the runtime architecture.
    pub fn matches_arch(&self, keys: &[String]) -> bool {
        keys.iter().any(|key| self.os_arch.starts_with(key.as_str()))
    }

    /// True if a listed locale equals the variant, country or language form
    /// of the default locale.
    pub fn matches_locale(&self, keys: &[String]) -> bool {
        let candidates = [
            self.locale.variant_locale(),
            self.locale.country_locale(),
            self.locale.language_locale(),
        ];

        keys.iter()
            .map(|key| Locale::parse(key))
            .any(|listed| candidates.contains(&listed))
    }
}

impl Default for Environment {
    fn default() -> Self {
        Self::current()
    }
}

/// OS name as Java-based descriptors spell it.
fn current_os_name() -> &'static str {
    match std::env::consts::OS {
        "linux" => "Linux",
        "macos" => "Mac OS X",
        "windows" => "Windows",
        "freebsd" => "FreeBSD",
        "solaris" => "SunOS",
        other => other,
    }
}
