// ─── Information ───
// Locale-resolved title, vendor, description, icons and homepage of a descriptor.
//
// Every locale-sensitive field is resolved independently through
// (language, country, variant) → (language, country) → (language) → default.

use std::collections::HashMap;
use std::sync::Arc;

use reqwest::Url;

use crate::core::platform::Locale;
use crate::core::reference::Reference;

/// `kind` attribute of `<description>`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum DescriptionKind {
    OneLine,
    Short,
    Tooltip,
    Other(String),
}

impl DescriptionKind {
    /// `None` for the unqualified (default) description.
    pub fn parse(kind: Option<&str>) -> Option<Self> {
        match kind? {
            "" => None,
            "one-line" => Some(DescriptionKind::OneLine),
            "short" => Some(DescriptionKind::Short),
            "tooltip" => Some(DescriptionKind::Tooltip),
            other => Some(DescriptionKind::Other(other.to_string())),
        }
    }
}

/// `kind` attribute of `<icon>`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum IconKind {
    Default,
    Selected,
    Disabled,
    Rollover,
    Splash,
    Shortcut,
    Other(String),
}

impl IconKind {
    pub fn parse(kind: Option<&str>) -> Self {
        match kind.unwrap_or_default() {
            "" | "default" => IconKind::Default,
            "selected" => IconKind::Selected,
            "disabled" => IconKind::Disabled,
            "rollover" => IconKind::Rollover,
            "splash" => IconKind::Splash,
            "shortcut" => IconKind::Shortcut,
            other => IconKind::Other(other.to_string()),
        }
    }
}

/// Location and declared geometry of an icon; the image itself is not loaded.
#[derive(Debug, Clone)]
pub struct IconInfo {
    pub reference: Reference,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub depth: Option<u32>,
    pub size: Option<u64>,
}

/// Human-facing metadata for one locale.
#[derive(Debug, Clone, Default)]
pub struct LocaleInfo {
    pub title: Option<String>,
    pub vendor: Option<String>,
    pub homepage: Option<Url>,
    pub offline_allowed: bool,
    /// Description without a `kind`.
    pub description: Option<String>,
    pub descriptions: HashMap<DescriptionKind, String>,
    pub icons: HashMap<IconKind, IconInfo>,
}

impl LocaleInfo {
    /// Description of the given kind, else the unqualified one.
    pub fn description(&self, kind: Option<&DescriptionKind>) -> Option<&str> {
        kind.and_then(|k| self.descriptions.get(k))
            .or(self.description.as_ref())
            .map(String::as_str)
    }

    pub fn set_description(&mut self, kind: Option<DescriptionKind>, text: String) {
        match kind {
            Some(kind) => {
                self.descriptions.insert(kind, text);
            }
            None => self.description = Some(text),
        }
    }

    /// Icon of the given kind, else the default icon.
    pub fn icon(&self, kind: &IconKind) -> Option<&IconInfo> {
        self.icons
            .get(kind)
            .or_else(|| self.icons.get(&IconKind::Default))
    }
}

#[derive(Debug, Clone)]
pub struct Information {
    locale: Locale,
    default: Option<Arc<LocaleInfo>>,
    locales: HashMap<Locale, Arc<LocaleInfo>>,
}

impl Information {
    /// Empty information resolved against `locale`.
    pub fn new(locale: Locale) -> Self {
        Self {
            locale,
            default: None,
            locales: HashMap::new(),
        }
    }

    /// The locale lookups are resolved against.
    pub fn locale(&self) -> &Locale {
        &self.locale
    }

    pub fn set_default(&mut self, info: Arc<LocaleInfo>) {
        self.default = Some(info);
    }

    pub fn default_info(&self) -> Option<&Arc<LocaleInfo>> {
        self.default.as_ref()
    }

    /// Map `locale` to `info`, or clear it when `info` is `None`.
    pub fn set_locale_info(&mut self, locale: Locale, info: Option<Arc<LocaleInfo>>) {
        match info {
            Some(info) => {
                self.locales.insert(locale, info);
            }
            None => {
                self.locales.remove(&locale);
            }
        }
    }

    pub fn locale_info(&self, locale: &Locale) -> Option<&Arc<LocaleInfo>> {
        self.locales.get(locale)
    }

    pub fn locales(&self) -> impl Iterator<Item = &Locale> {
        self.locales.keys()
    }

    pub fn default_title(&self) -> Option<&str> {
        self.default.as_ref()?.title.as_deref()
    }

    pub fn default_vendor(&self) -> Option<&str> {
        self.default.as_ref()?.vendor.as_deref()
    }

    /// Offline support as declared by the default block.
    pub fn offline_allowed(&self) -> bool {
        self.default.as_ref().is_some_and(|info| info.offline_allowed)
    }

    pub fn title(&self) -> Option<&str> {
        self.resolve(|info| info.title.as_deref())
    }

    pub fn vendor(&self) -> Option<&str> {
        self.resolve(|info| info.vendor.as_deref())
    }

    pub fn homepage(&self) -> Option<&Url> {
        self.resolve(|info| info.homepage.as_ref())
    }

    pub fn description(&self, kind: Option<&DescriptionKind>) -> Option<&str> {
        self.resolve(|info| info.description(kind))
    }

    pub fn icon(&self, kind: &IconKind) -> Option<&IconInfo> {
        self.resolve(|info| info.icon(kind))
    }

    pub fn default_icon(&self) -> Option<&IconInfo> {
        self.icon(&IconKind::Default)
    }

    /// First value produced along the locale chain, then from the default.
    fn resolve<'a, T: ?Sized>(
        &'a self,
        field: impl Fn(&'a LocaleInfo) -> Option<&'a T>,
    ) -> Option<&'a T> {
        self.locale
            .fallbacks()
            .iter()
            .filter_map(|locale| self.locales.get(locale))
            .find_map(|info| field(info.as_ref()))
            .or_else(|| self.default.as_deref().and_then(&field))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn info(title: Option<&str>, vendor: Option<&str>) -> Arc<LocaleInfo> {
        Arc::new(LocaleInfo {
            title: title.map(str::to_string),
            vendor: vendor.map(str::to_string),
            ..Default::default()
        })
    }

    fn icon(url: &str) -> IconInfo {
        IconInfo {
            reference: Reference::new(Url::parse(url).unwrap()),
            width: Some(32),
            height: Some(32),
            depth: None,
            size: None,
        }
    }

    #[test]
    fn fields_resolve_independently() {
        let mut information = Information::new(Locale::parse("de_CH"));
        information.set_default(info(Some("Demo"), Some("Acme")));
        information.set_locale_info(Locale::parse("de"), Some(info(Some("Vorführung"), None)));

        assert_eq!(information.title(), Some("Vorführung"));
        // no `de` vendor: straight to default
        assert_eq!(information.vendor(), Some("Acme"));
        assert_eq!(information.default_title(), Some("Demo"));
    }

    #[test]
    fn most_specific_locale_wins() {
        let mut information = Information::new(Locale::parse("de_CH"));
        information.set_default(info(Some("Demo"), Some("Acme")));
        information.set_locale_info(Locale::parse("de"), Some(info(Some("de"), None)));
        information.set_locale_info(Locale::parse("de_CH"), Some(info(Some("de_CH"), None)));

        assert_eq!(information.title(), Some("de_CH"));

        information.set_locale_info(Locale::parse("de_CH"), None);
        assert_eq!(information.title(), Some("de"));
    }

    #[test]
    fn unrelated_locales_are_ignored() {
        let mut information = Information::new(Locale::parse("en_US"));
        information.set_default(info(Some("Demo"), Some("Acme")));
        information.set_locale_info(Locale::parse("fr"), Some(info(Some("Démo"), None)));

        assert_eq!(information.title(), Some("Demo"));
        assert_eq!(information.locales().count(), 1);
    }

    #[test]
    fn description_falls_back_to_unqualified() {
        let mut default = LocaleInfo::default();
        default.set_description(None, "A demo".into());
        default.set_description(Some(DescriptionKind::Short), "Short demo".into());

        let mut information = Information::new(Locale::parse("en"));
        information.set_default(Arc::new(default));

        assert_eq!(
            information.description(Some(&DescriptionKind::Short)),
            Some("Short demo")
        );
        assert_eq!(
            information.description(Some(&DescriptionKind::Tooltip)),
            Some("A demo")
        );
        assert_eq!(information.description(None), Some("A demo"));
    }

    #[test]
    fn icon_falls_back_to_default_kind() {
        let mut default = LocaleInfo::default();
        default.icons.insert(IconKind::Default, icon("http://x/icon.png"));
        default.icons.insert(IconKind::Splash, icon("http://x/splash.png"));

        let mut information = Information::new(Locale::parse("en"));
        information.set_default(Arc::new(default));

        let splash = information.icon(&IconKind::Splash).unwrap();
        assert_eq!(splash.reference.url().as_str(), "http://x/splash.png");

        let rollover = information.icon(&IconKind::Rollover).unwrap();
        assert_eq!(rollover.reference.url().as_str(), "http://x/icon.png");
        assert_eq!(information.default_icon().unwrap().width, Some(32));
    }

    #[test]
    fn kind_attributes_parse() {
        assert_eq!(DescriptionKind::parse(None), None);
        assert_eq!(DescriptionKind::parse(Some("one-line")), Some(DescriptionKind::OneLine));
        assert_eq!(IconKind::parse(None), IconKind::Default);
        assert_eq!(IconKind::parse(Some("shortcut")), IconKind::Shortcut);
        assert_eq!(IconKind::parse(Some("x-custom")), IconKind::Other("x-custom".into()));
    }
}
