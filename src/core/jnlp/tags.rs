// ─── Tag Table ───
// The manifest vocabulary and the parent each tag must appear under.

use std::fmt;

use super::parser::ParseError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Tag {
    AllPermissions,
    AppletDesc,
    ApplicationDesc,
    Argument,
    ComponentDesc,
    Description,
    ExtDownload,
    Extension,
    Homepage,
    Icon,
    Information,
    InstallerDesc,
    J2eeApplicationClientPermissions,
    J2se,
    Jar,
    Jnlp,
    Jre,
    Nativelib,
    OfflineAllowed,
    Package,
    Param,
    Property,
    Resources,
    Security,
    Title,
    Vendor,
}

/// `(tag, name, parent)`, sorted by name. `None` is the document level.
static TAGS: [(Tag, &str, Option<Tag>); 26] = [
    (Tag::AllPermissions, "all-permissions", Some(Tag::Security)),
    (Tag::AppletDesc, "applet-desc", Some(Tag::Jnlp)),
    (Tag::ApplicationDesc, "application-desc", Some(Tag::Jnlp)),
    (Tag::Argument, "argument", Some(Tag::ApplicationDesc)),
    (Tag::ComponentDesc, "component-desc", Some(Tag::Jnlp)),
    (Tag::Description, "description", Some(Tag::Information)),
    (Tag::ExtDownload, "ext-download", Some(Tag::Extension)),
    (Tag::Extension, "extension", Some(Tag::Resources)),
    (Tag::Homepage, "homepage", Some(Tag::Information)),
    (Tag::Icon, "icon", Some(Tag::Information)),
    (Tag::Information, "information", Some(Tag::Jnlp)),
    (Tag::InstallerDesc, "installer-desc", Some(Tag::Jnlp)),
    (
        Tag::J2eeApplicationClientPermissions,
        "j2ee-application-client-permissions",
        Some(Tag::Security),
    ),
    (Tag::J2se, "j2se", Some(Tag::Resources)),
    (Tag::Jar, "jar", Some(Tag::Resources)),
    (Tag::Jnlp, "jnlp", None),
    (Tag::Jre, "jre", Some(Tag::Resources)),
    (Tag::Nativelib, "nativelib", Some(Tag::Resources)),
    (Tag::OfflineAllowed, "offline-allowed", Some(Tag::Information)),
    (Tag::Package, "package", Some(Tag::Resources)),
    (Tag::Param, "param", Some(Tag::AppletDesc)),
    (Tag::Property, "property", Some(Tag::Resources)),
    (Tag::Resources, "resources", Some(Tag::Jnlp)),
    (Tag::Security, "security", Some(Tag::Jnlp)),
    (Tag::Title, "title", Some(Tag::Information)),
    (Tag::Vendor, "vendor", Some(Tag::Information)),
];

impl Tag {
    /// Case-sensitive lookup; unknown names yield `None`.
    pub fn from_name(name: &[u8]) -> Option<Tag> {
        TAGS.binary_search_by(|(_, candidate, _)| candidate.as_bytes().cmp(name))
            .ok()
            .map(|i| TAGS[i].0)
    }

    pub fn name(self) -> &'static str {
        TAGS[self.index()].1
    }

    /// The state this tag must be entered from.
    pub fn parent(self) -> Option<Tag> {
        TAGS[self.index()].2
    }

    // Variants are declared in table order.
    fn index(self) -> usize {
        self as usize
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// One step of the nesting state machine. Entering requires the current state
/// to be the tag's parent; leaving requires the current state to be the tag.
pub fn transition(state: Option<Tag>, tag: Tag, entering: bool) -> Result<Option<Tag>, ParseError> {
    if entering {
        if state != tag.parent() {
            return Err(ParseError::Misplaced { tag: tag.name() });
        }
        Ok(Some(tag))
    } else {
        if state != Some(tag) {
            return Err(ParseError::UnmatchedEnd { tag: tag.name() });
        }
        Ok(tag.parent())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn table_is_sorted_and_indexed_by_variant() {
        for window in TAGS.windows(2) {
            assert!(window[0].1 < window[1].1, "{} out of order", window[1].1);
        }
        for (i, (tag, name, _)) in TAGS.iter().enumerate() {
            assert_eq!(tag.index(), i, "{name}");
            assert_eq!(Tag::from_name(name.as_bytes()), Some(*tag));
        }
    }

    #[test]
    fn unknown_and_differently_cased_names_are_ignored() {
        assert_eq!(Tag::from_name(b"shortcut"), None);
        assert_eq!(Tag::from_name(b"JNLP"), None);
        assert_eq!(Tag::from_name(b""), None);
    }

    #[test]
    fn nesting_walk() {
        let mut state = None;
        for tag in [Tag::Jnlp, Tag::Resources, Tag::Jar] {
            state = transition(state, tag, true).unwrap();
        }
        assert_eq!(state, Some(Tag::Jar));

        for tag in [Tag::Jar, Tag::Resources, Tag::Jnlp] {
            state = transition(state, tag, false).unwrap();
        }
        assert_eq!(state, None);
    }

    #[test]
    fn misplaced_and_orphaned_tags_fail() {
        assert!(matches!(
            transition(None, Tag::Jar, true),
            Err(ParseError::Misplaced { tag: "jar" })
        ));
        assert!(matches!(
            transition(Some(Tag::Information), Tag::Jar, true),
            Err(ParseError::Misplaced { tag: "jar" })
        ));
        assert!(matches!(
            transition(Some(Tag::Resources), Tag::Jar, false),
            Err(ParseError::UnmatchedEnd { tag: "jar" })
        ));
    }
}
