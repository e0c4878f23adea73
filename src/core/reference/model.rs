// ─── Reference ───
// Versioned, lazily or eagerly fetched pointer to a remote artifact.

use std::fmt;

use reqwest::Url;
use serde::{Deserialize, Serialize};

use crate::core::version::{parse_versions, Version};

/// What a referenced archive is used for once cached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ReferenceKind {
    /// A plain jar placed on the classpath.
    #[serde(rename = "resource")]
    Jar,
    /// A jar whose top-level entries are extracted into the library directory.
    NativeLibrary,
}

#[derive(Debug, Clone)]
pub struct Reference {
    url: Url,
    versions: Vec<Version>,
    lazy: bool,
    kind: ReferenceKind,
}

impl Reference {
    /// An eager, unversioned jar reference.
    pub fn new(url: Url) -> Self {
        Self::with_versions(url, parse_versions(None), false)
    }

    /// Build a reference. An empty version list is replaced by the single
    /// empty version-id.
    pub fn with_versions(url: Url, versions: Vec<Version>, lazy: bool) -> Self {
        let versions = if versions.is_empty() {
            vec![Version::empty()]
        } else {
            versions
        };

        Self {
            url,
            versions,
            lazy,
            kind: ReferenceKind::Jar,
        }
    }

    /// Build from the raw `version` attribute of a tag.
    pub fn parse(url: Url, versions: Option<&str>, lazy: bool) -> Self {
        Self::with_versions(url, parse_versions(versions), lazy)
    }

    pub fn native(mut self) -> Self {
        self.kind = ReferenceKind::NativeLibrary;
        self
    }

    pub fn with_kind(mut self, kind: ReferenceKind) -> Self {
        self.kind = kind;
        self
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    pub fn versions(&self) -> &[Version] {
        &self.versions
    }

    pub fn is_lazy(&self) -> bool {
        self.lazy
    }

    pub fn kind(&self) -> ReferenceKind {
        self.kind
    }

    pub fn is_native(&self) -> bool {
        self.kind == ReferenceKind::NativeLibrary
    }

    /// True if the two version sets share a member.
    pub fn versions_intersect(&self, other: &Reference) -> bool {
        self.versions
            .iter()
            .any(|mine| other.versions.iter().any(|theirs| mine == theirs))
    }
}

/// Same URL, same laziness, intersecting version sets. The kind is not part
/// of identity.
impl PartialEq for Reference {
    fn eq(&self, other: &Self) -> bool {
        self.url == other.url && self.lazy == other.lazy && self.versions_intersect(other)
    }
}

impl fmt::Display for Reference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.url)?;

        let versions: Vec<String> = self
            .versions
            .iter()
            .filter(|v| !v.is_empty())
            .map(ToString::to_string)
            .collect();
        if !versions.is_empty() {
            write!(f, " [{}]", versions.join(" "))?;
        }
        if self.lazy {
            f.write_str(" (lazy)")?;
        }
        Ok(())
    }
}

/// Split a space-delimited key list. A backslash makes the next character
/// literal (so `Windows\ XP` is one key); a trailing lone backslash is kept
/// as is. Empty keys are dropped.
pub fn parse_keys(input: &str) -> Vec<String> {
    let mut keys = Vec::new();
    let mut current = String::new();
    let mut chars = input.chars();

    while let Some(c) = chars.next() {
        match c {
            '\\' => match chars.next() {
                Some(escaped) => current.push(escaped),
                None => current.push('\\'),
            },
            ' ' => {
                if !current.is_empty() {
                    keys.push(std::mem::take(&mut current));
                }
            }
            other => current.push(other),
        }
    }

    if !current.is_empty() {
        keys.push(current);
    }
    keys
}
