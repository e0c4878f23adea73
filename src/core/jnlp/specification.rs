use std::fmt;

use reqwest::Url;

use crate::core::reference::Reference;
use crate::core::version::{parse_versions, Version};

/// Spec versions assumed when `<jnlp spec>` is absent.
pub const DEFAULT_SPEC_VERSIONS: &str = "1.0+";

/// The attributes of `<jnlp>`, kept as the descriptor's context.
#[derive(Debug, Clone, PartialEq)]
pub struct JnlpSpecification {
    reference: Option<Reference>,
    codebase: Option<Url>,
    spec: Option<Vec<Version>>,
}

impl JnlpSpecification {
    pub fn new(reference: Option<Reference>, codebase: Option<Url>, spec: Option<Vec<Version>>) -> Self {
        Self {
            reference,
            codebase,
            spec,
        }
    }

    /// The manifest's own `href`, if declared.
    pub fn reference(&self) -> Option<&Reference> {
        self.reference.as_ref()
    }

    pub fn declared_codebase(&self) -> Option<&Url> {
        self.codebase.as_ref()
    }

    /// Declared codebase, else the manifest `href`.
    pub fn codebase(&self) -> Option<&Url> {
        self.codebase
            .as_ref()
            .or_else(|| self.reference.as_ref().map(Reference::url))
    }

    pub fn specification(&self) -> Vec<Version> {
        self.spec
            .clone()
            .unwrap_or_else(|| parse_versions(Some(DEFAULT_SPEC_VERSIONS)))
    }

    /// File name of the manifest `href`.
    pub fn name(&self) -> Option<&str> {
        self.reference
            .as_ref()?
            .url()
            .path_segments()?
            .last()
            .filter(|name| !name.is_empty())
    }
}

impl fmt::Display for JnlpSpecification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let spec: Vec<String> = self.specification().iter().map(ToString::to_string).collect();
        write!(f, "jnlp spec {}", spec.join(" "))?;
        if let Some(reference) = &self.reference {
            write!(f, " href={}", reference)?;
        }
        if let Some(codebase) = &self.codebase {
            write!(f, " codebase={}", codebase)?;
        }
        Ok(())
    }
}

/// A codebase always names a directory.
pub fn fix_codebase(codebase: &str) -> String {
    if codebase.ends_with('/') {
        codebase.to_string()
    } else {
        format!("{codebase}/")
    }
}
