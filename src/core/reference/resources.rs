// ─── Resources ───
// The eager/lazy jar and native-library set of a descriptor.

use std::collections::BTreeMap;

use reqwest::Url;

use super::model::{Reference, ReferenceKind};
use crate::core::version::Version;

/// A `<j2se>` / `<jre>` requirement from an active resources block.
#[derive(Debug, Clone)]
pub struct JavaRequirement {
    pub versions: Vec<Version>,
    pub href: Option<Url>,
    pub initial_heap_size: Option<String>,
    pub max_heap_size: Option<String>,
}

/// References partitioned by laziness. The jar / native-library split is a
/// filter over the two underlying sets rather than separate storage.
#[derive(Debug, Clone, Default)]
pub struct Resources {
    eager: Vec<Reference>,
    lazy: Vec<Reference>,
    main_jar: Option<Reference>,
    properties: BTreeMap<String, String>,
    java: Vec<JavaRequirement>,
}

impl Resources {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a reference to the set matching its laziness. Returns false if an
    /// equal reference is already present.
    pub fn add_reference(&mut self, reference: Reference) -> bool {
        let set = if reference.is_lazy() {
            &mut self.lazy
        } else {
            &mut self.eager
        };

        if set.contains(&reference) {
            return false;
        }
        set.push(reference);
        true
    }

    /// Mark a reference as the main jar, adding it first if needed.
    pub fn set_main_jar(&mut self, reference: Reference) {
        self.add_reference(reference.clone());
        self.main_jar = Some(reference);
    }

    pub fn main_jar(&self) -> Option<&Reference> {
        self.main_jar.as_ref()
    }

    pub fn set_property(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.properties.insert(name.into(), value.into());
    }

    /// System properties to apply at launch.
    pub fn properties(&self) -> &BTreeMap<String, String> {
        &self.properties
    }

    pub fn add_java_requirement(&mut self, requirement: JavaRequirement) {
        self.java.push(requirement);
    }

    pub fn java_requirements(&self) -> &[JavaRequirement] {
        &self.java
    }

    pub fn eager(&self) -> &[Reference] {
        &self.eager
    }

    pub fn lazy(&self) -> &[Reference] {
        &self.lazy
    }

    pub fn eager_jars(&self) -> impl Iterator<Item = &Reference> {
        of_kind(&self.eager, ReferenceKind::Jar)
    }

    pub fn eager_native_libs(&self) -> impl Iterator<Item = &Reference> {
        of_kind(&self.eager, ReferenceKind::NativeLibrary)
    }

    pub fn lazy_jars(&self) -> impl Iterator<Item = &Reference> {
        of_kind(&self.lazy, ReferenceKind::Jar)
    }

    pub fn lazy_native_libs(&self) -> impl Iterator<Item = &Reference> {
        of_kind(&self.lazy, ReferenceKind::NativeLibrary)
    }

    /// Every reference, eager first.
    pub fn all(&self) -> impl Iterator<Item = &Reference> {
        self.eager.iter().chain(self.lazy.iter())
    }

    pub fn is_empty(&self) -> bool {
        self.eager.is_empty() && self.lazy.is_empty()
    }
}

fn of_kind(set: &[Reference], kind: ReferenceKind) -> impl Iterator<Item = &Reference> {
    set.iter().filter(move |reference| reference.kind() == kind)
}
