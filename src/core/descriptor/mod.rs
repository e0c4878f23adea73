// ─── Descriptor ───
// The parsed, environment-resolved result of a manifest.
//
// A descriptor holds only weak handles to its cache and cache entry; the
// entry owns the descriptor, never the other way round.

use std::any::Any;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Arc, Weak};

use parking_lot::{Mutex, RwLock};
use reqwest::Url;
use tracing::debug;

use crate::core::cache::{Cache, CacheEntry};
use crate::core::error::{JnlpError, JnlpResult};
use crate::core::information::Information;
use crate::core::reference::{Reference, Resources};

/// `<application-desc>`.
#[derive(Debug, Clone, Default)]
pub struct ApplicationDesc {
    pub main_class: Option<String>,
    pub arguments: Vec<String>,
}

/// `<applet-desc>`.
#[derive(Debug, Clone)]
pub struct AppletDesc {
    pub main_class: Option<String>,
    pub name: String,
    pub width: u32,
    pub height: u32,
    pub document_base: Option<Url>,
    pub params: BTreeMap<String, String>,
}

/// `<component-desc>` / `<installer-desc>`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtensionKind {
    Component,
    Installer,
}

#[derive(Debug, Clone)]
pub enum DescriptorKind {
    Application(ApplicationDesc),
    Applet(AppletDesc),
    Extension(ExtensionKind),
}

/// Permissions requested by `<security>`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Security {
    #[default]
    Sandbox,
    AllPermissions,
    J2eeApplicationClient,
}

pub struct Descriptor {
    cache: Weak<dyn Cache>,
    codebase: Option<Url>,
    source: Reference,
    kind: DescriptorKind,
    security: Security,

    context: RwLock<Option<Arc<dyn Any + Send + Sync>>>,
    information: RwLock<Option<Arc<Information>>>,
    resources: RwLock<Option<Arc<Resources>>>,

    entry: Mutex<Option<Weak<dyn CacheEntry>>>,
}

impl Descriptor {
    pub fn new(
        cache: &Arc<dyn Cache>,
        codebase: Option<Url>,
        source: Reference,
        kind: DescriptorKind,
    ) -> Self {
        Self {
            cache: Arc::downgrade(cache),
            codebase,
            source,
            kind,
            security: Security::default(),
            context: RwLock::new(None),
            information: RwLock::new(None),
            resources: RwLock::new(None),
            entry: Mutex::new(None),
        }
    }

    pub fn with_security(mut self, security: Security) -> Self {
        self.security = security;
        self
    }

    // ── Parsed parts ───────────────────────────────────

    /// Declared codebase. Applets without one use the main jar's URL.
    pub fn codebase(&self) -> Option<Url> {
        if self.codebase.is_some() {
            return self.codebase.clone();
        }

        match self.kind {
            DescriptorKind::Applet(_) => self
                .resources()
                .and_then(|resources| resources.main_jar().map(|jar| jar.url().clone())),
            _ => None,
        }
    }

    pub fn source(&self) -> &Reference {
        &self.source
    }

    pub fn kind(&self) -> &DescriptorKind {
        &self.kind
    }

    pub fn security(&self) -> Security {
        self.security
    }

    pub fn is_applet(&self) -> bool {
        matches!(self.kind, DescriptorKind::Applet(_))
    }

    pub fn is_extension(&self) -> bool {
        matches!(self.kind, DescriptorKind::Extension(_))
    }

    pub fn main_class(&self) -> Option<&str> {
        match &self.kind {
            DescriptorKind::Application(app) => app.main_class.as_deref(),
            DescriptorKind::Applet(applet) => applet.main_class.as_deref(),
            DescriptorKind::Extension(_) => None,
        }
    }

    // ── Attached state ─────────────────────────────────

    pub fn context(&self) -> Option<Arc<dyn Any + Send + Sync>> {
        self.context.read().clone()
    }

    /// The context downcast to a concrete type.
    pub fn context_as<T: Any + Send + Sync>(&self) -> Option<Arc<T>> {
        self.context().and_then(|ctx| ctx.downcast::<T>().ok())
    }

    pub fn set_context(&self, context: Arc<dyn Any + Send + Sync>) {
        *self.context.write() = Some(context);
    }

    pub fn information(&self) -> Option<Arc<Information>> {
        self.information.read().clone()
    }

    pub fn set_information(&self, information: Information) {
        *self.information.write() = Some(Arc::new(information));
    }

    pub fn resources(&self) -> Option<Arc<Resources>> {
        self.resources.read().clone()
    }

    pub fn set_resources(&self, resources: Resources) {
        *self.resources.write() = Some(Arc::new(resources));
    }

    // ── Cache entry ────────────────────────────────────

    /// The cache entry for this descriptor's (vendor, title), established on
    /// first access and memoized afterwards.
    pub fn cache_entry(self: &Arc<Self>) -> JnlpResult<Arc<dyn CacheEntry>> {
        let mut slot = self.entry.lock();

        if let Some(entry) = slot.as_ref().and_then(Weak::upgrade) {
            return Ok(entry);
        }

        let cache = self.cache.upgrade().ok_or(JnlpError::CacheReleased)?;
        let entry = cache.establish_entry(Arc::clone(self))?;
        debug!("Descriptor {} attached to entry {}", self.source.url(), entry.key());

        *slot = Some(Arc::downgrade(&entry));
        Ok(entry)
    }
}

impl fmt::Debug for Descriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Descriptor")
            .field("codebase", &self.codebase)
            .field("source", &self.source)
            .field("kind", &self.kind)
            .field("security", &self.security)
            .finish_non_exhaustive()
    }
}
