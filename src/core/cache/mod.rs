// ─── Cache ───
// Identity and lifecycle of named, observable collections of cached resources.
//
//   Cache            entries keyed by (vendor, title)
//   └─ CacheEntry    resources keyed by URL, metadata, attached descriptor
//      └─ CachedResource   one local copy with its update protocol

pub mod events;
pub mod file_cache;
pub mod file_entry;
pub mod record;
pub mod resource;
pub mod store;
pub mod worker;

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;

use reqwest::Url;
use tokio::sync::mpsc::UnboundedReceiver;

use crate::core::descriptor::Descriptor;
use crate::core::downloader::Transport;
use crate::core::error::JnlpResult;
use crate::core::reference::Reference;

pub use events::{CacheEvent, CacheEventKind, EntryEvent, ListenerId, ListenerList};
pub use file_cache::FileCache;
pub use file_entry::FileCacheEntry;
pub use resource::{AbortHandle, CachedResource, ResourceStore};
pub use store::FileResourceStore;

/// Metadata key holding the URL the entry's descriptor was loaded from.
pub const META_DESCRIPTOR: &str = "descriptor";

/// Metadata key holding the URL of the entry's default icon.
pub const META_ICON: &str = "icon";

/// `vendor→title`.
pub fn entry_key(vendor: &str, title: &str) -> String {
    format!("{vendor}\u{2192}{title}")
}

/// Result of [`CacheEntry::add_resource_with`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AddOutcome {
    /// The URL was not tracked before.
    pub added: bool,
    /// New bytes were committed.
    pub updated: bool,
}

pub trait Cache: Send + Sync {
    /// Entry for the descriptor's default (vendor, title), created on first
    /// request. The descriptor is attached to the entry.
    fn establish_entry(&self, descriptor: Arc<Descriptor>) -> JnlpResult<Arc<dyn CacheEntry>>;

    fn entries(&self) -> Vec<Arc<dyn CacheEntry>>;

    /// Purge every resource of the entry and forget it. Returns false if the
    /// entry was not part of this cache.
    fn remove_entry(&self, entry: &Arc<dyn CacheEntry>) -> JnlpResult<bool>;

    fn transport(&self) -> Arc<dyn Transport>;

    fn listeners(&self) -> &ListenerList<CacheEvent>;

    fn subscribe(&self) -> UnboundedReceiver<CacheEvent> {
        self.listeners().subscribe()
    }

    /// The entry whose descriptor metadata equals `url`.
    fn entry_from_descriptor_url(&self, url: &Url) -> Option<Arc<dyn CacheEntry>> {
        self.entries()
            .into_iter()
            .find(|entry| entry.meta_info(META_DESCRIPTOR).as_deref() == Some(url.as_str()))
    }
}

pub trait CacheEntry: Send + Sync {
    fn vendor(&self) -> &str;

    fn title(&self) -> &str;

    fn key(&self) -> String {
        entry_key(self.vendor(), self.title())
    }

    // ── Metadata ───────────────────────────────────────

    fn meta_info(&self, key: &str) -> Option<String>;

    /// Set or, with `None`, remove a metadata value. Returns the previous value.
    fn set_meta_info(&self, key: &str, value: Option<&str>) -> JnlpResult<Option<String>>;

    /// True once the descriptor URL has been recorded as metadata.
    fn is_launchable(&self) -> bool {
        self.meta_info(META_DESCRIPTOR).is_some()
    }

    // ── Descriptor ─────────────────────────────────────

    fn descriptor(&self) -> Option<Arc<Descriptor>>;

    fn set_descriptor(&self, descriptor: Option<Arc<Descriptor>>);

    // ── Resources ──────────────────────────────────────

    fn is_resource_cached(&self, reference: &Reference) -> bool;

    /// Track `reference` and, if the tracked reference is eager or `force`
    /// is set, bring it up to date. This update runs even when the reference
    /// was already tracked.
    fn add_resource_with(&self, reference: &Reference, force: bool) -> JnlpResult<AddOutcome>;

    /// Returns whether the reference was newly added.
    fn add_resource(&self, reference: &Reference) -> JnlpResult<bool> {
        Ok(self.add_resource_with(reference, false)?.added)
    }

    /// Returns false, without side effects, if the reference was not tracked.
    fn remove_resource(&self, reference: &Reference) -> JnlpResult<bool>;

    fn cached_resources(&self) -> Vec<Arc<CachedResource>>;

    /// The tracked resource for `reference`, updated first when `update` is set.
    fn resource(
        &self,
        reference: &Reference,
        update: bool,
    ) -> JnlpResult<Option<Arc<CachedResource>>>;

    /// The tracked reference for `url`, or a fresh eager reference.
    fn reference_from_url(&self, url: &Url) -> Reference {
        self.cached_resources()
            .into_iter()
            .find(|resource| resource.url() == url)
            .map(|resource| resource.reference().clone())
            .unwrap_or_else(|| Reference::new(url.clone()))
    }

    /// Main manifest section of a cached jar.
    fn jar_manifest(&self, reference: &Reference) -> JnlpResult<Option<BTreeMap<String, String>>> {
        match self.resource(reference, false)? {
            Some(resource) => resource.jar_manifest(),
            None => Ok(None),
        }
    }

    /// Directory holding extracted native libraries.
    fn library_dir(&self) -> PathBuf;

    fn listeners(&self) -> &ListenerList<EntryEvent>;

    fn subscribe(&self) -> UnboundedReceiver<EntryEvent> {
        self.listeners().subscribe()
    }
}
