// ─── File Cache Entry ───
// A cache entry persisted as <root>/<vendor>/<title>/{entry.json, Resources/, Libraries/}.
//
// Every mutating call rewrites entry.json. Before each access the record's
// mtime is compared with the last read/write; a newer file (another process
// touched the cache) is re-read first.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Weak};

use parking_lot::{Mutex, RwLock};
use reqwest::Url;
use tracing::{debug, info, warn};

use super::events::{CacheEvent, CacheEventKind, EntryEvent, ListenerList};
use super::record::{EntryRecord, ResourceRecord, RECORD_FILE_NAME};
use super::resource::CachedResource;
use super::store::FileResourceStore;
use super::{AddOutcome, CacheEntry};
use crate::core::descriptor::Descriptor;
use crate::core::downloader::client::file_last_modified;
use crate::core::downloader::Transport;
use crate::core::error::{JnlpError, JnlpResult};
use crate::core::reference::Reference;

const RESOURCE_DIR_NAME: &str = "Resources";
const LIBRARY_DIR_NAME: &str = "Libraries";

#[derive(Default)]
struct EntryState {
    meta: BTreeMap<String, String>,
    /// Keyed by URL string.
    resources: BTreeMap<String, Arc<CachedResource>>,
    /// mtime of entry.json when this process last read or wrote it.
    record_seen: i64,
}

pub struct FileCacheEntry {
    self_ref: Weak<FileCacheEntry>,
    vendor: String,
    title: String,

    dir: PathBuf,
    resource_dir: PathBuf,
    library_dir: PathBuf,
    record_path: PathBuf,

    transport: Arc<dyn Transport>,
    cache_listeners: Arc<ListenerList<CacheEvent>>,
    listeners: ListenerList<EntryEvent>,

    state: Mutex<EntryState>,
    descriptor: RwLock<Option<Arc<Descriptor>>>,
}

impl FileCacheEntry {
    /// Open or create the entry below `root`.
    pub(crate) fn open(
        root: &Path,
        vendor: &str,
        title: &str,
        transport: Arc<dyn Transport>,
        cache_listeners: Arc<ListenerList<CacheEvent>>,
    ) -> JnlpResult<Arc<Self>> {
        let dir = entry_dir(root, vendor, title);
        let resource_dir = dir.join(RESOURCE_DIR_NAME);
        let library_dir = dir.join(LIBRARY_DIR_NAME);

        for d in [&dir, &resource_dir, &library_dir] {
            fs::create_dir_all(d).map_err(|e| JnlpError::io(d, e))?;
        }

        let entry = Arc::new_cyclic(|self_ref| Self {
            self_ref: self_ref.clone(),
            vendor: vendor.to_string(),
            title: title.to_string(),
            record_path: dir.join(RECORD_FILE_NAME),
            dir,
            resource_dir,
            library_dir,
            transport,
            cache_listeners,
            listeners: ListenerList::new(),
            state: Mutex::new(EntryState::default()),
            descriptor: RwLock::new(None),
        });

        {
            let mut state = entry.state.lock();
            if entry.record_path.exists() {
                entry.reload(&mut state);
            } else {
                entry.persist(&mut state)?;
            }
        }

        debug!("Opened cache entry {} at {:?}", entry.key(), entry.dir);
        Ok(entry)
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn resource_dir(&self) -> &Path {
        &self.resource_dir
    }

    // ── Persistence ────────────────────────────────────

    /// Re-read the record if it changed on disk since we last saw it.
    fn refresh(&self, state: &mut EntryState) {
        if file_last_modified(&self.record_path) > state.record_seen {
            info!("Record of {} changed on disk, re-reading", self.key());
            self.reload(state);
        }
    }

    /// Replace in-memory state with the record, keeping live resources whose
    /// URL is still listed.
    fn reload(&self, state: &mut EntryState) {
        let record = match EntryRecord::load(&self.record_path) {
            Ok(record) => record,
            Err(e) => {
                warn!("Cannot read {:?}: {}", self.record_path, e);
                state.record_seen = file_last_modified(&self.record_path);
                return;
            }
        };

        let mut resources = BTreeMap::new();
        for item in record.resources {
            if let Some(existing) = state.resources.remove(&item.href) {
                resources.insert(item.href, existing);
                continue;
            }

            match self.restore_resource(&item) {
                Ok(resource) => {
                    resources.insert(item.href, Arc::new(resource));
                }
                Err(e) => warn!("Skipping recorded resource {}: {}", item.href, e),
            }
        }

        state.meta = record.meta;
        state.resources = resources;
        state.record_seen = file_last_modified(&self.record_path);
    }

    fn restore_resource(&self, item: &ResourceRecord) -> JnlpResult<CachedResource> {
        let url = Url::parse(&item.href).map_err(|e| JnlpError::InvalidUrl {
            value: item.href.clone(),
            reason: e.to_string(),
        })?;
        let reference = Reference::parse(url, None, item.lazy).with_kind(item.kind);
        let store = FileResourceStore::new(reference.url(), &self.resource_dir, &self.library_dir)?;

        Ok(CachedResource::restored(
            reference,
            Box::new(store),
            Arc::clone(&self.transport),
            item.modtime,
        ))
    }

    fn persist(&self, state: &mut EntryState) -> JnlpResult<()> {
        let record = EntryRecord {
            vendor: self.vendor.clone(),
            title: self.title.clone(),
            meta: state.meta.clone(),
            resources: state
                .resources
                .iter()
                .map(|(href, resource)| ResourceRecord {
                    href: href.clone(),
                    kind: resource.reference().kind(),
                    modtime: resource.last_modified(),
                    lazy: resource.reference().is_lazy(),
                })
                .collect(),
        };

        record.save(&self.record_path)?;
        state.record_seen = file_last_modified(&self.record_path);
        Ok(())
    }

    fn commit(&self) -> JnlpResult<()> {
        let mut state = self.state.lock();
        self.persist(&mut state)
    }

    fn new_resource(&self, reference: &Reference) -> JnlpResult<CachedResource> {
        let store = FileResourceStore::new(reference.url(), &self.resource_dir, &self.library_dir)?;
        Ok(CachedResource::new(
            reference.clone(),
            Box::new(store),
            Arc::clone(&self.transport),
        ))
    }

    // ── Events ─────────────────────────────────────────

    fn fire(&self, event: EntryEvent) {
        self.listeners.fire(&event);
    }

    fn fire_cache(&self, kind: CacheEventKind) {
        if let Some(entry) = self.self_ref.upgrade() {
            self.cache_listeners.fire(&CacheEvent { kind, entry });
        }
    }

    /// Run an update of `resource` outside the entry lock.
    fn run_update(&self, resource: &Arc<CachedResource>) -> bool {
        self.fire(EntryEvent::UpdateStarted(Arc::clone(resource)));
        resource.update()
    }

    /// Purge every resource and delete the entry directory.
    pub(crate) fn destroy(&self) -> JnlpResult<()> {
        let mut state = self.state.lock();
        for resource in state.resources.values() {
            resource.purge();
        }
        state.resources.clear();
        state.meta.clear();

        if self.dir.exists() {
            fs::remove_dir_all(&self.dir).map_err(|e| JnlpError::io(&self.dir, e))?;
        }
        info!("Removed cache entry {}", self.key());
        Ok(())
    }
}

impl CacheEntry for FileCacheEntry {
    fn vendor(&self) -> &str {
        &self.vendor
    }

    fn title(&self) -> &str {
        &self.title
    }

    fn meta_info(&self, key: &str) -> Option<String> {
        let mut state = self.state.lock();
        self.refresh(&mut state);
        state.meta.get(key).cloned()
    }

    fn set_meta_info(&self, key: &str, value: Option<&str>) -> JnlpResult<Option<String>> {
        let previous = {
            let mut state = self.state.lock();
            self.refresh(&mut state);

            let previous = match value {
                Some(value) => state.meta.insert(key.to_string(), value.to_string()),
                None => state.meta.remove(key),
            };
            self.persist(&mut state)?;
            previous
        };

        if previous.as_deref() != value {
            debug!("Meta {}.{} = {:?}", self.key(), key, value);
            self.fire(EntryEvent::MetaChanged {
                key: key.to_string(),
                value: value.map(str::to_string),
            });
            self.fire_cache(CacheEventKind::EntryUpdated);
        }
        Ok(previous)
    }

    fn descriptor(&self) -> Option<Arc<Descriptor>> {
        self.descriptor.read().clone()
    }

    fn set_descriptor(&self, descriptor: Option<Arc<Descriptor>>) {
        *self.descriptor.write() = descriptor;
    }

    fn is_resource_cached(&self, reference: &Reference) -> bool {
        let mut state = self.state.lock();
        self.refresh(&mut state);
        state.resources.contains_key(reference.url().as_str())
    }

    fn add_resource_with(&self, reference: &Reference, force: bool) -> JnlpResult<AddOutcome> {
        let (resource, added) = {
            let mut state = self.state.lock();
            self.refresh(&mut state);

            let href = reference.url().to_string();
            match state.resources.get(&href) {
                Some(existing) => (Arc::clone(existing), false),
                None => {
                    let resource = Arc::new(self.new_resource(reference)?);
                    state.resources.insert(href, Arc::clone(&resource));
                    (resource, true)
                }
            }
        };

        let updated = if force || !resource.reference().is_lazy() {
            self.run_update(&resource)
        } else {
            false
        };

        if added || updated {
            self.commit()?;
        }

        if added {
            debug!("Added {} to {}", reference, self.key());
            self.fire(EntryEvent::ResourceAdded(Arc::clone(&resource)));
        }
        if updated {
            self.fire(EntryEvent::ResourceUpdated(Arc::clone(&resource)));
        }
        if added || updated {
            self.fire_cache(CacheEventKind::EntryUpdated);
        }

        Ok(AddOutcome { added, updated })
    }

    fn remove_resource(&self, reference: &Reference) -> JnlpResult<bool> {
        let removed = {
            let mut state = self.state.lock();
            self.refresh(&mut state);

            let removed = state.resources.remove(reference.url().as_str());
            if let Some(resource) = &removed {
                resource.purge();
                self.persist(&mut state)?;
            }
            removed
        };

        match removed {
            Some(resource) => {
                debug!("Removed {} from {}", reference, self.key());
                self.fire(EntryEvent::ResourceRemoved(resource.reference().clone()));
                self.fire_cache(CacheEventKind::EntryUpdated);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn cached_resources(&self) -> Vec<Arc<CachedResource>> {
        let mut state = self.state.lock();
        self.refresh(&mut state);
        state.resources.values().cloned().collect()
    }

    fn resource(
        &self,
        reference: &Reference,
        update: bool,
    ) -> JnlpResult<Option<Arc<CachedResource>>> {
        let resource = {
            let mut state = self.state.lock();
            self.refresh(&mut state);
            state.resources.get(reference.url().as_str()).cloned()
        };

        if let Some(resource) = &resource {
            if update && self.run_update(resource) {
                self.commit()?;
                self.fire(EntryEvent::ResourceUpdated(Arc::clone(resource)));
                self.fire_cache(CacheEventKind::EntryUpdated);
            }
        }
        Ok(resource)
    }

    fn library_dir(&self) -> PathBuf {
        self.library_dir.clone()
    }

    fn listeners(&self) -> &ListenerList<EntryEvent> {
        &self.listeners
    }
}

/// `<root>/<vendor>/<title>`; the vendor has spaces replaced as well.
pub(crate) fn entry_dir(root: &Path, vendor: &str, title: &str) -> PathBuf {
    root.join(sanitize(&vendor.replace(' ', "_")))
        .join(sanitize(title))
}

fn sanitize(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();

    match cleaned.as_str() {
        "" | "." | ".." => "_".to_string(),
        _ => cleaned,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::downloader::DefaultTransport;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::{Duration, SystemTime};
    use tempfile::TempDir;

    fn open_entry(root: &Path) -> Arc<FileCacheEntry> {
        FileCacheEntry::open(
            root,
            "Acme Corp",
            "Demo",
            Arc::new(DefaultTransport::default()),
            Arc::new(ListenerList::new()),
        )
        .unwrap()
    }

    fn file_jar(dir: &Path, name: &str, bytes: &[u8]) -> Reference {
        let path = dir.join(name);
        fs::write(&path, bytes).unwrap();
        Reference::new(Url::from_file_path(&path).unwrap())
    }

    #[test]
    fn layout_follows_vendor_and_title() {
        let tmp = TempDir::new().unwrap();
        let entry = open_entry(tmp.path());

        assert_eq!(entry.dir(), tmp.path().join("Acme_Corp").join("Demo"));
        assert!(entry.dir().join("entry.json").exists());
        assert!(entry.resource_dir().is_dir());
        assert!(entry.library_dir().is_dir());
        assert_eq!(entry.key(), "Acme Corp\u{2192}Demo");
    }

    #[test]
    fn sanitize_removes_separators() {
        assert_eq!(sanitize("a/b\\c"), "a_b_c");
        assert_eq!(sanitize(".."), "_");
        assert_eq!(sanitize("tab\there"), "tab_here");
    }

    #[test]
    fn add_twice_reports_new_then_existing() {
        let tmp = TempDir::new().unwrap();
        let src = TempDir::new().unwrap();
        let entry = open_entry(tmp.path());
        let jar = file_jar(src.path(), "demo.jar", b"demo bytes");

        let first = entry.add_resource_with(&jar, false).unwrap();
        assert_eq!(first, AddOutcome { added: true, updated: true });

        let second = entry.add_resource_with(&jar, false).unwrap();
        assert!(!second.added);
        assert!(!second.updated);

        let resource = entry.resource(&jar, false).unwrap().unwrap();
        assert_eq!(resource.length(), 10);
        assert_eq!(resource.bytes().unwrap(), b"demo bytes");
        assert!(resource.local_path().unwrap().starts_with(entry.resource_dir()));
    }

    #[test]
    fn lazy_references_are_not_fetched_unless_forced() {
        let tmp = TempDir::new().unwrap();
        let src = TempDir::new().unwrap();
        let entry = open_entry(tmp.path());
        let eager = file_jar(src.path(), "lazy.jar", b"lazy");
        let lazy = Reference::parse(eager.url().clone(), None, true);

        let outcome = entry.add_resource_with(&lazy, false).unwrap();
        assert_eq!(outcome, AddOutcome { added: true, updated: false });
        assert_eq!(entry.resource(&lazy, false).unwrap().unwrap().length(), 0);

        let forced = entry.add_resource_with(&lazy, true).unwrap();
        assert_eq!(forced, AddOutcome { added: false, updated: true });
    }

    #[test]
    fn removing_unknown_reference_is_silent() {
        let tmp = TempDir::new().unwrap();
        let entry = open_entry(tmp.path());
        let mut events = entry.subscribe();

        let missing = Reference::new(Url::parse("http://x/missing.jar").unwrap());
        assert!(!entry.remove_resource(&missing).unwrap());
        assert!(events.try_recv().is_err());
    }

    #[test]
    fn remove_purges_bytes_and_fires() {
        let tmp = TempDir::new().unwrap();
        let src = TempDir::new().unwrap();
        let entry = open_entry(tmp.path());
        let jar = file_jar(src.path(), "demo.jar", b"demo");
        entry.add_resource(&jar).unwrap();
        let path = entry.resource(&jar, false).unwrap().unwrap().local_path().unwrap().to_path_buf();
        assert!(path.exists());

        let mut events = entry.subscribe();
        assert!(entry.remove_resource(&jar).unwrap());
        assert!(!path.exists());
        assert!(!entry.is_resource_cached(&jar));
        assert!(matches!(events.try_recv().unwrap(), EntryEvent::ResourceRemoved(_)));
    }

    #[test]
    fn events_fire_after_the_record_is_written() {
        let tmp = TempDir::new().unwrap();
        let src = TempDir::new().unwrap();
        let entry = open_entry(tmp.path());
        let jar = file_jar(src.path(), "demo.jar", b"demo");

        let record_path = entry.dir().join(RECORD_FILE_NAME);
        let seen = Arc::new(AtomicUsize::new(0));
        let sink = Arc::clone(&seen);
        entry.listeners().add_listener(move |event| {
            if let EntryEvent::ResourceAdded(_) = event {
                let record = EntryRecord::load(&record_path).unwrap();
                sink.store(record.resources.len(), Ordering::SeqCst);
            }
        });

        entry.add_resource(&jar).unwrap();
        assert_eq!(seen.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn launchable_once_descriptor_meta_is_set() {
        let tmp = TempDir::new().unwrap();
        let entry = open_entry(tmp.path());
        assert!(!entry.is_launchable());

        let previous = entry
            .set_meta_info(super::super::META_DESCRIPTOR, Some("http://x/demo.jnlp"))
            .unwrap();
        assert_eq!(previous, None);
        assert!(entry.is_launchable());

        entry.set_meta_info(super::super::META_DESCRIPTOR, None).unwrap();
        assert!(!entry.is_launchable());
    }

    #[test]
    fn state_survives_reopen() {
        let tmp = TempDir::new().unwrap();
        let src = TempDir::new().unwrap();
        let jar = file_jar(src.path(), "demo.jar", b"demo");
        let native = Reference::new(Url::parse("http://x/native.jar").unwrap()).native();

        {
            let entry = open_entry(tmp.path());
            entry.add_resource(&jar).unwrap();
            entry.set_meta_info("icon", Some("http://x/icon.png")).unwrap();
            // never fetched, tracked with modtime 0
            let lazy_native = Reference::parse(native.url().clone(), None, true).native();
            entry.add_resource(&lazy_native).unwrap();
        }

        let entry = open_entry(tmp.path());
        assert_eq!(entry.meta_info("icon").as_deref(), Some("http://x/icon.png"));
        assert!(entry.is_resource_cached(&jar));

        let restored = entry.resource(&jar, false).unwrap().unwrap();
        assert!(restored.last_modified() > 0);
        assert_eq!(restored.length(), 4);

        let lib = entry.reference_from_url(native.url());
        assert!(lib.is_native());
        assert!(lib.is_lazy());
    }

    #[test]
    fn external_record_changes_are_picked_up() {
        let tmp = TempDir::new().unwrap();
        let entry = open_entry(tmp.path());
        entry.set_meta_info("icon", Some("old")).unwrap();

        // another process rewrites the record later
        let path = entry.dir().join(RECORD_FILE_NAME);
        let mut record = EntryRecord::load(&path).unwrap();
        record.meta.insert("icon".into(), "new".into());
        record.save(&path).unwrap();
        fs::File::options()
            .write(true)
            .open(&path)
            .unwrap()
            .set_modified(SystemTime::now() + Duration::from_secs(10))
            .unwrap();

        assert_eq!(entry.meta_info("icon").as_deref(), Some("new"));
    }
}
