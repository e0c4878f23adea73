// ─── File Cache ───
// Entries live under <root>/<vendor>/<title>/. Opening a cache re-establishes
// every entry directory already present below the root.

use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use tracing::{debug, info, warn};

use super::events::{CacheEvent, CacheEventKind, ListenerList};
use super::file_entry::FileCacheEntry;
use super::record::{EntryRecord, RECORD_FILE_NAME};
use super::{entry_key, Cache, CacheEntry};
use crate::core::config::{legacy_cache_dir, migrate_legacy_cache, CacheSettings};
use crate::core::descriptor::Descriptor;
use crate::core::downloader::{DefaultTransport, Transport};
use crate::core::error::{JnlpError, JnlpResult};

pub struct FileCache {
    root: PathBuf,
    transport: Arc<dyn Transport>,
    entries: RwLock<HashMap<String, Arc<FileCacheEntry>>>,
    /// Keys that have had `EntryAdded` fired, removals included.
    announced: Mutex<HashSet<String>>,
    listeners: Arc<ListenerList<CacheEvent>>,
}

impl FileCache {
    /// Open (creating if needed) the cache rooted at `root`. Fails if the
    /// directory cannot be created or listed.
    pub fn open(root: impl Into<PathBuf>, transport: Arc<dyn Transport>) -> JnlpResult<Arc<Self>> {
        let root = root.into();
        fs::create_dir_all(&root).map_err(|e| invalid(&root, e))?;

        let cache = Self {
            root,
            transport,
            entries: RwLock::new(HashMap::new()),
            announced: Mutex::new(HashSet::new()),
            listeners: Arc::new(ListenerList::new()),
        };
        cache.discover()?;

        info!(
            "Opened cache at {:?} with {} entries",
            cache.root,
            cache.entries.read().len()
        );
        Ok(Arc::new(cache))
    }

    /// Resolve the cache directory from `settings`, migrating a legacy
    /// cache into it first.
    pub fn from_settings(settings: &CacheSettings) -> JnlpResult<Arc<Self>> {
        let root = settings.resolve_cache_dir();
        if let Some(legacy) = legacy_cache_dir() {
            migrate_legacy_cache(&legacy, &root);
        }

        let transport = DefaultTransport::new(settings.user_agent.clone(), settings.timeout());
        Self::open(root, Arc::new(transport))
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Establish an entry for every `<vendor>/<title>` directory. Names come
    /// from the stored record when it is readable, else from the directories.
    fn discover(&self) -> JnlpResult<()> {
        for vendor_dir in list_dirs(&self.root)? {
            for title_dir in list_dirs(&vendor_dir)? {
                let (vendor, title) = match EntryRecord::load(&title_dir.join(RECORD_FILE_NAME)) {
                    Ok(record) => (record.vendor, record.title),
                    Err(_) => (dir_name(&vendor_dir), dir_name(&title_dir)),
                };

                match self.open_entry(&vendor, &title) {
                    Ok(entry) => {
                        debug!("Discovered cache entry {}", entry.key());
                        self.entries.write().insert(entry.key(), entry);
                    }
                    Err(e) => warn!("Skipping cache entry {:?}: {}", title_dir, e),
                }
            }
        }
        Ok(())
    }

    fn open_entry(&self, vendor: &str, title: &str) -> JnlpResult<Arc<FileCacheEntry>> {
        FileCacheEntry::open(
            &self.root,
            vendor,
            title,
            Arc::clone(&self.transport),
            Arc::clone(&self.listeners),
        )
    }

    /// Entry for `(vendor, title)`, created on first request. `EntryAdded`
    /// fires at most once per key over the life of this cache, even if the
    /// entry is removed and established again.
    pub fn establish(&self, vendor: &str, title: &str) -> JnlpResult<Arc<FileCacheEntry>> {
        let key = entry_key(vendor, title);
        if let Some(entry) = self.entries.read().get(&key) {
            return Ok(Arc::clone(entry));
        }

        let (entry, created) = {
            let mut entries = self.entries.write();
            match entries.get(&key) {
                Some(entry) => (Arc::clone(entry), false),
                None => {
                    let entry = self.open_entry(vendor, title)?;
                    entries.insert(key.clone(), Arc::clone(&entry));
                    (entry, true)
                }
            }
        };

        if created {
            info!("Established cache entry {}", entry.key());
            if self.announced.lock().insert(key) {
                self.listeners.fire(&CacheEvent {
                    kind: CacheEventKind::EntryAdded,
                    entry: entry.clone(),
                });
            }
        }
        Ok(entry)
    }

    pub fn entry(&self, vendor: &str, title: &str) -> Option<Arc<FileCacheEntry>> {
        self.entries.read().get(&entry_key(vendor, title)).cloned()
    }
}

impl Cache for FileCache {
    fn establish_entry(&self, descriptor: Arc<Descriptor>) -> JnlpResult<Arc<dyn CacheEntry>> {
        let information = descriptor
            .information()
            .ok_or_else(|| JnlpError::NoInformation(descriptor.source().to_string()))?;

        let (vendor, title) = match (information.default_vendor(), information.default_title()) {
            (Some(vendor), Some(title)) => (vendor.to_string(), title.to_string()),
            _ => return Err(JnlpError::NoInformation(descriptor.source().to_string())),
        };

        let entry = self.establish(&vendor, &title)?;
        entry.set_descriptor(Some(descriptor));
        Ok(entry)
    }

    fn entries(&self) -> Vec<Arc<dyn CacheEntry>> {
        self.entries
            .read()
            .values()
            .map(|entry| Arc::clone(entry) as Arc<dyn CacheEntry>)
            .collect()
    }

    fn remove_entry(&self, entry: &Arc<dyn CacheEntry>) -> JnlpResult<bool> {
        let removed = self.entries.write().remove(&entry.key());
        let Some(removed) = removed else {
            return Ok(false);
        };

        removed.destroy()?;
        self.listeners.fire(&CacheEvent {
            kind: CacheEventKind::EntryRemoved,
            entry: removed,
        });
        Ok(true)
    }

    fn transport(&self) -> Arc<dyn Transport> {
        Arc::clone(&self.transport)
    }

    fn listeners(&self) -> &ListenerList<CacheEvent> {
        &self.listeners
    }
}

fn invalid(path: &Path, e: std::io::Error) -> JnlpError {
    JnlpError::InvalidCache {
        path: path.to_path_buf(),
        reason: e.to_string(),
    }
}

fn list_dirs(dir: &Path) -> JnlpResult<Vec<PathBuf>> {
    let mut dirs = Vec::new();
    for entry in fs::read_dir(dir).map_err(|e| invalid(dir, e))? {
        let entry = entry.map_err(|e| invalid(dir, e))?;
        if entry.file_type().map(|t| t.is_dir()).unwrap_or(false) {
            dirs.push(entry.path());
        }
    }
    dirs.sort();
    Ok(dirs)
}

fn dir_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default()
}
