// ─── Cached Resource ───
// The local, updatable copy of one referenced artifact.
//
// Update protocol:
//   1. check remote freshness (`file:` via filesystem mtime, otherwise HEAD)
//   2. skip unless strictly newer than the cached copy
//   3. stream into the store in fixed-size chunks, tracking bytes and rate
//   4. the abort flag is polled before every read; abort or error purges
//   5. on success record the remote mtime and the byte count

use std::collections::BTreeMap;
use std::fmt;
use std::io::{Cursor, Read, Write};
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use parking_lot::Mutex;
use reqwest::Url;
use tracing::{debug, info, warn};

use crate::core::downloader::client::{file_last_modified, file_path};
use crate::core::downloader::Transport;
use crate::core::error::JnlpResult;
use crate::core::reference::Reference;

/// Bytes copied per read of the remote stream.
pub const CHUNK_SIZE: usize = 8192;

const JAR_MANIFEST: &str = "META-INF/MANIFEST.MF";

/// Backing storage for one cached resource.
pub trait ResourceStore: Send + Sync {
    /// Deterministic name of the cached copy.
    fn cache_name(&self) -> &str;

    /// On-disk location, if the store has one.
    fn local_path(&self) -> Option<&Path>;

    /// `(last_modified, length)` of whatever is already stored.
    fn stored_state(&self) -> (i64, u64);

    fn open_read(&self) -> JnlpResult<Box<dyn Read + Send>>;

    fn open_write(&self) -> JnlpResult<Box<dyn Write + Send>>;

    /// Called after a complete transfer.
    fn committed(&self, reference: &Reference, last_modified: i64) -> JnlpResult<()>;

    /// Delete the stored bytes and anything derived from them.
    fn purge(&self, reference: &Reference) -> JnlpResult<()>;
}

/// Cooperative cancellation token for an in-flight update.
#[derive(Debug, Clone, Default)]
pub struct AbortHandle(Arc<AtomicBool>);

impl AbortHandle {
    pub fn abort(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_aborted(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    fn reset(&self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// Transient statistics of the current or last transfer.
#[derive(Debug, Default)]
struct TransferStats {
    content_length: AtomicU64,
    transferred: AtomicU64,
    rate: AtomicU64,
    updating: AtomicBool,
}

impl TransferStats {
    fn reset(&self) {
        self.content_length.store(0, Ordering::SeqCst);
        self.transferred.store(0, Ordering::SeqCst);
        self.rate.store(0, Ordering::SeqCst);
    }
}

#[derive(Debug, Clone, Copy, Default)]
struct StoredState {
    last_modified: i64,
    length: u64,
}

pub struct CachedResource {
    reference: Reference,
    store: Box<dyn ResourceStore>,
    transport: Arc<dyn Transport>,
    state: Mutex<StoredState>,
    stats: TransferStats,
    abort: AbortHandle,

    update_lock: Mutex<()>,
    completed_updates: AtomicU64,
    last_outcome: AtomicBool,
}

impl CachedResource {
    /// Wrap a store, taking the initial state from whatever it already holds.
    pub fn new(
        reference: Reference,
        store: Box<dyn ResourceStore>,
        transport: Arc<dyn Transport>,
    ) -> Self {
        let (last_modified, length) = store.stored_state();
        Self::with_state(reference, store, transport, last_modified, length)
    }

    /// Wrap a store with a known last-modified time, e.g. from a persisted record.
    pub fn restored(
        reference: Reference,
        store: Box<dyn ResourceStore>,
        transport: Arc<dyn Transport>,
        last_modified: i64,
    ) -> Self {
        let (_, length) = store.stored_state();
        Self::with_state(reference, store, transport, last_modified, length)
    }

    fn with_state(
        reference: Reference,
        store: Box<dyn ResourceStore>,
        transport: Arc<dyn Transport>,
        last_modified: i64,
        length: u64,
    ) -> Self {
        Self {
            reference,
            store,
            transport,
            state: Mutex::new(StoredState {
                last_modified,
                length,
            }),
            stats: TransferStats::default(),
            abort: AbortHandle::default(),
            update_lock: Mutex::new(()),
            completed_updates: AtomicU64::new(0),
            last_outcome: AtomicBool::new(false),
        }
    }

    // ── Accessors ──────────────────────────────────────

    pub fn reference(&self) -> &Reference {
        &self.reference
    }

    pub fn url(&self) -> &Url {
        self.reference.url()
    }

    /// Remote modification time of the cached copy, 0 if nothing is cached.
    pub fn last_modified(&self) -> i64 {
        self.state.lock().last_modified
    }

    /// Size of the cached copy in bytes.
    pub fn length(&self) -> u64 {
        self.state.lock().length
    }

    /// `Content-Length` announced by the current transfer, 0 if unknown.
    pub fn expected_length(&self) -> u64 {
        self.stats.content_length.load(Ordering::SeqCst)
    }

    pub fn transferred(&self) -> u64 {
        self.stats.transferred.load(Ordering::SeqCst)
    }

    /// Bytes per second of the current transfer.
    pub fn transfer_rate(&self) -> u64 {
        self.stats.rate.load(Ordering::SeqCst)
    }

    pub fn is_updating(&self) -> bool {
        self.stats.updating.load(Ordering::SeqCst)
    }

    pub fn cache_name(&self) -> &str {
        self.store.cache_name()
    }

    pub fn local_path(&self) -> Option<&Path> {
        self.store.local_path()
    }

    /// Token that cancels the in-flight transfer.
    pub fn abort_handle(&self) -> AbortHandle {
        self.abort.clone()
    }

    pub fn abort_update(&self) {
        self.abort.abort();
    }

    // ── Cached bytes ───────────────────────────────────

    pub fn open_cached(&self) -> JnlpResult<Box<dyn Read + Send>> {
        self.store.open_read()
    }

    pub fn bytes(&self) -> JnlpResult<Vec<u8>> {
        let mut bytes = Vec::new();
        self.open_cached()?.read_to_end(&mut bytes)?;
        Ok(bytes)
    }

    /// Main section of the jar's `META-INF/MANIFEST.MF`, or `None` if the jar
    /// has no manifest.
    pub fn jar_manifest(&self) -> JnlpResult<Option<BTreeMap<String, String>>> {
        let mut archive = zip::ZipArchive::new(Cursor::new(self.bytes()?))?;

        let mut text = String::new();
        match archive.by_name(JAR_MANIFEST) {
            Ok(mut file) => {
                file.read_to_string(&mut text)?;
            }
            Err(zip::result::ZipError::FileNotFound) => return Ok(None),
            Err(e) => return Err(e.into()),
        }

        Ok(Some(parse_manifest_main_section(&text)))
    }

    // ── Update ─────────────────────────────────────────

    /// Bring the cached copy up to date. Returns true only if new bytes were
    /// committed. Transfer failures are logged and reported as false.
    ///
    /// Only one update runs at a time; a caller that had to wait for another
    /// caller's update returns that update's outcome instead of starting a
    /// second transfer.
    pub fn update(&self) -> bool {
        let seen = self.completed_updates.load(Ordering::SeqCst);
        let _guard = self.update_lock.lock();

        if self.completed_updates.load(Ordering::SeqCst) != seen {
            return self.last_outcome.load(Ordering::SeqCst);
        }

        let outcome = self.run_update();

        self.last_outcome.store(outcome, Ordering::SeqCst);
        self.completed_updates.fetch_add(1, Ordering::SeqCst);
        outcome
    }

    fn run_update(&self) -> bool {
        let remote = match self.remote_last_modified() {
            Ok(remote) => remote,
            Err(e) => {
                warn!("Freshness check failed for {}: {}", self.url(), e);
                return false;
            }
        };

        let cached = self.last_modified();
        if remote == 0 || remote <= cached {
            debug!("{} is current (remote={}, cached={})", self.url(), remote, cached);
            return false;
        }

        info!("Updating {} (remote={}, cached={})", self.url(), remote, cached);
        self.stats.reset();
        self.abort.reset();
        self.stats.updating.store(true, Ordering::SeqCst);

        let result = self.transfer();

        self.stats.updating.store(false, Ordering::SeqCst);

        match result {
            Ok(Some(length)) => {
                *self.state.lock() = StoredState {
                    last_modified: remote,
                    length,
                };
                if let Err(e) = self.store.committed(&self.reference, remote) {
                    warn!("Post-transfer step failed for {}: {}", self.url(), e);
                }
                info!("Updated {} ({} bytes)", self.url(), length);
                true
            }
            Ok(None) => {
                info!("Update of {} aborted after {} bytes", self.url(), self.transferred());
                self.purge_locked();
                false
            }
            Err(e) => {
                warn!("Update of {} failed: {}", self.url(), e);
                self.purge_locked();
                false
            }
        }
    }

    fn remote_last_modified(&self) -> JnlpResult<i64> {
        if self.url().scheme() == "file" {
            return Ok(file_last_modified(&file_path(self.url())?));
        }
        self.transport.last_modified(self.url())
    }

    /// Copy the remote body into the store. `Ok(None)` means aborted.
    fn transfer(&self) -> JnlpResult<Option<u64>> {
        let mut body = self.transport.open(self.url())?;
        self.stats
            .content_length
            .store(body.content_length.unwrap_or(0), Ordering::SeqCst);

        let mut out = self.store.open_write()?;
        let mut buffer = vec![0u8; CHUNK_SIZE];
        let mut transferred: u64 = 0;
        let started = Instant::now();

        loop {
            if self.abort.is_aborted() {
                return Ok(None);
            }

            let read = body.reader.read(&mut buffer)?;
            if read == 0 {
                break;
            }
            out.write_all(&buffer[..read])?;

            transferred += read as u64;
            let secs = started.elapsed().as_secs().max(1);
            self.stats.transferred.store(transferred, Ordering::SeqCst);
            self.stats.rate.store(transferred / secs, Ordering::SeqCst);
        }

        out.flush()?;
        Ok(Some(transferred))
    }

    /// Delete the cached bytes and reset every statistic. An in-flight
    /// update is aborted and waited for first.
    pub fn purge(&self) {
        self.abort.abort();
        let _guard = self.update_lock.lock();
        self.purge_locked();
        self.abort.reset();
    }

    /// Purge while already holding `update_lock`.
    fn purge_locked(&self) {
        if let Err(e) = self.store.purge(&self.reference) {
            warn!("Purge of {} incomplete: {}", self.url(), e);
        }
        self.stats.reset();
        *self.state.lock() = StoredState::default();
        debug!("Purged {}", self.url());
    }
}

impl fmt::Debug for CachedResource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CachedResource")
            .field("reference", &self.reference)
            .field("cache_name", &self.cache_name())
            .field("last_modified", &self.last_modified())
            .field("length", &self.length())
            .finish()
    }
}

/// Parse the main section of a jar manifest. Lines starting with a single
/// space continue the previous value.
fn parse_manifest_main_section(text: &str) -> BTreeMap<String, String> {
    let mut attributes = BTreeMap::new();
    let mut current: Option<(String, String)> = None;

    for line in text.lines() {
        if line.is_empty() {
            break;
        }

        if let Some(rest) = line.strip_prefix(' ') {
            if let Some((_, value)) = current.as_mut() {
                value.push_str(rest);
            }
            continue;
        }

        if let Some((key, value)) = current.take() {
            attributes.insert(key, value);
        }
        if let Some((key, value)) = line.split_once(':') {
            current = Some((key.trim().to_string(), value.trim_start().to_string()));
        }
    }

    if let Some((key, value)) = current {
        attributes.insert(key, value);
    }
    attributes
}
