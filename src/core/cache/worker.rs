// ─── Background Updates ───
// Resource transfers block on I/O; these helpers move them onto tokio's
// blocking pool so async callers can await them or poll progress meanwhile.

use std::sync::Arc;

use tokio::task::JoinHandle;
use tracing::debug;

use super::resource::CachedResource;
use super::{AddOutcome, CacheEntry};
use crate::core::error::JnlpResult;
use crate::core::reference::Reference;

/// Run [`CachedResource::update`] on the blocking pool.
pub fn spawn_update(resource: Arc<CachedResource>) -> JoinHandle<bool> {
    debug!("Scheduling update of {}", resource.url());
    tokio::task::spawn_blocking(move || resource.update())
}

/// Run [`CacheEntry::add_resource_with`] (without forcing) on the blocking pool.
pub fn spawn_add_resource(
    entry: Arc<dyn CacheEntry>,
    reference: Reference,
) -> JoinHandle<JnlpResult<AddOutcome>> {
    debug!("Scheduling add of {} to {}", reference, entry.key());
    tokio::task::spawn_blocking(move || entry.add_resource_with(&reference, false))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::cache::{EntryEvent, FileCache};
    use crate::core::downloader::DefaultTransport;
    use reqwest::Url;
    use tempfile::TempDir;

    #[tokio::test]
    async fn add_and_update_run_off_the_runtime() {
        let tmp = TempDir::new().unwrap();
        let src = TempDir::new().unwrap();
        let cache = FileCache::open(tmp.path(), Arc::new(DefaultTransport::default())).unwrap();
        let entry = cache.establish("Acme", "Demo").unwrap();
        let mut events = entry.subscribe();

        let jar_path = src.path().join("demo.jar");
        std::fs::write(&jar_path, b"demo").unwrap();
        let jar = Reference::new(Url::from_file_path(&jar_path).unwrap());

        let outcome = spawn_add_resource(entry.clone(), jar.clone())
            .await
            .unwrap()
            .unwrap();
        assert!(outcome.added);
        assert!(outcome.updated);

        assert!(matches!(events.recv().await, Some(EntryEvent::UpdateStarted(_))));
        assert!(matches!(events.recv().await, Some(EntryEvent::ResourceAdded(_))));
        assert!(matches!(events.recv().await, Some(EntryEvent::ResourceUpdated(_))));

        let resource = entry.resource(&jar, false).unwrap().unwrap();
        assert!(!spawn_update(resource).await.unwrap());
    }
}
