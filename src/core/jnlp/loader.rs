// ─── Descriptor Loader ───
// Fetches manifests, ties their descriptors to cache entries and keeps the
// entry metadata (descriptor URL, icon) in step with the parsed result.

use std::io::BufReader;
use std::sync::Arc;

use reqwest::Url;
use tracing::{debug, info};

use super::parser::{parse, parse_bytes};
use crate::core::cache::{Cache, CacheEntry, META_DESCRIPTOR, META_ICON};
use crate::core::config::CacheSettings;
use crate::core::descriptor::Descriptor;
use crate::core::error::{JnlpError, JnlpResult};
use crate::core::platform::Environment;

pub const JNLP_MIME_TYPE: &str = "application/x-java-jnlp-file";

const JNLP_EXTENSION: &str = ".jnlp";

pub struct DescriptorLoader {
    cache: Arc<dyn Cache>,
    env: Environment,
    strict_mime: bool,
}

impl DescriptorLoader {
    pub fn new(cache: Arc<dyn Cache>, env: Environment) -> Self {
        Self {
            cache,
            env,
            strict_mime: false,
        }
    }

    pub fn from_settings(cache: Arc<dyn Cache>, settings: &CacheSettings) -> Self {
        Self::new(cache, Environment::current()).with_strict_mime(settings.strict_mime)
    }

    /// Reject manifests not served as [`JNLP_MIME_TYPE`].
    pub fn with_strict_mime(mut self, strict: bool) -> Self {
        self.strict_mime = strict;
        self
    }

    pub fn cache(&self) -> &Arc<dyn Cache> {
        &self.cache
    }

    pub fn environment(&self) -> &Environment {
        &self.env
    }

    /// The entry for the manifest at `url`, with its descriptor attached.
    ///
    /// An entry that already records `url` has its cached manifest brought
    /// up to date and re-parsed; otherwise the manifest is fetched, parsed
    /// and cached.
    pub fn load(&self, url: &Url) -> JnlpResult<Arc<dyn CacheEntry>> {
        if let Some(entry) = self.cache.entry_from_descriptor_url(url) {
            debug!("{} already cached as {}", url, entry.key());
            self.reparse(&entry)?;
            self.update_meta_info(&entry)?;
            return Ok(entry);
        }

        info!("Fetching manifest {}", url);
        let body = self.cache.transport().open(url)?;
        self.check_mime(url, body.content_type.as_deref())?;

        let descriptor = parse(BufReader::new(body.reader), url, &self.cache, &self.env)?;
        let entry = descriptor.cache_entry()?;

        self.update_meta_info(&entry)?;
        entry.add_resource(descriptor.source())?;
        Ok(entry)
    }

    /// The entry's attached descriptor, else one parsed from the manifest
    /// cached in the entry.
    pub fn entry_descriptor(&self, entry: &Arc<dyn CacheEntry>) -> JnlpResult<Arc<Descriptor>> {
        if let Some(descriptor) = entry.descriptor() {
            return Ok(descriptor);
        }
        self.reparse(entry)
    }

    /// Update the manifest cached in `entry`, parse it and attach the result.
    fn reparse(&self, entry: &Arc<dyn CacheEntry>) -> JnlpResult<Arc<Descriptor>> {
        let raw = entry
            .meta_info(META_DESCRIPTOR)
            .ok_or_else(|| JnlpError::Other(format!("no descriptor recorded for {}", entry.key())))?;
        let url = Url::parse(&raw).map_err(|e| JnlpError::InvalidUrl {
            value: raw.clone(),
            reason: e.to_string(),
        })?;

        let reference = entry.reference_from_url(&url);
        let tracked = entry.is_resource_cached(&reference);
        if !tracked {
            entry.add_resource_with(&reference, true)?;
        }
        let resource = entry
            .resource(&reference, tracked)?
            .ok_or_else(|| JnlpError::Other(format!("descriptor of {} not in cache", entry.key())))?;

        let bytes = resource.bytes()?;
        let descriptor = parse_bytes(&bytes, &url, &self.cache, &self.env)?;
        entry.set_descriptor(Some(Arc::clone(&descriptor)));
        debug!("Re-parsed cached manifest of {}", entry.key());
        Ok(descriptor)
    }

    /// Record the descriptor URL and default icon URL of the attached
    /// descriptor. Only changed values are written; returns whether any were.
    pub fn update_meta_info(&self, entry: &Arc<dyn CacheEntry>) -> JnlpResult<bool> {
        let Some(descriptor) = entry.descriptor() else {
            return Ok(false);
        };

        let descriptor_url = descriptor.source().url().to_string();
        let icon_url = descriptor
            .information()
            .and_then(|info| info.default_icon().map(|icon| icon.reference.url().to_string()));

        let mut changed = set_if_changed(entry.as_ref(), META_DESCRIPTOR, Some(&descriptor_url))?;
        changed |= set_if_changed(entry.as_ref(), META_ICON, icon_url.as_deref())?;
        Ok(changed)
    }

    /// [`load`](Self::load), then bring every eager jar and eager native
    /// library up to date.
    pub fn prepare_launch(&self, url: &Url) -> JnlpResult<Arc<dyn CacheEntry>> {
        let entry = self.load(url)?;
        let descriptor = self.entry_descriptor(&entry)?;

        if let Some(resources) = descriptor.resources() {
            for reference in resources.eager_jars().chain(resources.eager_native_libs()) {
                entry.add_resource(reference)?;
            }
        }

        info!("{} ready to launch", entry.key());
        Ok(entry)
    }

    fn check_mime(&self, url: &Url, content_type: Option<&str>) -> JnlpResult<()> {
        if !self.strict_mime {
            return Ok(());
        }

        let accepted = match content_type {
            Some(header) => media_from_content_type(header) == JNLP_MIME_TYPE,
            None => url.path().ends_with(JNLP_EXTENSION),
        };
        if accepted {
            return Ok(());
        }

        Err(JnlpError::BadMimeType {
            url: url.to_string(),
            content_type: content_type.unwrap_or_default().to_string(),
        })
    }
}

fn set_if_changed(entry: &dyn CacheEntry, key: &str, value: Option<&str>) -> JnlpResult<bool> {
    if entry.meta_info(key).as_deref() == value {
        return Ok(false);
    }
    entry.set_meta_info(key, value)?;
    Ok(true)
}

/// The `type/subtype` of a `Content-Type` header, lowercased.
pub fn media_from_content_type(content_type: &str) -> String {
    content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase()
}

/// Parse a manifest already held in memory without touching the cache.
pub fn parse_manifest(
    bytes: &[u8],
    source: &Url,
    cache: &Arc<dyn Cache>,
    env: &Environment,
) -> JnlpResult<Arc<Descriptor>> {
    Ok(parse_bytes(bytes, source, cache, env)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::cache::FileCache;
    use crate::core::downloader::{DefaultTransport, RemoteBody, Transport};
    use crate::core::platform::Locale;
    use crate::core::reference::Reference;
    use std::fs;
    use std::io::Cursor;
    use std::path::Path;
    use std::time::{Duration, SystemTime};
    use tempfile::TempDir;

    const MANIFEST: &str = r#"<?xml version="1.0"?>
        <jnlp spec="1.0+">
          <information>
            <title>Demo</title>
            <vendor>Acme</vendor>
            <icon href="icon.png"/>
          </information>
          <resources>
            <jar href="demo.jar"/>
            <jar href="help.jar" download="lazy"/>
          </resources>
          <application-desc main-class="org.acme.Main"/>
        </jnlp>"#;

    fn env() -> Environment {
        Environment::new("Linux", "x86_64", Locale::new("en", "", ""))
    }

    /// Manifest, main jar and lazy jar side by side in `dir`.
    fn publish(dir: &Path) -> Url {
        fs::write(dir.join("demo.jnlp"), MANIFEST).unwrap();
        fs::write(dir.join("demo.jar"), b"main jar").unwrap();
        fs::write(dir.join("help.jar"), b"help jar").unwrap();
        fs::write(dir.join("icon.png"), b"png").unwrap();
        Url::from_file_path(dir.join("demo.jnlp")).unwrap()
    }

    fn file_cache(root: &Path) -> Arc<dyn Cache> {
        FileCache::open(root, Arc::new(DefaultTransport::default())).unwrap()
    }

    #[test]
    fn parsed_entry_is_launchable_once_descriptor_is_recorded() {
        let tmp = TempDir::new().unwrap();
        let cache = file_cache(tmp.path());
        let loader = DescriptorLoader::new(Arc::clone(&cache), env());

        let manifest = MANIFEST.replace("<jnlp spec=\"1.0+\">", "<jnlp codebase=\"http://x/\">");
        let source = Url::parse("http://x/demo.jnlp").unwrap();
        let descriptor = parse_manifest(manifest.as_bytes(), &source, &cache, &env()).unwrap();

        let main = descriptor.resources().unwrap().main_jar().unwrap().clone();
        assert_eq!(main.url().as_str(), "http://x/demo.jar");
        assert!(!main.is_lazy());

        let entry = descriptor.cache_entry().unwrap();
        assert_eq!((entry.vendor(), entry.title()), ("Acme", "Demo"));
        assert!(!entry.is_launchable());

        assert!(loader.update_meta_info(&entry).unwrap());
        assert!(entry.is_launchable());
        assert_eq!(entry.meta_info(META_DESCRIPTOR).as_deref(), Some(source.as_str()));
        assert_eq!(entry.meta_info(META_ICON).as_deref(), Some("http://x/icon.png"));

        // second pass writes nothing
        assert!(!loader.update_meta_info(&entry).unwrap());

        let again = descriptor.cache_entry().unwrap();
        assert!(Arc::ptr_eq(&entry, &again));
    }

    #[test]
    fn load_caches_manifest_and_prepare_fetches_eager_jars() {
        let site = TempDir::new().unwrap();
        let tmp = TempDir::new().unwrap();
        let url = publish(site.path());

        let cache = file_cache(tmp.path());
        let loader = DescriptorLoader::new(Arc::clone(&cache), env());
        let entry = loader.prepare_launch(&url).unwrap();

        assert!(entry.is_launchable());
        assert!(entry.is_resource_cached(&Reference::new(url.clone())));

        let main_url = url.join("demo.jar").unwrap();
        let main = entry.resource(&Reference::new(main_url), false).unwrap().unwrap();
        assert_eq!(main.bytes().unwrap(), b"main jar");

        let help = Reference::parse(url.join("help.jar").unwrap(), None, true);
        assert!(!entry.is_resource_cached(&help));
    }

    #[test]
    fn reload_uses_the_cached_manifest() {
        let site = TempDir::new().unwrap();
        let tmp = TempDir::new().unwrap();
        let url = publish(site.path());

        {
            let cache = file_cache(tmp.path());
            DescriptorLoader::new(cache, env()).load(&url).unwrap();
        }

        // the published copy is gone; only the cache can answer
        fs::remove_file(site.path().join("demo.jnlp")).unwrap();

        let cache = file_cache(tmp.path());
        let loader = DescriptorLoader::new(Arc::clone(&cache), env());
        let entry = loader.load(&url).unwrap();

        let descriptor = entry.descriptor().expect("descriptor attached");
        assert_eq!(descriptor.main_class(), Some("org.acme.Main"));
        assert_eq!(descriptor.information().unwrap().default_title(), Some("Demo"));
    }

    #[test]
    fn reload_picks_up_a_republished_manifest() {
        let site = TempDir::new().unwrap();
        let tmp = TempDir::new().unwrap();
        let url = publish(site.path());

        let cache = file_cache(tmp.path());
        let loader = DescriptorLoader::new(Arc::clone(&cache), env());
        let entry = loader.load(&url).unwrap();
        assert_eq!(entry.descriptor().unwrap().main_class(), Some("org.acme.Main"));

        let manifest_path = site.path().join("demo.jnlp");
        fs::write(&manifest_path, MANIFEST.replace("org.acme.Main", "org.acme.NewMain")).unwrap();
        fs::File::options()
            .write(true)
            .open(&manifest_path)
            .unwrap()
            .set_modified(SystemTime::now() + Duration::from_secs(3600))
            .unwrap();

        let entry = loader.load(&url).unwrap();
        assert_eq!(entry.descriptor().unwrap().main_class(), Some("org.acme.NewMain"));
        assert_eq!(
            loader.entry_descriptor(&entry).unwrap().main_class(),
            Some("org.acme.NewMain")
        );

        // a fresh process sees the refreshed copy too
        drop(loader);
        drop(cache);
        let cache = file_cache(tmp.path());
        let entry = DescriptorLoader::new(cache, env()).load(&url).unwrap();
        assert_eq!(entry.descriptor().unwrap().main_class(), Some("org.acme.NewMain"));
    }

    struct ServedManifest {
        content_type: &'static str,
    }

    impl Transport for ServedManifest {
        fn last_modified(&self, _url: &Url) -> JnlpResult<i64> {
            Ok(1)
        }

        fn open(&self, _url: &Url) -> JnlpResult<RemoteBody> {
            Ok(RemoteBody {
                last_modified: 1,
                content_length: Some(MANIFEST.len() as u64),
                content_type: Some(self.content_type.to_string()),
                reader: Box::new(Cursor::new(MANIFEST.as_bytes().to_vec())),
            })
        }
    }

    fn served(root: &Path, content_type: &'static str) -> DescriptorLoader {
        let cache: Arc<dyn Cache> =
            FileCache::open(root, Arc::new(ServedManifest { content_type })).unwrap();
        DescriptorLoader::new(cache, env()).with_strict_mime(true)
    }

    #[test]
    fn strict_mode_checks_content_type() {
        let url = Url::parse("http://x/demo.jnlp").unwrap();

        let tmp = TempDir::new().unwrap();
        let err = served(tmp.path(), "text/html").load(&url).err().unwrap();
        assert!(matches!(err, JnlpError::BadMimeType { .. }));

        let tmp = TempDir::new().unwrap();
        let entry = served(tmp.path(), "Application/X-Java-JNLP-File; charset=utf-8")
            .load(&url)
            .unwrap();
        assert_eq!(entry.title(), "Demo");
    }

    #[test]
    fn media_type_strips_parameters() {
        assert_eq!(
            media_from_content_type("application/x-java-jnlp-file; charset=UTF-8"),
            JNLP_MIME_TYPE
        );
        assert_eq!(media_from_content_type(" text/plain "), "text/plain");
        assert_eq!(media_from_content_type(""), "");
    }
}
