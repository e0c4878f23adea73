// ─── File Resource Store ───
// Flat on-disk storage for cached resources plus native-library extraction.

use std::fs::{self, File};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use reqwest::Url;
use tracing::{debug, warn};

use super::resource::ResourceStore;
use crate::core::downloader::client::{file_last_modified, from_millis};
use crate::core::error::{JnlpError, JnlpResult};
use crate::core::reference::Reference;

/// Stores one resource as `<resource dir>/<final URL path segment>`.
#[derive(Debug)]
pub struct FileResourceStore {
    path: PathBuf,
    library_dir: PathBuf,
    cache_name: String,
}

impl FileResourceStore {
    /// Creates both directories if needed.
    pub fn new(url: &Url, resource_dir: &Path, library_dir: &Path) -> JnlpResult<Self> {
        for dir in [resource_dir, library_dir] {
            fs::create_dir_all(dir).map_err(|e| JnlpError::io(dir, e))?;
        }

        let cache_name = cache_name(url);
        Ok(Self {
            path: resource_dir.join(&cache_name),
            library_dir: library_dir.to_path_buf(),
            cache_name,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn library_dir(&self) -> &Path {
        &self.library_dir
    }

    /// Top-level file entries of the cached archive: no directories and no
    /// embedded path separators.
    fn top_level_entries(&self) -> JnlpResult<Vec<String>> {
        let file = File::open(&self.path).map_err(|e| JnlpError::io(&self.path, e))?;
        let mut archive = zip::ZipArchive::new(file)?;

        let mut names = Vec::new();
        for i in 0..archive.len() {
            let entry = archive.by_index(i)?;
            let name = entry.name();
            if entry.is_dir() || name.contains('/') || name.contains('\\') {
                continue;
            }
            names.push(name.to_string());
        }
        Ok(names)
    }

    /// Extract every top-level entry into the library directory, overwriting.
    fn extract_natives(&self) -> JnlpResult<usize> {
        let file = File::open(&self.path).map_err(|e| JnlpError::io(&self.path, e))?;
        let mut archive = zip::ZipArchive::new(file)?;
        let mut extracted = 0;

        for name in self.top_level_entries()? {
            let mut entry = archive.by_name(&name)?;
            let dest = self.library_dir.join(&name);
            let mut out = File::create(&dest).map_err(|e| JnlpError::io(&dest, e))?;
            std::io::copy(&mut entry, &mut out).map_err(|e| JnlpError::io(&dest, e))?;
            debug!("Extracted native: {}", name);
            extracted += 1;
        }
        Ok(extracted)
    }
}

impl ResourceStore for FileResourceStore {
    fn cache_name(&self) -> &str {
        &self.cache_name
    }

    fn local_path(&self) -> Option<&Path> {
        Some(&self.path)
    }

    fn stored_state(&self) -> (i64, u64) {
        let length = fs::metadata(&self.path).map(|m| m.len()).unwrap_or(0);
        (file_last_modified(&self.path), length)
    }

    fn open_read(&self) -> JnlpResult<Box<dyn Read + Send>> {
        let file = File::open(&self.path).map_err(|e| JnlpError::io(&self.path, e))?;
        Ok(Box::new(file))
    }

    fn open_write(&self) -> JnlpResult<Box<dyn Write + Send>> {
        let file = File::create(&self.path).map_err(|e| JnlpError::io(&self.path, e))?;
        Ok(Box::new(file))
    }

    fn committed(&self, reference: &Reference, last_modified: i64) -> JnlpResult<()> {
        if let Some(time) = from_millis(last_modified).filter(|_| last_modified > 0) {
            let file = File::options()
                .write(true)
                .open(&self.path)
                .map_err(|e| JnlpError::io(&self.path, e))?;
            file.set_modified(time)
                .map_err(|e| JnlpError::io(&self.path, e))?;
        }

        if reference.is_native() {
            let count = self.extract_natives()?;
            debug!("Extracted {} native files from {}", count, self.cache_name);
        }
        Ok(())
    }

    fn purge(&self, reference: &Reference) -> JnlpResult<()> {
        if !self.path.exists() {
            return Ok(());
        }

        if reference.is_native() {
            match self.top_level_entries() {
                Ok(names) => {
                    for name in names {
                        let extracted = self.library_dir.join(&name);
                        if let Err(e) = fs::remove_file(&extracted) {
                            if e.kind() != std::io::ErrorKind::NotFound {
                                warn!("Cannot delete native {:?}: {}", extracted, e);
                            }
                        }
                    }
                }
                // a partial download is usually not a readable archive
                Err(e) => debug!("Skipping native cleanup for {}: {}", self.cache_name, e),
            }
        }

        fs::remove_file(&self.path).map_err(|e| JnlpError::io(&self.path, e))
    }
}

/// File name for a cached URL: its final path segment, or `index` when the
/// path ends in `/`.
pub fn cache_name(url: &Url) -> String {
    url.path_segments()
        .and_then(|segments| segments.last())
        .filter(|segment| !segment.is_empty())
        .unwrap_or("index")
        .to_string()
}
