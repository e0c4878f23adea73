use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::core::error::{JnlpError, JnlpResult};
use crate::core::http::{APP_USER_AGENT, DEFAULT_TIMEOUT_SECS};

const APP_DIR_NAME: &str = "jnlp-cache";
const SETTINGS_FILE: &str = "settings.json";

/// Overrides the cache directory from the settings file.
pub const CACHE_DIR_ENV: &str = "JNLP_CACHE_DIR";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheSettings {
    pub cache_dir: Option<PathBuf>,
    pub user_agent: String,
    pub timeout_secs: u64,
    /// Reject manifests not served as `application/x-java-jnlp-file`.
    pub strict_mime: bool,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            cache_dir: None,
            user_agent: APP_USER_AGENT.to_string(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            strict_mime: false,
        }
    }
}

impl CacheSettings {
    /// Settings from the user's config directory, or defaults.
    pub fn load() -> Self {
        match default_settings_path() {
            Some(path) => Self::load_from(&path),
            None => Self::default(),
        }
    }

    /// Missing file yields defaults; a corrupt one is logged and ignored.
    pub fn load_from(path: &Path) -> Self {
        let raw = match std::fs::read_to_string(path) {
            Ok(raw) => raw,
            Err(_) => return Self::default(),
        };

        match serde_json::from_str(&raw) {
            Ok(settings) => settings,
            Err(e) => {
                warn!("Ignoring corrupt settings {:?}: {}", path, e);
                Self::default()
            }
        }
    }

    pub fn save_to(&self, path: &Path) -> JnlpResult<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| JnlpError::io(parent, e))?;
        }
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json).map_err(|e| JnlpError::io(path, e))
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// `JNLP_CACHE_DIR`, then `cache_dir`, then the platform cache directory,
    /// then `./jnlp-cache`.
    pub fn resolve_cache_dir(&self) -> PathBuf {
        let from_env = std::env::var_os(CACHE_DIR_ENV)
            .filter(|value| !value.is_empty())
            .map(PathBuf::from);

        from_env
            .or_else(|| self.cache_dir.clone())
            .or_else(|| dirs::cache_dir().map(|dir| dir.join(APP_DIR_NAME)))
            .unwrap_or_else(|| PathBuf::from(APP_DIR_NAME))
    }
}

pub fn default_settings_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join(APP_DIR_NAME).join(SETTINGS_FILE))
}

/// `~/.jnlp/cache`, where older installations kept their cache.
pub fn legacy_cache_dir() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(".jnlp").join("cache"))
}

/// Move the contents of `legacy` into `target` and delete `legacy`.
/// Returns true if anything was migrated. Failures are logged only.
pub fn migrate_legacy_cache(legacy: &Path, target: &Path) -> bool {
    if !legacy.is_dir() || legacy == target {
        return false;
    }

    info!("Migrating legacy cache {:?} -> {:?}", legacy, target);
    let copied = std::fs::create_dir_all(target).and_then(|_| copy_dir_recursive(legacy, target));
    if let Err(e) = copied {
        warn!("Legacy cache migration failed: {}", e);
        return false;
    }

    if let Err(e) = std::fs::remove_dir_all(legacy) {
        warn!("Cannot remove legacy cache {:?}: {}", legacy, e);
    }
    true
}

fn copy_dir_recursive(source: &Path, destination: &Path) -> std::io::Result<()> {
    for entry in std::fs::read_dir(source)? {
        let entry = entry?;
        let src_path = entry.path();
        let dst_path = destination.join(entry.file_name());
        let file_type = entry.file_type()?;

        if file_type.is_dir() {
            std::fs::create_dir_all(&dst_path)?;
            copy_dir_recursive(&src_path, &dst_path)?;
        } else if file_type.is_file() {
            if dst_path.exists() {
                std::fs::remove_file(&dst_path)?;
            }
            std::fs::copy(&src_path, &dst_path)?;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn missing_and_corrupt_files_yield_defaults() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("settings.json");
        assert_eq!(CacheSettings::load_from(&path), CacheSettings::default());

        std::fs::write(&path, "{ not json").unwrap();
        assert_eq!(CacheSettings::load_from(&path), CacheSettings::default());
    }

    #[test]
    fn partial_file_keeps_other_defaults() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("settings.json");
        std::fs::write(&path, r#"{ "strict_mime": true, "timeout_secs": 5 }"#).unwrap();

        let settings = CacheSettings::load_from(&path);
        assert!(settings.strict_mime);
        assert_eq!(settings.timeout(), Duration::from_secs(5));
        assert_eq!(settings.user_agent, APP_USER_AGENT);
    }

    #[test]
    fn save_then_load() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("nested").join("settings.json");
        let settings = CacheSettings {
            cache_dir: Some(tmp.path().join("cache")),
            ..Default::default()
        };

        settings.save_to(&path).unwrap();
        assert_eq!(CacheSettings::load_from(&path), settings);
    }

    #[test]
    fn legacy_tree_is_moved() {
        let tmp = TempDir::new().unwrap();
        let legacy = tmp.path().join("old");
        let target = tmp.path().join("new");
        std::fs::create_dir_all(legacy.join("Acme").join("Demo")).unwrap();
        std::fs::write(legacy.join("Acme").join("Demo").join("entry.json"), "{}").unwrap();

        assert!(migrate_legacy_cache(&legacy, &target));
        assert!(target.join("Acme").join("Demo").join("entry.json").exists());
        assert!(!legacy.exists());

        // nothing left to migrate
        assert!(!migrate_legacy_cache(&legacy, &target));
    }
}
