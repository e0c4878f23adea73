pub mod settings;

pub use settings::{
    default_settings_path, legacy_cache_dir, migrate_legacy_cache, CacheSettings, CACHE_DIR_ENV,
};
