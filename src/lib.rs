pub mod core;

use tracing_subscriber::EnvFilter;

pub use crate::core::cache::{
    AddOutcome, Cache, CacheEntry, CacheEvent, CacheEventKind, CachedResource, EntryEvent,
    FileCache, FileCacheEntry,
};
pub use crate::core::config::CacheSettings;
pub use crate::core::descriptor::{Descriptor, DescriptorKind};
pub use crate::core::error::{JnlpError, JnlpResult};
pub use crate::core::jnlp::{DescriptorLoader, JnlpSpecification, ParseError};
pub use crate::core::platform::{Environment, Locale};
pub use crate::core::reference::{Reference, Resources};
pub use crate::core::version::Version;

/// Install the fmt subscriber, filtered by `RUST_LOG` or
/// `info,jnlp_cache=debug`. Later calls are no-ops.
pub fn init_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,jnlp_cache=debug")),
        )
        .try_init();
}
