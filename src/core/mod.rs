// ─── JNLP Cache Core ───
// Descriptor parsing and the persistent resource cache behind it.
//
// Architecture:
//   core/
//     version/     version-ids with + and * modifiers
//     reference/   versioned artifact references, resource sets
//     platform/    locale and os/arch facts for conditional blocks
//     information/ locale-resolved title, vendor, icons
//     descriptor/  the parsed manifest
//     jnlp/        tag state machine, parser, loader
//     cache/       entries, cached resources, events, file backend
//     downloader/  file: and http(s): transports
//     config/      settings file, cache directory, legacy migration

pub mod cache;
pub mod config;
pub mod descriptor;
pub mod downloader;
pub mod error;
pub mod http;
pub mod information;
pub mod jnlp;
pub mod platform;
pub mod reference;
pub mod version;
