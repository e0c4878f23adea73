pub mod id;

pub use id::{parse_versions, Modifier, Version};
