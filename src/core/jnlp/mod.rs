pub mod loader;
pub mod parser;
pub mod specification;
pub mod tags;

pub use loader::{media_from_content_type, parse_manifest, DescriptorLoader, JNLP_MIME_TYPE};
pub use parser::{parse, parse_bytes, ParseError};
pub use specification::JnlpSpecification;
pub use tags::Tag;
