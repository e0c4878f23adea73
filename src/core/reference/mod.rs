pub mod model;
pub mod resources;

pub use model::{parse_keys, Reference, ReferenceKind};
pub use resources::{JavaRequirement, Resources};
