pub mod environment;
pub mod locale;

pub use environment::Environment;
pub use locale::Locale;
