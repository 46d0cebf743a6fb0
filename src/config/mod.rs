//! Configuration: `coffer.toml` settings and data-directory layout.

pub mod paths;
pub mod settings;

pub use paths::DataDir;
pub use settings::{SessionSealKind, Settings};
