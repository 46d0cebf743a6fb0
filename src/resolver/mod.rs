//! Resolution of what an environment actually sees.
//!
//! - `inheritance` walks the parent chain and decides which environment
//!   is authoritative for each key.
//! - `references` expands `${NAME}` tokens in already-decrypted values.

pub mod inheritance;
pub mod references;

pub use inheritance::{InheritanceResolver, MAX_INHERITANCE_DEPTH};
pub use references::{has_references, references, resolve, MAX_REFERENCE_DEPTH};
