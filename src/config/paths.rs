use std::path::{Path, PathBuf};

use crate::errors::{CofferError, Result};

/// Name of the default data directory under the user's home.
const DEFAULT_DIR_NAME: &str = ".coffer";

/// Locations of every file Coffer keeps in its data directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataDir {
    root: PathBuf,
}

impl DataDir {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Use `explicit` if given, otherwise `~/.coffer`.
    pub fn resolve(explicit: Option<&Path>) -> Result<Self> {
        if let Some(dir) = explicit {
            return Ok(Self::new(dir));
        }
        let home = dirs::home_dir().ok_or_else(|| {
            CofferError::Config("cannot determine home directory; pass --data-dir".into())
        })?;
        Ok(Self::new(home.join(DEFAULT_DIR_NAME)))
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// `<root>/vault.db`
    pub fn database(&self) -> PathBuf {
        self.root.join("vault.db")
    }

    /// `<root>/session`
    pub fn session(&self) -> PathBuf {
        self.root.join("session")
    }

    /// `<root>/session.key`
    pub fn session_key(&self) -> PathBuf {
        self.root.join("session.key")
    }

    /// Create the directory if needed, restricted to the owner on Unix.
    pub fn ensure(&self) -> Result<()> {
        std::fs::create_dir_all(&self.root)?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(&self.root, std::fs::Permissions::from_mode(0o700))?;
        }
        Ok(())
    }
}
