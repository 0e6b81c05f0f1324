//! OS recycle-bin facility behind a narrow trait.

#![allow(missing_docs)]

use std::path::Path;

use crate::core::errors::Result;

/// Something that can take a file off the user's hands recoverably.
pub trait RecycleBin: Send + Sync {
    fn recycle(&self, path: &Path) -> Result<()>;
}

/// The platform trash (freedesktop trash, macOS Trash, Windows Recycle Bin).
#[cfg(feature = "recycle")]
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemTrash;

#[cfg(feature = "recycle")]
impl RecycleBin for SystemTrash {
    fn recycle(&self, path: &Path) -> Result<()> {
        trash::delete(path).map_err(|e| crate::core::errors::SweepError::Recycle {
            path: path.to_path_buf(),
            details: e.to_string(),
        })
    }
}

/// The recycle facility available in this build, if any.
pub fn system_recycle_bin() -> Option<std::sync::Arc<dyn RecycleBin>> {
    #[cfg(feature = "recycle")]
    {
        Some(std::sync::Arc::new(SystemTrash))
    }
    #[cfg(not(feature = "recycle"))]
    {
        None
    }
}
