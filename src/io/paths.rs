use crate::error::{CleanError, Result};
use directories::ProjectDirs;
use std::path::PathBuf;

pub fn models_cache_dir() -> Result<PathBuf> {
    let dirs = ProjectDirs::from("dev", "voice-cleaner", "voice-cleaner-core").ok_or_else(|| {
        CleanError::Io(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            "no home directory to place the model cache in",
        ))
    })?;
    Ok(dirs.cache_dir().join("models"))
}
