//! Cross-Platform Path Utilities
//!
//! Functions for resolving application directories across platforms.
//! All persistent state lives under ~/.docqa/.

use std::path::PathBuf;

use crate::utils::error::{AppError, AppResult};

/// Get the user's home directory
pub fn home_dir() -> AppResult<PathBuf> {
    dirs::home_dir().ok_or_else(|| AppError::config("Could not determine home directory"))
}

/// Get the DocQA directory (~/.docqa/)
pub fn docqa_dir() -> AppResult<PathBuf> {
    Ok(home_dir()?.join(".docqa"))
}

/// Get the config file path (~/.docqa/config.json)
pub fn config_path() -> AppResult<PathBuf> {
    Ok(docqa_dir()?.join("config.json"))
}

/// Get the database file path (~/.docqa/data.db)
pub fn database_path() -> AppResult<PathBuf> {
    Ok(docqa_dir()?.join("data.db"))
}

/// Get the vector index directory (~/.docqa/index/)
pub fn index_dir() -> AppResult<PathBuf> {
    Ok(docqa_dir()?.join("index"))
}

/// Ensure a directory exists, creating it if necessary
pub fn ensure_dir(path: &PathBuf) -> AppResult<()> {
    if !path.exists() {
        std::fs::create_dir_all(path)?;
    }
    Ok(())
}

/// Get the DocQA directory, creating if it doesn't exist
pub fn ensure_docqa_dir() -> AppResult<PathBuf> {
    let path = docqa_dir()?;
    ensure_dir(&path)?;
    Ok(path)
}

/// Get the vector index directory, creating if it doesn't exist
pub fn ensure_index_dir() -> AppResult<PathBuf> {
    let path = index_dir()?;
    ensure_dir(&path)?;
    Ok(path)
}
