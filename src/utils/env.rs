// src/utils/env.rs
use log::{debug, info, warn};
use std::path::Path;

/// Loads `.env` from the working directory (or a parent) if there is one.
/// Variables already set in the process environment win.
pub fn load_env() {
    match dotenv::dotenv() {
        Ok(path) => info!("Loaded environment from {}", path.display()),
        Err(e) => debug!("No .env file loaded ({}), using process environment", e),
    }
}

/// Loads a specific env file; a missing file is not an error.
pub fn load_env_from_file(file_path: &Path) {
    match dotenv::from_path(file_path) {
        Ok(()) => info!("Loaded environment from {}", file_path.display()),
        Err(e) => warn!(
            "Could not load env file '{}': {}. Proceeding with system environment variables.",
            file_path.display(),
            e
        ),
    }
}
