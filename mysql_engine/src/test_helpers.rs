//! Shared setup for live tests.

use std::sync::Once;

static DOTENV: Once = Once::new();

/// Loads `.env` from the working directory or its parents, once per process.
/// A missing file is not an error.
pub fn load_dotenv() {
    DOTENV.call_once(|| {
        if let Ok(path) = dotenvy::dotenv() {
            log::debug!("Loaded environment from {}", path.display());
        }
    });
}

/// Value of `name`, treating an empty variable as unset.
pub fn env_var(name: &str) -> Option<String> {
    load_dotenv();
    std::env::var(name).ok().filter(|v| !v.is_empty())
}
