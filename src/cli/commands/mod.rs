pub mod clean;
pub mod config;
pub mod index_docs;
pub mod init;
pub mod run;
pub mod status;
pub mod validate;

use std::sync::Arc;

use crate::config::ConfigLoader;
use crate::storage::{Database, SharedDatabase};
use crate::types::{LoreError, Result};

/// Open the project database from configuration, for commands that mirror
/// their logs into it. Fails when the project is not initialized, so no
/// project directory is ever created as a side effect.
pub fn open_database() -> Result<SharedDatabase> {
    if !ConfigLoader::is_project_initialized() {
        return Err(LoreError::NotInitialized);
    }
    let config = ConfigLoader::load()?;
    Ok(Arc::new(Database::open(&config.database.path)?))
}
