//! Init Command
//!
//! Creates the .commitlore project directory, checkpoint directory, and a
//! starter project config.

use std::path::PathBuf;

use crate::cli::ui::Output;
use crate::config::ConfigLoader;
use crate::types::Result;

pub fn run(repo: Option<PathBuf>) -> Result<()> {
    let output = Output::new();

    let project_dir = ConfigLoader::init_project(repo.as_deref())?;

    output.success(&format!("Initialized commitlore in {}", project_dir.display()));
    output.info("Edit .commitlore/config.toml, then run 'commitlore run'");
    Ok(())
}
