//! Configuration Loader (Figment-based)
//!
//! Loads and merges configuration from multiple sources using Figment:
//! 1. Built-in defaults (Serialized)
//! 2. Global config (~/.config/commitlore/config.toml)
//! 3. Project config (.commitlore/config.toml)
//! 4. Environment variables (COMMITLORE_* prefix)

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use std::fs;
use std::path::{Path, PathBuf};

use directories::ProjectDirs;
use tracing::{debug, info};

use super::types::Config;
use crate::constants::paths;
use crate::types::{LoreError, Result};

/// Configuration loader
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration with full resolution chain using Figment:
    /// defaults → global → project → env vars
    pub fn load() -> Result<Config> {
        let mut figment = Figment::new().merge(Serialized::defaults(Config::default()));

        if let Some(global_path) = Self::global_config_path()
            && global_path.exists()
        {
            debug!("Loading global config from: {}", global_path.display());
            figment = figment.merge(Toml::file(&global_path));
        }

        let project_path = Self::project_config_path();
        if project_path.exists() {
            debug!("Loading project config from: {}", project_path.display());
            figment = figment.merge(Toml::file(&project_path));
        }

        // Environment variables (e.g., COMMITLORE_LLM_MODEL -> llm.model)
        figment = figment.merge(Env::prefixed("COMMITLORE_").split("_").lowercase(true));

        let config: Config = figment
            .extract()
            .map_err(|e| LoreError::Config(format!("Configuration error: {}", e)))?;

        config.validate()?;

        Ok(config)
    }

    /// Load configuration from a specific file only
    pub fn load_from_file(path: &Path) -> Result<Config> {
        let config: Config = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Toml::file(path))
            .extract()
            .map_err(|e| LoreError::Config(format!("Configuration error: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    // =========================================================================
    // Path Management
    // =========================================================================

    /// Get path to global config directory (~/.config/commitlore/)
    pub fn global_dir() -> Option<PathBuf> {
        ProjectDirs::from("", "", "commitlore").map(|dirs| dirs.config_dir().to_path_buf())
    }

    /// Get path to global config file
    pub fn global_config_path() -> Option<PathBuf> {
        Self::global_dir().map(|dir| dir.join("config.toml"))
    }

    /// Get path to project config file
    pub fn project_config_path() -> PathBuf {
        PathBuf::from(paths::PROJECT_DIR).join("config.toml")
    }

    /// Get project data directory
    pub fn project_dir() -> PathBuf {
        PathBuf::from(paths::PROJECT_DIR)
    }

    /// Check if project is initialized
    pub fn is_project_initialized() -> bool {
        Self::project_dir().exists()
    }

    // =========================================================================
    // Config Commands
    // =========================================================================

    /// Show config file paths
    pub fn show_path() {
        println!("Configuration paths:");
        println!();

        if let Some(global) = Self::global_config_path() {
            let exists = if global.exists() { "✓" } else { "✗" };
            println!("  Global:  {} {}", exists, global.display());
        } else {
            println!("  Global:  (not available)");
        }

        let project = Self::project_config_path();
        let exists = if project.exists() { "✓" } else { "✗" };
        println!("  Project: {} {}", exists, project.display());
    }

    /// Show current effective configuration
    pub fn show_config(as_json: bool) -> Result<()> {
        let config = Self::load()?;

        if as_json {
            println!("{}", serde_json::to_string_pretty(&config)?);
        } else {
            println!(
                "{}",
                toml::to_string_pretty(&config).map_err(|e| LoreError::Config(e.to_string()))?
            );
        }

        Ok(())
    }

    // =========================================================================
    // Initialization
    // =========================================================================

    /// Initialize global configuration
    pub fn init_global(force: bool) -> Result<PathBuf> {
        let global_dir = Self::global_dir().ok_or_else(|| {
            LoreError::Config("Cannot determine global config directory".to_string())
        })?;

        fs::create_dir_all(&global_dir)?;

        let config_path = global_dir.join("config.toml");
        if !config_path.exists() || force {
            fs::write(&config_path, Self::default_global_config())?;
            info!("Created global config: {}", config_path.display());
        } else {
            info!("Global config exists: {}", config_path.display());
        }

        Ok(global_dir)
    }

    /// Initialize project configuration and data directories
    pub fn init_project(repo_path: Option<&Path>) -> Result<PathBuf> {
        let project_dir = Self::project_dir();

        fs::create_dir_all(&project_dir)?;
        fs::create_dir_all(project_dir.join(paths::CHECKPOINT_DIR))?;

        let config_path = project_dir.join("config.toml");
        if !config_path.exists() {
            fs::write(&config_path, Self::default_project_config(repo_path))?;
            info!("Created project config: {}", config_path.display());
        }

        Ok(project_dir)
    }

    // =========================================================================
    // Internal
    // =========================================================================

    /// Generate default global config content (TOML)
    fn default_global_config() -> String {
        r#"# commitlore Global Configuration
# User-wide defaults. Project settings in .commitlore/config.toml override these.

version = "1.0"

# LLM settings
[llm]
provider = "ollama"
model = "llama3.1:8b-instruct-q8_0"
timeout_secs = 300

# Embedding settings
[embedding]
model = "nomic-embed-text"
"#
        .to_string()
    }

    /// Generate default project config content (TOML)
    fn default_project_config(repo_path: Option<&Path>) -> String {
        let repo = repo_path
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| ".".to_string());
        format!(
            r#"# commitlore Project Configuration
# Project-specific settings that override global defaults.

version = "1.0"

[repository]
path = "{}"
# branch = "master"

[checkpoint]
experiment = "baseline"

[filter]
min_diff_lines = 5

[index]
# api_base = "http://localhost:8000"
"#,
            repo
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_from_file_missing_uses_defaults() {
        let dir = tempfile::TempDir::new().unwrap();
        let config = ConfigLoader::load_from_file(&dir.path().join("nope.toml")).unwrap();
        assert_eq!(config.version, "1.0");
        assert_eq!(config.llm.provider, "ollama");
    }

    #[test]
    fn test_load_from_file_overrides_defaults() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            "[llm]\nprovider = \"openai\"\nmodel = \"gpt-4o-mini\"\n\n[checkpoint]\nexperiment = \"exp7\"\n",
        )
        .unwrap();

        let config = ConfigLoader::load_from_file(&path).unwrap();
        assert_eq!(config.llm.provider, "openai");
        assert_eq!(config.llm.model.as_deref(), Some("gpt-4o-mini"));
        assert_eq!(config.checkpoint.experiment, "exp7");
        // Untouched sections keep defaults
        assert_eq!(config.filter.min_diff_lines, 5);
    }

    #[test]
    fn test_invalid_values_rejected_on_load() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[llm]\ntemperature = 9.0\n").unwrap();
        assert!(ConfigLoader::load_from_file(&path).is_err());
    }
}
