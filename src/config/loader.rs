//! Configuration Loader (Figment-based)
//!
//! Loads and merges configuration from multiple sources using Figment:
//! 1. Built-in defaults (Serialized)
//! 2. Global config (~/.config/buildwright/config.toml)
//! 3. Project config (.buildwright/config.toml)
//! 4. Environment variables (BUILDWRIGHT_* prefix, `__` between sections)

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use super::types::Config;
use crate::types::{BuildwrightError, Result};

const ENV_PREFIX: &str = "BUILDWRIGHT_";

/// Configuration loader
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration with full resolution chain using Figment:
    /// defaults → global → project → env vars
    pub fn load() -> Result<Config> {
        Self::load_layers(
            Self::global_config_path().as_deref(),
            &Self::project_config_path(),
        )
    }

    /// Same chain with explicit file locations; missing files are skipped
    pub fn load_layers(global: Option<&Path>, project: &Path) -> Result<Config> {
        let mut figment = Figment::new().merge(Serialized::defaults(Config::default()));

        if let Some(global_path) = global
            && global_path.exists()
        {
            debug!("Loading global config from: {}", global_path.display());
            figment = figment.merge(Toml::file(global_path));
        }

        if project.exists() {
            debug!("Loading project config from: {}", project.display());
            figment = figment.merge(Toml::file(project));
        }

        // e.g. BUILDWRIGHT_QUOTA__DAILY_LIMIT -> quota.daily_limit
        figment = figment.merge(Env::prefixed(ENV_PREFIX).split("__").lowercase(true));

        Self::extract(figment)
    }

    /// Load configuration from a specific file only
    pub fn load_from_file(path: &Path) -> Result<Config> {
        if !path.exists() {
            return Err(BuildwrightError::Config(format!(
                "Config file not found: {}",
                path.display()
            )));
        }
        Self::extract(
            Figment::new()
                .merge(Serialized::defaults(Config::default()))
                .merge(Toml::file(path)),
        )
    }

    fn extract(figment: Figment) -> Result<Config> {
        let config: Config = figment
            .extract()
            .map_err(|e| BuildwrightError::Config(format!("Configuration error: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    // =========================================================================
    // Path Management
    // =========================================================================

    /// Get path to global config directory (~/.config/buildwright/)
    pub fn global_dir() -> Option<PathBuf> {
        env::var("XDG_CONFIG_HOME")
            .ok()
            .map(PathBuf::from)
            .or_else(|| {
                env::var("HOME")
                    .ok()
                    .map(|home| PathBuf::from(home).join(".config"))
            })
            .map(|p| p.join("buildwright"))
    }

    /// Get path to global config file
    pub fn global_config_path() -> Option<PathBuf> {
        Self::global_dir().map(|dir| dir.join("config.toml"))
    }

    /// Get path to project config file
    pub fn project_config_path() -> PathBuf {
        Self::project_dir().join("config.toml")
    }

    pub fn project_dir() -> PathBuf {
        PathBuf::from(".buildwright")
    }

    // =========================================================================
    // Rendering & Initialization
    // =========================================================================

    /// Effective configuration as TOML or pretty JSON
    pub fn render(config: &Config, as_json: bool) -> Result<String> {
        if as_json {
            Ok(serde_json::to_string_pretty(config)?)
        } else {
            toml::to_string_pretty(config).map_err(|e| BuildwrightError::Config(e.to_string()))
        }
    }

    /// Initialize global configuration
    pub fn init_global(force: bool) -> Result<PathBuf> {
        let global_dir = Self::global_dir().ok_or_else(|| {
            BuildwrightError::Config("Cannot determine global config directory".to_string())
        })?;
        Self::init_at(&global_dir, force)
    }

    /// Initialize project configuration under the current directory
    pub fn init_project(force: bool) -> Result<PathBuf> {
        Self::init_at(&Self::project_dir(), force)
    }

    /// Write the default config file into `dir`; an existing file is kept unless `force`
    pub fn init_at(dir: &Path, force: bool) -> Result<PathBuf> {
        fs::create_dir_all(dir)?;

        let config_path = dir.join("config.toml");
        if !config_path.exists() || force {
            fs::write(&config_path, Self::default_config())?;
            info!("Created config: {}", config_path.display());
        } else {
            info!("Config exists: {}", config_path.display());
        }

        Ok(config_path)
    }

    /// Generate default config content (TOML)
    fn default_config() -> String {
        r#"# Buildwright Configuration
# Project settings in .buildwright/config.toml override the global file.
# Any key can also be set from the environment, e.g. BUILDWRIGHT_QUOTA__DAILY_LIMIT.

[backend]
api_base = "https://generativelanguage.googleapis.com/v1beta"
model = "gemini-2.5-pro"
timeout_secs = 120
max_attempts = 3
throttle_wait_ms = 9000
thinking_budget = 10000

[rate_limit]
max_requests = 1
window_ms = 60000

[quota]
daily_limit = 2000000
minute_limit = 123999

[recovery]
max_auto_fix_attempts = 2

[credentials]
store = "keyring"
service = "buildwright"
"#
        .to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_missing_files_use_defaults() {
        let temp_dir = TempDir::new().unwrap();
        let config = ConfigLoader::load_layers(
            Some(&temp_dir.path().join("nope.toml")),
            &temp_dir.path().join("also-nope.toml"),
        )
        .unwrap();
        assert_eq!(config.recovery.max_auto_fix_attempts, 2);
    }

    #[test]
    fn test_project_overrides_global() {
        let temp_dir = TempDir::new().unwrap();
        let global = temp_dir.path().join("global.toml");
        let project = temp_dir.path().join("project.toml");
        fs::write(&global, "[quota]\ndaily_limit = 100\nminute_limit = 50\n").unwrap();
        fs::write(&project, "[quota]\ndaily_limit = 200\n").unwrap();

        let config = ConfigLoader::load_layers(Some(&global), &project).unwrap();
        assert_eq!(config.quota.daily_limit, 200);
        assert_eq!(config.quota.minute_limit, 50);
    }

    #[test]
    fn test_invalid_file_fails_validation() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("config.toml");
        fs::write(&path, "[backend]\nmax_attempts = 0\n").unwrap();

        assert!(matches!(
            ConfigLoader::load_from_file(&path),
            Err(BuildwrightError::Config(_))
        ));
    }

    #[test]
    fn test_load_from_missing_file() {
        let temp_dir = TempDir::new().unwrap();
        assert!(ConfigLoader::load_from_file(&temp_dir.path().join("x.toml")).is_err());
    }

    #[test]
    fn test_init_writes_loadable_default() {
        let temp_dir = TempDir::new().unwrap();
        let dir = temp_dir.path().join(".buildwright");

        let path = ConfigLoader::init_at(&dir, false).unwrap();
        assert!(path.exists());

        let config = ConfigLoader::load_from_file(&path).unwrap();
        assert_eq!(config.rate_limit.window_ms, 60_000);
        assert_eq!(config.backend.thinking_budget, 10_000);
    }

    #[test]
    fn test_init_keeps_existing_without_force() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("config.toml");
        fs::write(&path, "[recovery]\nmax_auto_fix_attempts = 5\n").unwrap();

        ConfigLoader::init_at(temp_dir.path(), false).unwrap();
        assert!(fs::read_to_string(&path).unwrap().contains("= 5"));

        ConfigLoader::init_at(temp_dir.path(), true).unwrap();
        assert!(fs::read_to_string(&path).unwrap().contains("= 2"));
    }

    #[test]
    fn test_env_override() {
        let temp_dir = TempDir::new().unwrap();
        // SAFETY: no other test reads this variable
        unsafe {
            env::set_var("BUILDWRIGHT_BACKEND__MODEL", "test-model");
        }
        let config =
            ConfigLoader::load_layers(None, &temp_dir.path().join("missing.toml")).unwrap();
        unsafe {
            env::remove_var("BUILDWRIGHT_BACKEND__MODEL");
        }
        assert_eq!(config.backend.model, "test-model");
    }

    #[test]
    fn test_render_formats() {
        let config = Config::default();
        let toml_text = ConfigLoader::render(&config, false).unwrap();
        assert!(toml_text.contains("[rate_limit]"));

        let json_text = ConfigLoader::render(&config, true).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json_text).unwrap();
        assert_eq!(value["credentials"]["store"], "keyring");
    }
}
