//! CLI Common Utilities
//!
//! Shared configuration and client construction for command handlers.

use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::ai::{BackendClient, CredentialVault, HttpTransport, ResilienceState};
use crate::config::{Config, ConfigLoader};
use crate::types::{Result, ResultExt};

/// Command execution context
///
/// Created once in `main` from the resolved configuration and handed to
/// every command that needs it.
#[derive(Debug, Clone)]
pub struct CommandContext {
    pub config: Config,
    /// Explicit `--config` file, when given
    pub config_path: Option<PathBuf>,
}

impl CommandContext {
    /// Load configuration from `path` only, or the full resolution chain
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let config = match path {
            Some(path) => ConfigLoader::load_from_file(path)?,
            None => ConfigLoader::load()?,
        };
        Ok(Self {
            config,
            config_path: path.map(Path::to_path_buf),
        })
    }

    pub fn from_config(config: Config) -> Self {
        Self {
            config,
            config_path: None,
        }
    }

    pub fn open_vault(&self) -> Result<CredentialVault> {
        self.config.credentials.open_vault()
    }

    /// Client over a fresh resilience state and the HTTP transport
    pub fn backend_client(&self) -> Result<BackendClient> {
        let backend = &self.config.backend;
        let state = ResilienceState::from_config(&self.config, self.open_vault()?).shared();
        let transport = HttpTransport::new(&backend.api_base, &backend.model, backend.timeouts())?;
        Ok(BackendClient::with_options(
            state,
            Arc::new(transport),
            backend.client_options(),
        ))
    }
}

/// Read a file, or stdin when no path (or `-`) is given
pub fn read_input(path: Option<&Path>) -> Result<String> {
    match path {
        Some(path) if path != Path::new("-") => {
            std::fs::read_to_string(path).with_context(format!("Cannot read {}", path.display()))
        }
        _ => {
            let mut buffer = String::new();
            std::io::stdin().read_to_string(&mut buffer)?;
            Ok(buffer)
        }
    }
}
