use anyhow::{anyhow, Result};
use hostd_core::config::HostdConfig;
use std::path::{Path, PathBuf};

/// Overrides collected from flags and environment variables.
#[derive(Debug, Default, Clone)]
pub struct Overrides {
    pub socket: Option<PathBuf>,
    pub socket_mode: Option<String>,
    pub gpu_shed_script: Option<PathBuf>,
    pub shed_state_file: Option<PathBuf>,
}

/// Resolve the effective configuration.
///
/// Priority:
/// 1. Flag / environment variable (passed in as `overrides`)
/// 2. Config file, when one is given
/// 3. Built-in defaults
pub fn resolve(config_path: Option<&Path>, overrides: Overrides) -> Result<HostdConfig> {
    let mut config = HostdConfig::load_or_default(config_path).map_err(|e| anyhow!("{e}"))?;
    if let Some(socket) = overrides.socket {
        config.socket = socket;
    }
    if let Some(mode) = overrides.socket_mode {
        config.socket_mode = mode;
    }
    if let Some(script) = overrides.gpu_shed_script {
        config.gpu_shed_script = script;
    }
    if let Some(state_file) = overrides.shed_state_file {
        config.shed_state_file = state_file;
    }
    Ok(config)
}
