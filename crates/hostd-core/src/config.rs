use crate::error::{HostdError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

// ---------------------------------------------------------------------------
// ConfigWarning / WarnLevel
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigWarning {
    pub level: WarnLevel,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WarnLevel {
    Warning,
    Error,
}

// ---------------------------------------------------------------------------
// HostdConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HostdConfig {
    #[serde(default = "default_socket")]
    pub socket: PathBuf,
    /// Octal permission bits applied to the socket file, e.g. `"666"`.
    #[serde(default = "default_socket_mode")]
    pub socket_mode: String,
    #[serde(default = "default_gpu_shed_script")]
    pub gpu_shed_script: PathBuf,
    #[serde(default = "default_shed_state_file")]
    pub shed_state_file: PathBuf,
}

fn default_socket() -> PathBuf {
    PathBuf::from("/data/ai/hostd/run/hostd.sock")
}

fn default_socket_mode() -> String {
    "666".to_string()
}

fn default_gpu_shed_script() -> PathBuf {
    PathBuf::from("/opt/scripts/main/gpu-shed.sh")
}

fn default_shed_state_file() -> PathBuf {
    PathBuf::from("/run/gpu-shed.stopped")
}

impl Default for HostdConfig {
    fn default() -> Self {
        Self {
            socket: default_socket(),
            socket_mode: default_socket_mode(),
            gpu_shed_script: default_gpu_shed_script(),
            shed_state_file: default_shed_state_file(),
        }
    }
}

impl HostdConfig {
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(HostdError::ConfigNotFound(path.to_path_buf()));
        }
        let data = std::fs::read_to_string(path)?;
        let cfg: HostdConfig = serde_yaml::from_str(&data)?;
        Ok(cfg)
    }

    /// Load from `path` when given, otherwise use defaults.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(p) => Self::load(p),
            None => Ok(Self::default()),
        }
    }

    pub fn to_yaml(&self) -> Result<String> {
        Ok(serde_yaml::to_string(self)?)
    }

    /// Parsed socket permission bits.
    pub fn socket_mode_bits(&self) -> Result<u32> {
        parse_mode(&self.socket_mode)
    }

    pub fn validate(&self) -> Vec<ConfigWarning> {
        let mut warnings = Vec::new();

        if let Err(e) = self.socket_mode_bits() {
            warnings.push(ConfigWarning {
                level: WarnLevel::Error,
                message: e.to_string(),
            });
        }

        if self.socket.is_relative() {
            warnings.push(ConfigWarning {
                level: WarnLevel::Warning,
                message: format!(
                    "socket path '{}' is relative; it resolves against the daemon's working directory",
                    self.socket.display()
                ),
            });
        }

        if !self.gpu_shed_script.exists() {
            warnings.push(ConfigWarning {
                level: WarnLevel::Warning,
                message: format!(
                    "gpu_shed_script '{}' does not exist; runs will fail until it is installed",
                    self.gpu_shed_script.display()
                ),
            });
        }

        warnings
    }
}

fn parse_mode(s: &str) -> Result<u32> {
    let trimmed = s.trim().trim_start_matches("0o");
    match u32::from_str_radix(trimmed, 8) {
        Ok(bits) if !trimmed.is_empty() && bits <= 0o7777 => Ok(bits),
        _ => Err(HostdError::InvalidSocketMode(s.to_string())),
    }
}
