//! Host settings, read from the environment.

use std::path::PathBuf;
use std::time::Duration;

use notebridge_sync::discovery::DEFAULT_PORT;
use notebridge_sync::server::ServerConfig;

pub const ENV_BIND: &str = "NOTEBRIDGE_BIND";
pub const ENV_DATA_DIR: &str = "NOTEBRIDGE_DATA_DIR";
pub const ENV_DEVICE_NAME: &str = "NOTEBRIDGE_DEVICE_NAME";

#[derive(Debug, Clone, PartialEq)]
pub struct HostConfig {
    pub bind_addr: String,
    pub data_dir: PathBuf,
    pub device_name: String,
    /// How often the open notebook is written back to disk.
    pub autosave_interval: Duration,
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            bind_addr: format!("0.0.0.0:{DEFAULT_PORT}"),
            data_dir: PathBuf::from("notebooks"),
            device_name: "NoteBridge Host".to_string(),
            autosave_interval: Duration::from_secs(30),
        }
    }
}

impl HostConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Defaults overridden by whatever `lookup` returns. Blank values are ignored.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let mut config = Self::default();
        if let Some(bind) = get(ENV_BIND) {
            config.bind_addr = bind;
        }
        if let Some(dir) = get(ENV_DATA_DIR) {
            config.data_dir = PathBuf::from(dir);
        }
        if let Some(name) = get(ENV_DEVICE_NAME) {
            config.device_name = name;
        }
        config
    }

    pub fn server_config(&self) -> ServerConfig {
        ServerConfig {
            bind_addr: self.bind_addr.clone(),
            device_name: self.device_name.clone(),
            ..ServerConfig::default()
        }
    }
}
