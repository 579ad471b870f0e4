use std::net::IpAddr;
use std::path::PathBuf;

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

use crate::error::{DropError, Result};

pub const DEFAULT_PORT: u16 = 8000;

/// 10 GiB, matching the largest drop we are willing to buffer through the
/// upload endpoint.
pub const MAX_BODY_BYTES: usize = 10 * 1024 * 1024 * 1024;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub host: IpAddr,
    pub port: u16,
    pub upload_dir: PathBuf,
    /// Transfer directories older than this are swept by the cleanup task.
    pub auto_cleanup_hours: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: IpAddr::from([0, 0, 0, 0]),
            port: DEFAULT_PORT,
            upload_dir: PathBuf::from("./uploads"),
            auto_cleanup_hours: 24,
        }
    }
}

impl Config {
    /// Loads the config file from the platform config dir, creating it with
    /// defaults on first run. `LANDROP_*` environment variables override both.
    pub fn load() -> Result<Self> {
        let dirs = directories::BaseDirs::new().ok_or(DropError::NoHomeDir)?;
        let config_file = dirs.config_dir().join("landrop.toml");

        let defaults = Self {
            upload_dir: dirs.data_local_dir().join("landrop").join("uploads"),
            ..Default::default()
        };

        if !config_file.exists() {
            log::info!("creating config file at {config_file:?}");
            if let Some(parent) = config_file.parent() {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::write(&config_file, toml::to_string(&defaults)?)?;
        }

        let config: Self = Figment::from(Serialized::defaults(defaults))
            .merge(Toml::file(config_file))
            .merge(Env::prefixed("LANDROP_"))
            .extract()
            .map_err(Box::new)?; // boxed because the error size from figment is large

        log::info!("using config: {config:?}");

        Ok(config)
    }
}
