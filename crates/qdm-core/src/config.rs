use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

/// Global configuration loaded from `~/.config/qdm/config.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QdmConfig {
    /// Maximum number of tasks downloading at once.
    pub max_parallel: usize,
    /// Maximum total concurrent HTTP transfers across all tasks.
    pub max_total_connections: usize,
    /// Maximum concurrent HTTP transfers per host.
    pub max_connections_per_host: usize,
    /// Directory downloads are written into. Relative paths resolve against
    /// the working directory of the process.
    pub download_dir: PathBuf,
    /// Timeout for metadata probe requests, in seconds.
    pub probe_timeout_secs: u64,
}

impl Default for QdmConfig {
    fn default() -> Self {
        Self {
            max_parallel: 1,
            max_total_connections: 64,
            max_connections_per_host: 16,
            download_dir: PathBuf::from("downloads"),
            probe_timeout_secs: 10,
        }
    }
}

pub fn config_path() -> Result<PathBuf> {
    let xdg_dirs = xdg::BaseDirectories::with_prefix("qdm")?;
    Ok(xdg_dirs.place_config_file("config.toml")?)
}

/// Load configuration from disk, creating a default file if none exists.
pub fn load_or_init() -> Result<QdmConfig> {
    let path = config_path()?;
    if !path.exists() {
        let default_cfg = QdmConfig::default();
        let toml = toml::to_string_pretty(&default_cfg)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, toml)?;
        tracing::info!("created default config at {}", path.display());
        return Ok(default_cfg);
    }

    let data = fs::read_to_string(&path)?;
    let cfg: QdmConfig = toml::from_str(&data)?;
    Ok(cfg)
}
