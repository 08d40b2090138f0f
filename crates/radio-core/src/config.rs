use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use super::platform;

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub player: PlayerConfig,
    #[serde(default)]
    pub paths: PathsConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlayerConfig {
    /// Explicit player binary. When unset, mpv is looked up beside the
    /// executable and then on `PATH`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub binary: Option<PathBuf>,
    /// Volume (0.0..=1.0) for stations that carry no volume of their own.
    #[serde(default = "default_volume")]
    pub default_volume: f32,
    /// Skip bundled binaries and only search `PATH`.
    #[serde(default)]
    pub use_system_deps: bool,
    /// Extra flags appended before the stream URL.
    #[serde(default)]
    pub extra_args: Vec<String>,
}

/// Where the two stores keep their documents.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathsConfig {
    #[serde(default = "default_blocklist_file")]
    pub blocklist_file: PathBuf,
    #[serde(default = "default_votes_file")]
    pub votes_file: PathBuf,
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            binary: None,
            default_volume: default_volume(),
            use_system_deps: false,
            extra_args: Vec::new(),
        }
    }
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            blocklist_file: default_blocklist_file(),
            votes_file: default_votes_file(),
        }
    }
}

fn default_volume() -> f32 {
    0.5
}

fn default_blocklist_file() -> PathBuf {
    platform::config_dir().join("blocklist.json")
}

fn default_votes_file() -> PathBuf {
    platform::config_dir().join("voted_stations.json")
}

impl Config {
    pub fn load() -> anyhow::Result<Self> {
        Self::load_from(&Self::config_path())
    }

    /// Load `path`, writing a default config there first if it is missing.
    pub fn load_from(path: &std::path::Path) -> anyhow::Result<Self> {
        if !path.exists() {
            let config = Self::default();
            config.save_to(path)?;
            return Ok(config);
        }

        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        Ok(config)
    }

    pub fn save_to(&self, path: &std::path::Path) -> anyhow::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    pub fn config_path() -> PathBuf {
        platform::config_dir().join("config.toml")
    }
}
