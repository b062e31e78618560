//! Daemon configuration.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use directories::ProjectDirs;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use whisper_pipewire::{HostSpawn, ToolPaths};

/// Daemon configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Config {
    /// Daemon settings
    #[serde(default)]
    pub daemon: DaemonConfig,
    /// Link polling
    #[serde(default)]
    pub poll: PollConfig,
    /// Volume writes
    #[serde(default)]
    pub volume: VolumeConfig,
    /// External tools
    #[serde(default)]
    pub tools: ToolsConfig,
    /// Presentation settings
    #[serde(default)]
    pub ui: UiConfig,
}

/// Daemon-specific settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DaemonConfig {
    /// Log level
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self { log_level: default_log_level() }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Poll loop settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PollConfig {
    /// Seconds between background refreshes
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self { interval_secs: default_interval_secs() }
    }
}

impl PollConfig {
    #[must_use]
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs.max(1))
    }
}

fn default_interval_secs() -> u64 {
    10
}

/// Volume debounce settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VolumeConfig {
    /// Quiescence window before a volume write is applied
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,
}

impl Default for VolumeConfig {
    fn default() -> Self {
        Self { debounce_ms: default_debounce_ms() }
    }
}

impl VolumeConfig {
    #[must_use]
    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }
}

fn default_debounce_ms() -> u64 {
    500
}

/// External tool settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolsConfig {
    #[serde(default = "default_pw_link")]
    pub pw_link: String,
    #[serde(default = "default_pw_cli")]
    pub pw_cli: String,
    #[serde(default = "default_pactl")]
    pub pactl: String,
    /// Whether to run tools through `flatpak-spawn --host`
    #[serde(default)]
    pub host_spawn: HostSpawn,
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            pw_link: default_pw_link(),
            pw_cli: default_pw_cli(),
            pactl: default_pactl(),
            host_spawn: HostSpawn::default(),
        }
    }
}

impl ToolsConfig {
    #[must_use]
    pub fn paths(&self) -> ToolPaths {
        ToolPaths {
            pw_link: self.pw_link.clone(),
            pw_cli: self.pw_cli.clone(),
            pactl: self.pactl.clone(),
        }
    }
}

fn default_pw_link() -> String {
    "pw-link".to_string()
}

fn default_pw_cli() -> String {
    "pw-cli".to_string()
}

fn default_pactl() -> String {
    "pactl".to_string()
}

/// Presentation settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct UiConfig {
    /// Show raw link ids next to each device link
    #[serde(default)]
    pub show_connection_ids: bool,
}

/// Load configuration from the default location or defaults.
pub fn load_config() -> Result<(Config, PathBuf)> {
    let config_path = config_path()?;
    let config = load_from(&config_path)?;
    Ok((config, config_path))
}

/// Load configuration from a file, falling back to defaults when absent.
pub fn load_from(config_path: &Path) -> Result<Config> {
    if config_path.exists() {
        let content = std::fs::read_to_string(config_path)
            .with_context(|| format!("Failed to read config file: {config_path:?}"))?;
        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {config_path:?}"))?;
        Ok(config)
    } else {
        info!(?config_path, "Config file not found, using defaults");
        Ok(Config::default())
    }
}

/// Write configuration to a file, creating parent directories.
pub fn save_to(config: &Config, config_path: &Path) -> Result<()> {
    if let Some(parent) = config_path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create config directory: {parent:?}"))?;
    }
    let content = toml::to_string_pretty(config).context("Failed to serialize config")?;
    std::fs::write(config_path, content)
        .with_context(|| format!("Failed to write config file: {config_path:?}"))?;
    Ok(())
}

/// Get the configuration file path.
fn config_path() -> Result<PathBuf> {
    let dirs = ProjectDirs::from("it", "mijorus", "Whisper")
        .context("Could not determine config directory")?;
    Ok(dirs.config_dir().join("config.toml"))
}

/// Settings that can change while the daemon runs.
pub struct Settings {
    config: RwLock<Config>,
    path: Option<PathBuf>,
}

impl Settings {
    /// Settings persisted to `path` whenever they change.
    #[must_use]
    pub fn new(config: Config, path: Option<PathBuf>) -> Self {
        Self { config: RwLock::new(config), path }
    }

    #[must_use]
    pub fn show_connection_ids(&self) -> bool {
        self.config.read().ui.show_connection_ids
    }

    /// Update the flag and persist it.
    ///
    /// The in-memory value changes even when writing the file fails.
    pub fn set_show_connection_ids(&self, enabled: bool) -> Result<()> {
        let snapshot = {
            let mut config = self.config.write();
            config.ui.show_connection_ids = enabled;
            config.clone()
        };

        match &self.path {
            Some(path) => save_to(&snapshot, path),
            None => {
                warn!("No config path, setting not persisted");
                Ok(())
            }
        }
    }
}
