use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Deserialize, Serialize)]
pub struct Config {
    #[serde(default = "default_camera_dir")]
    pub camera_dir: PathBuf,

    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,

    #[serde(default = "default_viewport_width")]
    pub viewport_width: u32,

    #[serde(default = "default_mobile_breakpoint")]
    pub mobile_breakpoint: u32,

    #[serde(default = "default_ready_timeout_ms")]
    pub ready_timeout_ms: u64,

    #[serde(default = "default_switch_settle_ms")]
    pub switch_settle_ms: u64,

    #[serde(default = "default_jpeg_quality")]
    pub jpeg_quality: u8,

    #[serde(default)]
    pub background_removal_command: Option<String>,

    #[serde(default = "default_background_removal_timeout")]
    pub background_removal_timeout: u64,

    #[serde(default)]
    pub notify_command: Option<String>,
}

fn default_camera_dir() -> PathBuf {
    PathBuf::from("camera")
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("photos")
}

fn default_viewport_width() -> u32 {
    1280
}

fn default_mobile_breakpoint() -> u32 {
    768
}

fn default_ready_timeout_ms() -> u64 {
    4000
}

fn default_switch_settle_ms() -> u64 {
    100
}

fn default_jpeg_quality() -> u8 {
    80
}

fn default_background_removal_timeout() -> u64 {
    30
}

impl Default for Config {
    fn default() -> Self {
        Self {
            camera_dir: default_camera_dir(),
            output_dir: default_output_dir(),
            viewport_width: default_viewport_width(),
            mobile_breakpoint: default_mobile_breakpoint(),
            ready_timeout_ms: default_ready_timeout_ms(),
            switch_settle_ms: default_switch_settle_ms(),
            jpeg_quality: default_jpeg_quality(),
            background_removal_command: None,
            background_removal_timeout: default_background_removal_timeout(),
            notify_command: None,
        }
    }
}

impl Config {
    /// Load configuration from the default location (~/.config/styleshot/config.json)
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path()?;

        if !config_path.exists() {
            tracing::info!(
                "Config file not found at {:?}, creating default config",
                config_path
            );
            let config = Self::default();
            config.save()?;
            return Ok(config);
        }

        let contents = std::fs::read_to_string(&config_path)
            .with_context(|| format!("Failed to read config file: {:?}", config_path))?;

        let config = Self::parse(&contents)
            .with_context(|| format!("Failed to parse config file: {:?}", config_path))?;

        tracing::info!("Loaded config from {:?}", config_path);
        Ok(config)
    }

    pub fn parse(contents: &str) -> Result<Self> {
        Ok(serde_json::from_str(contents)?)
    }

    /// Save configuration to the default location
    pub fn save(&self) -> Result<()> {
        let config_path = Self::config_path()?;

        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create config directory: {:?}", parent))?;
        }

        let contents = serde_json::to_string_pretty(self).context("Failed to serialize config")?;

        std::fs::write(&config_path, contents)
            .with_context(|| format!("Failed to write config file: {:?}", config_path))?;

        tracing::info!("Saved config to {:?}", config_path);
        Ok(())
    }

    /// Get the path to the configuration file
    fn config_path() -> Result<PathBuf> {
        let config_dir = if let Ok(dir) = std::env::var("XDG_CONFIG_HOME") {
            PathBuf::from(dir)
        } else {
            let home = std::env::var("HOME").context("HOME environment variable not set")?;
            PathBuf::from(home).join(".config")
        };

        Ok(config_dir.join("styleshot").join("config.json"))
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.camera_dir.as_os_str().is_empty() {
            return Err(anyhow::anyhow!("camera_dir cannot be empty"));
        }

        if self.output_dir.as_os_str().is_empty() {
            return Err(anyhow::anyhow!("output_dir cannot be empty"));
        }

        if !(1..=100).contains(&self.jpeg_quality) {
            return Err(anyhow::anyhow!("jpeg_quality must be between 1 and 100"));
        }

        if self.ready_timeout_ms == 0 {
            return Err(anyhow::anyhow!("ready_timeout_ms must be greater than 0"));
        }

        if self
            .background_removal_command
            .as_deref()
            .is_some_and(|c| c.trim().is_empty())
        {
            return Err(anyhow::anyhow!(
                "background_removal_command cannot be blank (omit it instead)"
            ));
        }

        Ok(())
    }
}
