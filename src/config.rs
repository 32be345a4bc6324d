use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub notes: NotesConfig,
    pub preview: PreviewConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ServerConfig {
    pub name: String,
    pub version: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            name: "AggregateMCP".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct NotesConfig {
    pub data_file: PathBuf,
    pub html_file: PathBuf,
}

impl Default for NotesConfig {
    fn default() -> Self {
        Self {
            data_file: PathBuf::from("sticky_notes.json"),
            html_file: PathBuf::from("sticky_notes.html"),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct PreviewConfig {
    pub enabled: bool,
    pub webdriver_url: String,
    pub browser: String,
    pub args: Vec<String>,
    /// Pause after navigation so the page can load.
    pub settle_ms: u64,
}

impl Default for PreviewConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            webdriver_url: "http://localhost:9515".to_string(),
            browser: "MicrosoftEdge".to_string(),
            args: vec![
                "--disable-blink-features=AutomationControlled".to_string(),
                "--start-maximized".to_string(),
            ],
            settle_ms: 500,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path).context("Failed to read config file")?;

        let mut config: Config = toml::from_str(&content).context("Failed to parse config file")?;
        config.apply_env_overrides();

        Ok(config)
    }

    /// Load `path` if it exists, otherwise fall back to defaults.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        if path.as_ref().exists() {
            return Self::from_file(path);
        }
        let mut config = Config::default();
        config.apply_env_overrides();
        Ok(config)
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(path) = std::env::var("STICKY_NOTES_DATA_FILE") {
            self.notes.data_file = PathBuf::from(path);
        }
        if let Ok(path) = std::env::var("STICKY_NOTES_HTML_FILE") {
            self.notes.html_file = PathBuf::from(path);
        }
        if let Ok(url) = std::env::var("WEBDRIVER_URL") {
            self.preview.webdriver_url = url;
            self.preview.enabled = true;
        }
    }

    /// Create parent directories for the data and report files.
    pub fn ensure_directories(&self) -> Result<()> {
        for file in [&self.notes.data_file, &self.notes.html_file] {
            if let Some(dir) = file.parent().filter(|p| !p.as_os_str().is_empty()) {
                fs::create_dir_all(dir)
                    .with_context(|| format!("Failed to create directory {}", dir.display()))?;
            }
        }
        Ok(())
    }
}
