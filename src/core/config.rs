//! Configuration management with layered hierarchy

use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use super::error::StoreError;
use super::project::Project;

/// What selling an already-sold device does
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResalePolicy {
    /// Refuse the sale with `AlreadySold`
    #[default]
    Reject,
    /// Record another sale against the device
    Allow,
}

impl FromStr for ResalePolicy {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "reject" => Ok(ResalePolicy::Reject),
            "allow" => Ok(ResalePolicy::Allow),
            other => Err(StoreError::Config(format!(
                "resale_policy must be 'reject' or 'allow', got '{}'",
                other
            ))),
        }
    }
}

/// Tally configuration with layered hierarchy
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Prefix for monetary report columns
    pub currency_symbol: Option<String>,

    /// Write a UTF-8 BOM at the start of CSV exports
    pub csv_bom: Option<bool>,

    /// Policy for selling a device that is already sold
    pub resale_policy: Option<ResalePolicy>,

    /// Default output format
    pub default_format: Option<String>,

    /// Command used to open HTML print previews
    pub open_command: Option<String>,
}

impl Config {
    /// Load configuration for a known project (or none), merging in priority order
    pub fn load_for(project: Option<&Project>) -> Self {
        let mut config = Config::default();

        // 1. Built-in defaults (already in Default impl)

        // 2. Global user config (~/.config/tally/config.yaml)
        if let Some(global_path) = Self::global_config_path() {
            if let Some(global) = Self::read_file(&global_path) {
                config.merge(global);
            }
        }

        // 3. Project config (.tally/config.yaml)
        if let Some(project) = project {
            if let Some(project_config) = Self::read_file(&project.tally_dir().join("config.yaml")) {
                config.merge(project_config);
            }
        }

        // 4. Environment variables
        config.apply_env();

        config
    }

    fn read_file(path: &Path) -> Option<Config> {
        if !path.exists() {
            return None;
        }
        let contents = std::fs::read_to_string(path).ok()?;
        match serde_yml::from_str::<Config>(&contents) {
            Ok(config) => Some(config),
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "ignoring unreadable config file");
                None
            }
        }
    }

    fn apply_env(&mut self) {
        if let Ok(symbol) = std::env::var("TALLY_CURRENCY") {
            self.currency_symbol = Some(symbol);
        }
        if let Ok(bom) = std::env::var("TALLY_CSV_BOM") {
            self.csv_bom = Some(matches!(bom.to_ascii_lowercase().as_str(), "1" | "true" | "yes"));
        }
        if let Ok(policy) = std::env::var("TALLY_RESALE") {
            match policy.parse() {
                Ok(policy) => self.resale_policy = Some(policy),
                Err(e) => tracing::warn!(error = %e, "ignoring TALLY_RESALE"),
            }
        }
    }

    /// Get the path to the global config file
    fn global_config_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("", "", "tally")
            .map(|dirs| dirs.config_dir().join("config.yaml"))
    }

    /// Merge another config into this one (other takes precedence)
    fn merge(&mut self, other: Config) {
        if other.currency_symbol.is_some() {
            self.currency_symbol = other.currency_symbol;
        }
        if other.csv_bom.is_some() {
            self.csv_bom = other.csv_bom;
        }
        if other.resale_policy.is_some() {
            self.resale_policy = other.resale_policy;
        }
        if other.default_format.is_some() {
            self.default_format = other.default_format;
        }
        if other.open_command.is_some() {
            self.open_command = other.open_command;
        }
    }

    pub fn currency_symbol(&self) -> &str {
        self.currency_symbol.as_deref().unwrap_or("$")
    }

    pub fn csv_bom(&self) -> bool {
        self.csv_bom.unwrap_or(false)
    }

    pub fn resale_policy(&self) -> ResalePolicy {
        self.resale_policy.unwrap_or_default()
    }

    /// Open a file with the configured or platform default application
    pub fn open_in_browser(&self, file_path: &Path) -> std::io::Result<std::process::ExitStatus> {
        if let Some(command) = self.open_command.as_deref().filter(|c| !c.trim().is_empty()) {
            let parts: Vec<&str> = command.split_whitespace().collect();
            return std::process::Command::new(parts[0])
                .args(&parts[1..])
                .arg(file_path)
                .status();
        }

        if cfg!(target_os = "macos") {
            std::process::Command::new("open").arg(file_path).status()
        } else if cfg!(target_os = "windows") {
            std::process::Command::new("cmd")
                .args(["/C", "start", ""])
                .arg(file_path)
                .status()
        } else {
            std::process::Command::new("xdg-open").arg(file_path).status()
        }
    }
}
