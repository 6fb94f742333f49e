//! Project discovery and structure

use std::path::{Path, PathBuf};
use thiserror::Error;

use super::db::Domain;

/// Directory marking a tally project root
pub const PROJECT_DIR: &str = ".tally";

/// Represents a tally project: a directory holding `.tally/` and its databases
#[derive(Debug)]
pub struct Project {
    /// Root directory of the project (parent of .tally/)
    root: PathBuf,
}

impl Project {
    /// Find project root by walking up from the current directory
    pub fn discover() -> Result<Self, ProjectError> {
        let current = std::env::current_dir().map_err(|e| ProjectError::IoError(e.to_string()))?;
        Self::discover_from(&current)
    }

    /// Find project root by walking up from the given directory
    pub fn discover_from(start: &Path) -> Result<Self, ProjectError> {
        let mut current = start
            .canonicalize()
            .map_err(|e| ProjectError::IoError(e.to_string()))?;

        loop {
            if current.join(PROJECT_DIR).is_dir() {
                return Ok(Self { root: current });
            }

            if !current.pop() {
                return Err(ProjectError::NotFound {
                    searched_from: start.to_path_buf(),
                });
            }
        }
    }

    /// Create a new project at the given path
    pub fn init(path: &Path) -> Result<Self, ProjectError> {
        let root = path.canonicalize().unwrap_or_else(|_| path.to_path_buf());
        if root.join(PROJECT_DIR).exists() {
            return Err(ProjectError::AlreadyExists(root));
        }
        Self::init_force(&root)
    }

    /// Initialize even if .tally/ exists; an existing config is kept
    pub fn init_force(path: &Path) -> Result<Self, ProjectError> {
        let root = path.canonicalize().unwrap_or_else(|_| path.to_path_buf());
        let dir = root.join(PROJECT_DIR);
        std::fs::create_dir_all(&dir).map_err(|e| ProjectError::IoError(e.to_string()))?;

        let config_path = dir.join("config.yaml");
        if !config_path.exists() {
            std::fs::write(&config_path, Self::default_config())
                .map_err(|e| ProjectError::IoError(e.to_string()))?;
        }

        Ok(Self { root })
    }

    fn default_config() -> &'static str {
        r#"# Tally project configuration

# Symbol prefixed to monetary report columns
# currency_symbol: "$"

# Write a UTF-8 byte order mark at the start of CSV exports
# csv_bom: false

# What to do when selling a device that is already sold (reject, allow)
# resale_policy: reject

# Default output format (auto, tsv, json, yaml, csv, md, id)
# default_format: auto

# Command used to open HTML print previews (default: platform opener)
# open_command: ""
"#
    }

    /// Get the project root directory
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Get the .tally configuration directory
    pub fn tally_dir(&self) -> PathBuf {
        self.root.join(PROJECT_DIR)
    }

    /// Database file for one domain
    pub fn db_path(&self, domain: Domain) -> PathBuf {
        self.tally_dir().join(domain.file_name())
    }
}

/// Errors that can occur during project operations
#[derive(Debug, Error)]
pub enum ProjectError {
    #[error("not a tally project (searched from {searched_from:?}). Run 'tally init' to create one.")]
    NotFound { searched_from: PathBuf },

    #[error("tally project already exists at {0:?}")]
    AlreadyExists(PathBuf),

    #[error("IO error: {0}")]
    IoError(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_project_init_creates_structure() {
        let tmp = tempdir().unwrap();
        let project = Project::init(tmp.path()).unwrap();

        assert!(project.tally_dir().is_dir());
        assert!(project.tally_dir().join("config.yaml").exists());
        assert_eq!(
            project.db_path(Domain::Clinical),
            project.tally_dir().join("Informations.db")
        );
    }

    #[test]
    fn test_project_init_twice_fails_unless_forced() {
        let tmp = tempdir().unwrap();
        Project::init(tmp.path()).unwrap();
        assert!(matches!(
            Project::init(tmp.path()),
            Err(ProjectError::AlreadyExists(_))
        ));
        Project::init_force(tmp.path()).unwrap();
    }

    #[test]
    fn test_discover_walks_up() {
        let tmp = tempdir().unwrap();
        Project::init(tmp.path()).unwrap();
        let nested = tmp.path().join("a").join("b");
        std::fs::create_dir_all(&nested).unwrap();

        let project = Project::discover_from(&nested).unwrap();
        assert_eq!(project.root(), tmp.path().canonicalize().unwrap());
    }

    #[test]
    fn test_discover_fails_outside_project() {
        let tmp = tempdir().unwrap();
        assert!(matches!(
            Project::discover_from(tmp.path()),
            Err(ProjectError::NotFound { .. })
        ));
    }
}
