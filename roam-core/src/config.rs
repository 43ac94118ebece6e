use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::{ConfigError, Result};
use crate::store::BuildErrorPolicy;

pub const DEFAULT_SHORTLIST_SIZE: usize = 3;

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct RoamConfig {
    pub paths: PathsSection,
    #[serde(default)]
    pub store: StoreSection,
    #[serde(default)]
    pub engine: EngineSection,
    /// Directory of the file this config was read from; anchors a relative `base_dir`.
    #[serde(skip)]
    pub origin_dir: PathBuf,
}

impl RoamConfig {
    pub fn resolve_path<P: AsRef<Path>>(&self, candidate: P) -> PathBuf {
        let path = candidate.as_ref();
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.base_dir().join(path)
        }
    }

    pub fn base_dir(&self) -> PathBuf {
        let base = Path::new(&self.paths.base_dir);
        if base.is_absolute() {
            base.to_path_buf()
        } else {
            self.origin_dir.join(base)
        }
    }

    pub fn database_path(&self) -> PathBuf {
        self.resolve_path(&self.paths.database)
    }

    pub fn schema_path(&self) -> PathBuf {
        self.resolve_path(&self.paths.schema)
    }

    fn validate(&self) -> std::result::Result<(), String> {
        if self.paths.database.trim().is_empty() {
            return Err("paths.database must not be empty".to_string());
        }
        if self.paths.schema.trim().is_empty() {
            return Err("paths.schema must not be empty".to_string());
        }
        if self.engine.shortlist_size == 0 {
            return Err("engine.shortlist_size must be at least 1".to_string());
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct PathsSection {
    #[serde(default = "default_base_dir")]
    pub base_dir: String,
    pub database: String,
    pub schema: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct StoreSection {
    #[serde(default)]
    pub on_build_error: BuildErrorPolicy,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EngineSection {
    #[serde(default = "default_shortlist_size")]
    pub shortlist_size: usize,
}

impl Default for EngineSection {
    fn default() -> Self {
        Self {
            shortlist_size: DEFAULT_SHORTLIST_SIZE,
        }
    }
}

fn default_base_dir() -> String {
    ".".to_string()
}

fn default_shortlist_size() -> usize {
    DEFAULT_SHORTLIST_SIZE
}

pub fn load_roam_config<P: AsRef<Path>>(path: P) -> Result<RoamConfig> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        source,
        path: path.to_path_buf(),
    })?;
    let mut config = parse_roam_config(&content).map_err(|source| ConfigError::Parse {
        source,
        path: path.to_path_buf(),
    })?;
    config.origin_dir = path
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."));
    config.validate().map_err(|message| ConfigError::Invalid {
        path: path.to_path_buf(),
        message,
    })?;
    Ok(config)
}

pub fn parse_roam_config(content: &str) -> std::result::Result<RoamConfig, toml::de::Error> {
    toml::from_str(content)
}
