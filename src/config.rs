use std::{io, path::PathBuf, str::Utf8Error};

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {error}")]
    FileRead { error: io::Error },

    #[error("Config file is not valid UTF-8: {error}")]
    FileParse { error: Utf8Error },

    #[error("Config is not valid JSON: {error}")]
    JsonParse { error: serde_json::Error },

    #[error("Cell size must be a positive number, got {cell_size}")]
    InvalidCellSize { cell_size: f64 },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct GridConfig {
    /// Cell edge length in degrees.
    pub cell_size: f64,
}

impl Default for GridConfig {
    fn default() -> Self {
        Self { cell_size: 0.0005 }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct GraphConfig {
    /// Written in place of a missing `maxspeed`.
    pub unknown_speed_limit: String,
}

impl Default for GraphConfig {
    fn default() -> Self {
        Self {
            unknown_speed_limit: "Unknown".to_string(),
        }
    }
}

fn default_progress_every() -> usize {
    1000
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct PipelineConfig {
    #[serde(default)]
    pub grid: GridConfig,

    #[serde(default)]
    pub graph: GraphConfig,

    /// Log progress every this many edges or records, 0 disables it.
    #[serde(default = "default_progress_every")]
    pub progress_every: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            grid: GridConfig::default(),
            graph: GraphConfig::default(),
            progress_every: default_progress_every(),
        }
    }
}

impl PipelineConfig {
    #[tracing::instrument]
    pub fn read_from_file(file: PathBuf) -> Result<Self, ConfigError> {
        let file = std::fs::read(file).map_err(|error| ConfigError::FileRead { error })?;
        let text =
            std::str::from_utf8(&file[..]).map_err(|error| ConfigError::FileParse { error })?;
        let config: PipelineConfig =
            serde_json::from_str(text).map_err(|error| ConfigError::JsonParse { error })?;

        config.validate()
    }

    pub fn read(file: Option<PathBuf>) -> Result<Self, ConfigError> {
        match file {
            None => Ok(Self::default()),
            Some(file) => Self::read_from_file(file),
        }
    }

    pub fn with_cell_size(mut self, cell_size: Option<f64>) -> Result<Self, ConfigError> {
        if let Some(cell_size) = cell_size {
            self.grid.cell_size = cell_size;
        }
        self.validate()
    }

    fn validate(self) -> Result<Self, ConfigError> {
        let cell_size = self.grid.cell_size;
        if !cell_size.is_finite() || cell_size <= 0.0 {
            return Err(ConfigError::InvalidCellSize { cell_size });
        }
        Ok(self)
    }

    pub fn schema() -> Result<String, ConfigError> {
        serde_json::to_string_pretty(&schemars::schema_for!(PipelineConfig))
            .map_err(|error| ConfigError::JsonParse { error })
    }
}
