use std::{
    fs::File,
    io::{self, BufRead, BufReader},
    path::{Path, PathBuf},
};

use serde::de::DeserializeOwned;
use tracing::info;

use crate::map_data::{
    graph::{GraphNodeRecord, StreetGraph},
    grid::{GridCellRecord, GridError, GridMetadataRecord, StreetGrid},
    MapDataError,
};

#[derive(Debug, thiserror::Error)]
pub enum ResultReaderError {
    #[error("Failed to read {file:?}: {error}")]
    FileRead { file: PathBuf, error: io::Error },

    #[error("Failed to parse {file:?} line {line}: {error}")]
    JsonParse {
        file: PathBuf,
        line: usize,
        error: serde_json::Error,
    },

    #[error("Grid file {file:?} has no metadata line")]
    MissingMetadata { file: PathBuf },

    #[error("Graph is inconsistent: {error}")]
    Graph { error: MapDataError },

    #[error("Grid is invalid: {error}")]
    Grid { error: GridError },
}

/// Non blank, non `#` lines of a file with their 1-based line numbers.
fn read_json_lines(file: &Path) -> Result<Vec<(usize, String)>, ResultReaderError> {
    let f = File::open(file).map_err(|error| ResultReaderError::FileRead {
        file: file.to_path_buf(),
        error,
    })?;
    let mut lines = Vec::new();
    for (idx, line) in BufReader::new(f).lines().enumerate() {
        let line = line.map_err(|error| ResultReaderError::FileRead {
            file: file.to_path_buf(),
            error,
        })?;
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        lines.push((idx + 1, trimmed.to_string()));
    }
    Ok(lines)
}

fn parse_line<T: DeserializeOwned>(
    file: &Path,
    line: usize,
    text: &str,
) -> Result<T, ResultReaderError> {
    serde_json::from_str(text).map_err(|error| ResultReaderError::JsonParse {
        file: file.to_path_buf(),
        line,
        error,
    })
}

impl StreetGraph {
    #[tracing::instrument]
    pub fn read_jsonl(file: &Path, unknown_speed_limit: &str) -> Result<Self, ResultReaderError> {
        let records = read_json_lines(file)?
            .iter()
            .map(|(line, text)| parse_line::<GraphNodeRecord>(file, *line, text))
            .collect::<Result<Vec<_>, _>>()?;
        let graph = StreetGraph::from_records(records, unknown_speed_limit)
            .map_err(|error| ResultReaderError::Graph { error })?;
        info!(nodes = graph.len(), "Graph loaded");
        Ok(graph)
    }
}

impl StreetGrid {
    /// First record is the metadata, every further record a cell.
    #[tracing::instrument]
    pub fn read_jsonl(file: &Path) -> Result<Self, ResultReaderError> {
        let lines = read_json_lines(file)?;
        let Some((metadata_line, metadata_text)) = lines.first() else {
            return Err(ResultReaderError::MissingMetadata {
                file: file.to_path_buf(),
            });
        };
        let metadata: GridMetadataRecord = parse_line(file, *metadata_line, metadata_text)?;
        let cells = lines[1..]
            .iter()
            .map(|(line, text)| parse_line::<GridCellRecord>(file, *line, text))
            .collect::<Result<Vec<_>, _>>()?;

        let grid = StreetGrid::from_records(metadata, cells)
            .map_err(|error| ResultReaderError::Grid { error })?;
        info!(
            cells = grid.cell_count(),
            segments = grid.segment_count(),
            "Grid loaded"
        );
        Ok(grid)
    }
}
