use crate::map_data::osm::{OsmEntity, OsmNode, OsmWay};
use std::{io, path::PathBuf};

pub mod classifier;
pub mod data_reader;
pub mod json_reader;
pub mod json_writer;
pub mod pbf_reader;

#[derive(Debug, thiserror::Error)]
pub enum OsmDataReaderError {
    #[error("File error: {error}")]
    FileError { error: io::Error },

    #[error("Failed to parse line {line} of {file:?}: {error}")]
    JsonParseError {
        file: PathBuf,
        line: usize,
        error: serde_json::Error,
    },

    #[error("Failed to open PBF file: {error}")]
    PbfFileOpenError { error: io::Error },

    #[error("Failed to read PBF file: {error}")]
    PbfFileReadError { error: osmpbfreader::Error },

    #[error("Unsupported input file {file:?}, expected .pbf, .json or .jsonl")]
    UnsupportedFormat { file: PathBuf },
}

#[derive(Debug, thiserror::Error)]
pub enum OsmDataWriterError {
    #[error("Failed to create {file:?}: {error}")]
    FileCreate { file: PathBuf, error: io::Error },

    #[error("Failed to serialize element {id}: {error}")]
    Serialize { id: i64, error: serde_json::Error },

    #[error("Failed to write element {id} to {file:?}: {error}")]
    Write {
        file: PathBuf,
        id: i64,
        error: io::Error,
    },

    #[error("Failed to finalize {file:?}: {error}")]
    Close { file: PathBuf, error: io::Error },

    #[error("Write of element {id} after {file:?} was closed")]
    AlreadyClosed { file: PathBuf, id: i64 },
}

#[derive(Debug, PartialEq, Clone)]
pub enum DataSource {
    JsonFile { file: PathBuf },
    PbfFile { file: PathBuf },
}

impl DataSource {
    pub fn from_path(file: PathBuf) -> Result<Self, OsmDataReaderError> {
        match file.extension().and_then(|ext| ext.to_str()) {
            Some("pbf") => Ok(DataSource::PbfFile { file }),
            Some("json") | Some("jsonl") => Ok(DataSource::JsonFile { file }),
            _ => Err(OsmDataReaderError::UnsupportedFormat { file }),
        }
    }
}

/// Anything that can replay the full entity stream, once per call.
pub trait EntitySource {
    fn read_entities<E, F>(&self, visit: F) -> Result<(), E>
    where
        E: From<OsmDataReaderError>,
        F: FnMut(OsmEntity) -> Result<(), E>;
}

impl EntitySource for Vec<OsmEntity> {
    fn read_entities<E, F>(&self, mut visit: F) -> Result<(), E>
    where
        E: From<OsmDataReaderError>,
        F: FnMut(OsmEntity) -> Result<(), E>,
    {
        for entity in self {
            visit(entity.clone())?;
        }
        Ok(())
    }
}

/// Append only output stream. Nothing is durable until `close` returned `Ok`.
pub trait EntitySink {
    fn add_node(&mut self, node: &OsmNode) -> Result<(), OsmDataWriterError>;
    fn add_way(&mut self, way: &OsmWay) -> Result<(), OsmDataWriterError>;
    fn close(&mut self) -> Result<(), OsmDataWriterError>;
}
