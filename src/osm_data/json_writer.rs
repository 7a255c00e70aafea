use std::{
    fs::File,
    io::{BufWriter, Write},
    path::PathBuf,
};

use tracing::trace;

use crate::map_data::osm::{OsmElement, OsmNode, OsmWay};

use super::{EntitySink, OsmDataWriterError};

/// Writes entities as one JSON element per line, readable by `JsonReader`.
pub struct JsonWriter {
    file_name: PathBuf,
    writer: Option<BufWriter<File>>,
    elements_written: usize,
}

impl JsonWriter {
    pub fn create(file_name: PathBuf) -> Result<Self, OsmDataWriterError> {
        let file = File::create(&file_name).map_err(|error| OsmDataWriterError::FileCreate {
            file: file_name.clone(),
            error,
        })?;
        Ok(Self {
            file_name,
            writer: Some(BufWriter::new(file)),
            elements_written: 0,
        })
    }

    pub fn elements_written(&self) -> usize {
        self.elements_written
    }

    fn write_element(&mut self, id: i64, element: OsmElement) -> Result<(), OsmDataWriterError> {
        let writer = self
            .writer
            .as_mut()
            .ok_or_else(|| OsmDataWriterError::AlreadyClosed {
                file: self.file_name.clone(),
                id,
            })?;
        let json = serde_json::to_string(&element)
            .map_err(|error| OsmDataWriterError::Serialize { id, error })?;
        writeln!(writer, "{json}").map_err(|error| OsmDataWriterError::Write {
            file: self.file_name.clone(),
            id,
            error,
        })?;
        self.elements_written += 1;
        Ok(())
    }
}

impl EntitySink for JsonWriter {
    fn add_node(&mut self, node: &OsmNode) -> Result<(), OsmDataWriterError> {
        self.write_element(node.id, OsmElement::from(node))
    }

    fn add_way(&mut self, way: &OsmWay) -> Result<(), OsmDataWriterError> {
        self.write_element(way.id, OsmElement::from(way))
    }

    fn close(&mut self) -> Result<(), OsmDataWriterError> {
        if let Some(mut writer) = self.writer.take() {
            writer.flush().map_err(|error| OsmDataWriterError::Close {
                file: self.file_name.clone(),
                error,
            })?;
            writer
                .get_ref()
                .sync_all()
                .map_err(|error| OsmDataWriterError::Close {
                    file: self.file_name.clone(),
                    error,
                })?;
            trace!(
                file = ?self.file_name,
                elements = self.elements_written,
                "Entity file closed"
            );
        }
        Ok(())
    }
}
