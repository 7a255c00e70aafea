use std::{
    fs::File,
    io::{BufRead, BufReader},
    path::PathBuf,
    time::Instant,
};

use tracing::trace;

use crate::map_data::osm::{OsmElement, OsmEntity};

use super::OsmDataReaderError;

pub struct JsonReader<'a> {
    file_name: &'a PathBuf,
}

impl<'a> JsonReader<'a> {
    pub fn new(file_name: &'a PathBuf) -> Self {
        Self { file_name }
    }

    pub fn read<E, F>(self, mut visit: F) -> Result<(), E>
    where
        E: From<OsmDataReaderError>,
        F: FnMut(OsmEntity) -> Result<(), E>,
    {
        let read_start = Instant::now();

        let f =
            File::open(self.file_name).map_err(|error| OsmDataReaderError::FileError { error })?;
        let reader = BufReader::new(f);

        let mut skipped_elements = 0usize;
        for (idx, line) in reader.lines().enumerate() {
            let line = line.map_err(|error| OsmDataReaderError::FileError { error })?;
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let element: OsmElement =
                serde_json::from_str(line).map_err(|error| OsmDataReaderError::JsonParseError {
                    file: self.file_name.clone(),
                    line: idx + 1,
                    error,
                })?;
            match element.into_entity() {
                Some(entity) => visit(entity)?,
                None => skipped_elements += 1,
            }
        }

        trace!(
            file = ?self.file_name,
            skipped_elements,
            read_duration_secs = read_start.elapsed().as_secs(),
            "JSON pass done"
        );

        Ok(())
    }
}
