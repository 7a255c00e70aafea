use crate::map_data::osm::OsmEntity;

use super::{
    json_reader::JsonReader, pbf_reader::PbfReader, DataSource, EntitySource, OsmDataReaderError,
};

/// File backed entity source. Every call to `read_entities` reopens the file,
/// so any number of independent passes can be made.
pub struct OsmDataReader {
    source: DataSource,
}

impl OsmDataReader {
    pub fn new(data_source: DataSource) -> Self {
        Self {
            source: data_source,
        }
    }

    pub fn source(&self) -> &DataSource {
        &self.source
    }
}

impl EntitySource for OsmDataReader {
    fn read_entities<E, F>(&self, visit: F) -> Result<(), E>
    where
        E: From<OsmDataReaderError>,
        F: FnMut(OsmEntity) -> Result<(), E>,
    {
        match self.source {
            DataSource::JsonFile { ref file } => JsonReader::new(file).read(visit),
            DataSource::PbfFile { ref file } => PbfReader::new(file).read(visit),
        }
    }
}
