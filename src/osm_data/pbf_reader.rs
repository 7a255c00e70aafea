use std::{path::PathBuf, time::Instant};

use tracing::trace;

use crate::map_data::osm::{OsmEntity, OsmNode, OsmWay};

use super::OsmDataReaderError;

pub struct PbfReader<'a> {
    file_name: &'a PathBuf,
}

impl<'a> PbfReader<'a> {
    pub fn new(file_name: &'a PathBuf) -> Self {
        Self { file_name }
    }

    pub fn read<E, F>(self, mut visit: F) -> Result<(), E>
    where
        E: From<OsmDataReaderError>,
        F: FnMut(OsmEntity) -> Result<(), E>,
    {
        let read_start = Instant::now();

        let r = std::fs::File::open(self.file_name)
            .map_err(|error| OsmDataReaderError::PbfFileOpenError { error })?;
        let mut pbf = osmpbfreader::OsmPbfReader::new(r);

        let mut skipped_relations = 0usize;
        for obj in pbf.iter() {
            let obj = obj.map_err(|error| OsmDataReaderError::PbfFileReadError { error })?;
            match obj {
                osmpbfreader::OsmObj::Node(node) => {
                    visit(OsmEntity::Node(OsmNode {
                        id: node.id.0,
                        lat: node.lat(),
                        lon: node.lon(),
                        tags: node
                            .tags
                            .iter()
                            .map(|v| (v.0.to_string(), v.1.to_string()))
                            .collect(),
                    }))?;
                }
                osmpbfreader::OsmObj::Way(way) => {
                    visit(OsmEntity::Way(OsmWay {
                        id: way.id.0,
                        point_ids: way.nodes.iter().map(|v| v.0).collect(),
                        tags: way
                            .tags
                            .iter()
                            .map(|v| (v.0.to_string(), v.1.to_string()))
                            .collect(),
                    }))?;
                }
                osmpbfreader::OsmObj::Relation(_) => skipped_relations += 1,
            }
        }

        trace!(
            file = ?self.file_name,
            skipped_relations,
            read_duration_secs = read_start.elapsed().as_secs(),
            "PBF pass done"
        );

        Ok(())
    }
}
