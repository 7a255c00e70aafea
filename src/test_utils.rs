use std::{collections::HashMap, io, path::PathBuf};

use crate::{
    map_data::osm::{OsmEntity, OsmNode, OsmWay},
    osm_data::{EntitySink, OsmDataWriterError},
    partition::partition_entities,
};

pub fn node(id: i64, lat: f64, lon: f64) -> OsmEntity {
    OsmEntity::Node(OsmNode::new(id, lat, lon))
}

pub fn way(id: i64, point_ids: Vec<i64>, highway: &str) -> OsmEntity {
    OsmEntity::Way(OsmWay {
        id,
        point_ids,
        tags: HashMap::from([("highway".to_string(), highway.to_string())]),
    })
}

pub fn way_with_speed(id: i64, point_ids: Vec<i64>, highway: &str, maxspeed: &str) -> OsmEntity {
    OsmEntity::Way(OsmWay {
        id,
        point_ids,
        tags: HashMap::from([
            ("highway".to_string(), highway.to_string()),
            ("maxspeed".to_string(), maxspeed.to_string()),
        ]),
    })
}

fn grid_node(id: i64, col: u32, row: u32) -> OsmEntity {
    node(id, 48.0 - row as f64 * 0.001, 7.85 + col as f64 * 0.001)
}

pub fn test_dataset_1() -> Vec<OsmEntity> {
    //       1
    //       |
    //       |
    //       2
    //       |
    //       |
    // 5 - - 3 - - 6 - - 7
    //       |     :
    //       |     :
    //       4 - - 8 - - 9
    //
    //       11 . 12       13
    //
    // 6-8 is a footway, 11-12 a service road, 13 a lone bench node
    vec![
        grid_node(1, 1, 0),
        grid_node(2, 1, 1),
        grid_node(3, 1, 2),
        grid_node(4, 1, 3),
        grid_node(5, 0, 2),
        grid_node(6, 2, 2),
        grid_node(7, 3, 2),
        grid_node(8, 2, 3),
        grid_node(9, 3, 3),
        grid_node(11, 1, 5),
        grid_node(12, 2, 5),
        grid_node(13, 4, 5),
        way_with_speed(1234, vec![1, 2, 3, 4], "residential", "30"),
        way_with_speed(5367, vec![5, 3, 6, 7], "primary", "50"),
        way(489, vec![4, 8, 9], "tertiary"),
        way(68, vec![6, 8], "footway"),
        way(1112, vec![11, 12], "service"),
    ]
}

/// Kept half of `test_dataset_1`.
pub fn kept_test_dataset_1() -> Vec<OsmEntity> {
    let mut kept = MemorySink::default();
    partition_entities(&test_dataset_1(), &mut kept, None).expect("partition of test data");
    kept.entities
}

pub fn test_dataset_shared_node() -> Vec<OsmEntity> {
    // 1 - 2 - 3 residential, 3 - 4 - 5 footway, 5 - 6 cycleway
    vec![
        node(1, 48.0, 7.850),
        node(2, 48.0, 7.851),
        node(3, 48.0, 7.852),
        node(4, 48.001, 7.852),
        node(5, 48.002, 7.852),
        node(6, 48.002, 7.853),
        way(100, vec![1, 2, 3], "residential"),
        way(200, vec![3, 4, 5], "footway"),
        way(300, vec![5, 6], "cycleway"),
    ]
}

#[derive(Debug, Default)]
pub struct MemorySink {
    pub entities: Vec<OsmEntity>,
    pub closed: bool,
    fail_after: Option<usize>,
}

impl MemorySink {
    pub fn failing_after(accepted: usize) -> Self {
        Self {
            fail_after: Some(accepted),
            ..Self::default()
        }
    }

    fn push(&mut self, id: i64, entity: OsmEntity) -> Result<(), OsmDataWriterError> {
        if self.fail_after.is_some_and(|limit| self.entities.len() >= limit) {
            return Err(OsmDataWriterError::Write {
                file: PathBuf::from("memory"),
                id,
                error: io::Error::new(io::ErrorKind::Other, "sink full"),
            });
        }
        self.entities.push(entity);
        Ok(())
    }
}

impl EntitySink for MemorySink {
    fn add_node(&mut self, node: &OsmNode) -> Result<(), OsmDataWriterError> {
        self.push(node.id, OsmEntity::Node(node.clone()))
    }

    fn add_way(&mut self, way: &OsmWay) -> Result<(), OsmDataWriterError> {
        self.push(way.id, OsmEntity::Way(way.clone()))
    }

    fn close(&mut self) -> Result<(), OsmDataWriterError> {
        self.closed = true;
        Ok(())
    }
}
