use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::gps_utils::is_valid_location;

#[derive(Clone, Debug, PartialEq)]
pub struct OsmNode {
    pub id: i64,
    pub lat: f64,
    pub lon: f64,
    pub tags: HashMap<String, String>,
}

impl OsmNode {
    pub fn new(id: i64, lat: f64, lon: f64) -> Self {
        Self {
            id,
            lat,
            lon,
            tags: HashMap::new(),
        }
    }

    pub fn has_valid_location(&self) -> bool {
        is_valid_location(&self.lat, &self.lon)
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct OsmWay {
    pub id: i64,
    pub point_ids: Vec<i64>,
    pub tags: HashMap<String, String>,
}

impl OsmWay {
    pub fn road_type(&self) -> Option<&str> {
        self.tags.get("highway").map(String::as_str)
    }

    pub fn speed_limit(&self) -> Option<&str> {
        self.tags.get("maxspeed").map(String::as_str)
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum OsmEntity {
    Node(OsmNode),
    Way(OsmWay),
}

/// One line of a JSONL entity file. Mirrors the Overpass element layout so
/// small extracts can be converted with `jq`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum OsmElement {
    Node {
        id: i64,
        lat: Option<f64>,
        lon: Option<f64>,
        #[serde(default, skip_serializing_if = "HashMap::is_empty")]
        tags: HashMap<String, String>,
    },
    Way {
        id: i64,
        #[serde(default)]
        nodes: Vec<i64>,
        #[serde(default, skip_serializing_if = "HashMap::is_empty")]
        tags: HashMap<String, String>,
    },
    #[serde(other)]
    Other,
}

impl OsmElement {
    pub fn into_entity(self) -> Option<OsmEntity> {
        match self {
            OsmElement::Node { id, lat, lon, tags } => Some(OsmEntity::Node(OsmNode {
                id,
                lat: lat.unwrap_or(f64::NAN),
                lon: lon.unwrap_or(f64::NAN),
                tags,
            })),
            OsmElement::Way { id, nodes, tags } => Some(OsmEntity::Way(OsmWay {
                id,
                point_ids: nodes,
                tags,
            })),
            OsmElement::Other => None,
        }
    }
}

impl From<&OsmNode> for OsmElement {
    fn from(node: &OsmNode) -> Self {
        OsmElement::Node {
            id: node.id,
            lat: node.lat.is_finite().then_some(node.lat),
            lon: node.lon.is_finite().then_some(node.lon),
            tags: node.tags.clone(),
        }
    }
}

impl From<&OsmWay> for OsmElement {
    fn from(way: &OsmWay) -> Self {
        OsmElement::Way {
            id: way.id,
            nodes: way.point_ids.clone(),
            tags: way.tags.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn node_without_location_is_invalid() {
        let element: OsmElement = serde_json::from_str(r#"{"type":"node","id":7}"#).unwrap();
        let Some(OsmEntity::Node(node)) = element.into_entity() else {
            panic!("expected node");
        };
        assert_eq!(node.id, 7);
        assert!(!node.has_valid_location());

        let element = OsmElement::from(&node);
        assert_eq!(
            serde_json::to_string(&element).unwrap(),
            r#"{"type":"node","id":7,"lat":null,"lon":null}"#
        );
    }

    #[test]
    fn out_of_range_location_is_invalid() {
        assert!(!OsmNode::new(1, 91.0, 0.0).has_valid_location());
        assert!(!OsmNode::new(1, 0.0, -180.5).has_valid_location());
        assert!(OsmNode::new(1, -90.0, 180.0).has_valid_location());
    }

    #[test]
    fn way_record_keeps_node_order_and_tags() {
        let element: OsmElement = serde_json::from_str(
            r#"{"type":"way","id":12,"nodes":[3,1,2],"tags":{"highway":"primary","maxspeed":"50"}}"#,
        )
        .unwrap();
        let Some(OsmEntity::Way(way)) = element.into_entity() else {
            panic!("expected way");
        };
        assert_eq!(way.point_ids, vec![3, 1, 2]);
        assert_eq!(way.road_type(), Some("primary"));
        assert_eq!(way.speed_limit(), Some("50"));
    }

    #[test]
    fn relations_are_not_entities() {
        let element: OsmElement =
            serde_json::from_str(r#"{"type":"relation","id":5,"members":[]}"#).unwrap();
        assert_eq!(element, OsmElement::Other);
        assert_eq!(element.into_entity(), None);
    }
}
