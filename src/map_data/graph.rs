use std::{
    collections::{BTreeMap, HashMap},
    time::Instant,
};

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::gps_utils::get_distance_m;

use super::{
    edge::{EdgeSet, StreetEdge},
    BuildReport, MapDataError,
};

/// Attributes of one directed neighbor entry.
#[derive(Clone, Debug, PartialEq)]
pub struct StreetGraphEdge {
    pub distance_m: f64,
    pub road_type: String,
    pub speed_limit: Option<String>,
    pub way_id: i64,
}

#[derive(Clone, Debug, PartialEq)]
pub struct StreetGraphNode {
    pub id: i64,
    pub lat: f64,
    pub lon: f64,
    pub neighbors: BTreeMap<i64, StreetGraphEdge>,
}

impl StreetGraphNode {
    pub fn degree(&self) -> usize {
        self.neighbors.len()
    }
}

/// Undirected street graph stored as a flat node vector plus an id index.
/// Every undirected edge is two directed neighbor entries.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct StreetGraph {
    points: Vec<StreetGraphNode>,
    points_map: HashMap<i64, usize>,
}

impl StreetGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Number of directed neighbor entries.
    pub fn edge_count(&self) -> usize {
        self.points.iter().map(|p| p.neighbors.len()).sum()
    }

    pub fn iter(&self) -> impl Iterator<Item = &StreetGraphNode> {
        self.points.iter()
    }

    pub fn get_node(&self, id: &i64) -> Option<&StreetGraphNode> {
        self.points_map.get(id).map(|idx| &self.points[*idx])
    }

    pub fn get_edge(&self, from: &i64, to: &i64) -> Option<&StreetGraphEdge> {
        self.get_node(from).and_then(|node| node.neighbors.get(to))
    }

    pub fn insert_node(&mut self, id: i64, lat: f64, lon: f64) {
        if let Some(idx) = self.points_map.get(&id) {
            let point = &mut self.points[*idx];
            point.lat = lat;
            point.lon = lon;
            return;
        }
        self.points_map.insert(id, self.points.len());
        self.points.push(StreetGraphNode {
            id,
            lat,
            lon,
            neighbors: BTreeMap::new(),
        });
    }

    /// Adds both directions of `edge`. A node pair already present, e.g. from
    /// an overlapping way, is overwritten: last writer wins per direction.
    pub fn insert_edge(&mut self, edge: &StreetEdge) -> Result<(), MapDataError> {
        let from_idx = *self
            .points_map
            .get(&edge.from.id)
            .ok_or(MapDataError::MissingPoint {
                way_id: edge.way_id,
                point_id: edge.from.id,
            })?;
        let to_idx = *self
            .points_map
            .get(&edge.to.id)
            .ok_or(MapDataError::MissingPoint {
                way_id: edge.way_id,
                point_id: edge.to.id,
            })?;
        if from_idx == to_idx || edge.is_degenerate() {
            return Err(MapDataError::DegenerateLine {
                way_id: edge.way_id,
                point_ids: (edge.from.id, edge.to.id),
            });
        }

        let (from_lat, from_lon) = (self.points[from_idx].lat, self.points[from_idx].lon);
        let (to_lat, to_lon) = (self.points[to_idx].lat, self.points[to_idx].lon);

        self.points[from_idx].neighbors.insert(
            edge.to.id,
            StreetGraphEdge {
                distance_m: get_distance_m(&from_lat, &from_lon, &to_lat, &to_lon),
                road_type: edge.road_type.clone(),
                speed_limit: edge.speed_limit.clone(),
                way_id: edge.way_id,
            },
        );
        self.points[to_idx].neighbors.insert(
            edge.from.id,
            StreetGraphEdge {
                distance_m: get_distance_m(&to_lat, &to_lon, &from_lat, &from_lon),
                road_type: edge.road_type.clone(),
                speed_limit: edge.speed_limit.clone(),
                way_id: edge.way_id,
            },
        );
        Ok(())
    }

    /// Every neighbor id must be a node of the graph that links back.
    pub fn check_integrity(&self) -> Result<(), MapDataError> {
        for point in &self.points {
            for neighbor_id in point.neighbors.keys() {
                if !self.points_map.contains_key(neighbor_id) {
                    return Err(MapDataError::DanglingNeighbor {
                        point_id: point.id,
                        neighbor_id: *neighbor_id,
                    });
                }
                if self.get_edge(neighbor_id, &point.id).is_none() {
                    return Err(MapDataError::AsymmetricNeighbor {
                        point_id: point.id,
                        neighbor_id: *neighbor_id,
                    });
                }
            }
        }
        Ok(())
    }

    pub fn to_records<'a>(
        &'a self,
        unknown_speed_limit: &'a str,
    ) -> impl Iterator<Item = GraphNodeRecord> + 'a {
        self.points.iter().map(move |point| GraphNodeRecord {
            node_id: point.id,
            lat: point.lat,
            lon: point.lon,
            neighbors: point
                .neighbors
                .iter()
                .map(|(id, edge)| {
                    (
                        *id,
                        GraphNeighborRecord {
                            distance: edge.distance_m,
                            street_type: edge.road_type.clone(),
                            maxspeed: edge
                                .speed_limit
                                .clone()
                                .unwrap_or_else(|| unknown_speed_limit.to_string()),
                            way_id: edge.way_id,
                        },
                    )
                })
                .collect(),
        })
    }

    /// Rebuilds a graph from exported records. Neighbor references are only
    /// checked once all records are in, since a neighbor may come later.
    pub fn from_records<I>(records: I, unknown_speed_limit: &str) -> Result<Self, MapDataError>
    where
        I: IntoIterator<Item = GraphNodeRecord>,
    {
        let mut graph = StreetGraph::new();
        for record in records {
            graph.insert_node(record.node_id, record.lat, record.lon);
            let idx = graph.points_map[&record.node_id];
            graph.points[idx].neighbors = record
                .neighbors
                .into_iter()
                .map(|(id, neighbor)| {
                    (
                        id,
                        StreetGraphEdge {
                            distance_m: neighbor.distance,
                            road_type: neighbor.street_type,
                            speed_limit: (neighbor.maxspeed != unknown_speed_limit)
                                .then_some(neighbor.maxspeed),
                            way_id: neighbor.way_id,
                        },
                    )
                })
                .collect();
        }
        graph.check_integrity()?;
        Ok(graph)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GraphNeighborRecord {
    pub distance: f64,
    pub street_type: String,
    pub maxspeed: String,
    pub way_id: i64,
}

/// One line of the graph export.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GraphNodeRecord {
    pub node_id: i64,
    pub lat: f64,
    pub lon: f64,
    pub neighbors: BTreeMap<i64, GraphNeighborRecord>,
}

pub struct GraphBuilder;

impl GraphBuilder {
    #[tracing::instrument(skip_all)]
    pub fn build(edge_set: &EdgeSet) -> (StreetGraph, BuildReport) {
        let start = Instant::now();
        let mut graph = StreetGraph::new();
        let mut report = BuildReport::default();

        for node in &edge_set.nodes {
            graph.insert_node(node.id, node.lat, node.lon);
        }
        for edge in &edge_set.edges {
            if let Err(error) = graph.insert_edge(edge) {
                warn!(error = ?error, "Skipping line");
                report.record(&error);
            }
        }

        info!(
            nodes = graph.len(),
            directed_edges = graph.edge_count(),
            duration_secs = start.elapsed().as_secs(),
            "Graph built"
        );
        (graph, report)
    }
}
