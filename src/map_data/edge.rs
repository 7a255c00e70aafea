use std::{collections::HashMap, time::Instant};

use geo::{coord, Line};
use tracing::{info, trace, warn};

use crate::{
    gps_utils::get_distance_m,
    map_data::{
        osm::{OsmEntity, OsmNode, OsmWay},
        BuildReport, MapDataError,
    },
    osm_data::{
        classifier::{classify_way, EntityClass},
        EntitySource, OsmDataReaderError,
    },
};

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct EdgeEndpoint {
    pub id: i64,
    pub lat: f64,
    pub lon: f64,
}

/// One consecutive node pair of a way, endpoints resolved.
#[derive(Clone, Debug, PartialEq)]
pub struct StreetEdge {
    pub way_id: i64,
    pub from: EdgeEndpoint,
    pub to: EdgeEndpoint,
    pub distance_m: f64,
    pub road_type: String,
    pub speed_limit: Option<String>,
}

impl StreetEdge {
    /// The edge as a line in (lon, lat) space.
    pub fn line(&self) -> Line<f64> {
        Line::new(
            coord! { x: self.from.lon, y: self.from.lat },
            coord! { x: self.to.lon, y: self.to.lat },
        )
    }

    pub fn is_degenerate(&self) -> bool {
        self.from.lat == self.to.lat && self.from.lon == self.to.lon
    }
}

/// Valid nodes and the edges between them, shared by the graph and the grid.
#[derive(Debug, Default)]
pub struct EdgeSet {
    pub nodes: Vec<OsmNode>,
    pub edges: Vec<StreetEdge>,
    pub report: BuildReport,
}

#[derive(Default)]
pub struct EdgeSetBuilder {
    nodes: Vec<OsmNode>,
    node_locations: HashMap<i64, (f64, f64)>,
    edges: Vec<StreetEdge>,
    report: BuildReport,
}

impl EdgeSetBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reads nodes on the first pass and ways on the second, so the order of
    /// entities inside the source does not matter.
    #[tracing::instrument(skip_all)]
    pub fn from_source<S: EntitySource>(source: &S) -> Result<EdgeSet, OsmDataReaderError> {
        let start = Instant::now();
        let mut builder = EdgeSetBuilder::new();

        info!("Collecting nodes");
        source.read_entities(|entity| -> Result<(), OsmDataReaderError> {
            if let OsmEntity::Node(node) = entity {
                builder.insert_node(node);
            }
            Ok(())
        })?;

        info!("Processing ways");
        source.read_entities(|entity| -> Result<(), OsmDataReaderError> {
            if let OsmEntity::Way(way) = entity {
                builder.insert_way(&way);
            }
            Ok(())
        })?;

        let edge_set = builder.finish();
        info!(
            nodes = edge_set.nodes.len(),
            edges = edge_set.edges.len(),
            invalid_points = edge_set.report.invalid_points,
            missing_points = edge_set.report.missing_points,
            degenerate_lines = edge_set.report.degenerate_lines,
            skipped_ways = edge_set.report.skipped_ways,
            duration_secs = start.elapsed().as_secs(),
            "Edge set ready"
        );
        Ok(edge_set)
    }

    pub fn insert_node(&mut self, node: OsmNode) {
        if !node.has_valid_location() {
            let error = MapDataError::InvalidLocation {
                point_id: node.id,
                lat: node.lat,
                lon: node.lon,
            };
            warn!(error = ?error, "Skipping point");
            self.report.record(&error);
            return;
        }
        self.node_locations.insert(node.id, (node.lat, node.lon));
        self.nodes.push(node);
    }

    fn get_endpoint(&self, way_id: i64, point_id: i64) -> Result<EdgeEndpoint, MapDataError> {
        self.node_locations
            .get(&point_id)
            .map(|&(lat, lon)| EdgeEndpoint {
                id: point_id,
                lat,
                lon,
            })
            .ok_or(MapDataError::MissingPoint { way_id, point_id })
    }

    fn get_edge(&self, way: &OsmWay, from_id: i64, to_id: i64) -> Result<StreetEdge, MapDataError> {
        let from = self.get_endpoint(way.id, from_id)?;
        let to = self.get_endpoint(way.id, to_id)?;
        let edge = StreetEdge {
            way_id: way.id,
            from,
            to,
            distance_m: get_distance_m(&from.lat, &from.lon, &to.lat, &to.lon),
            road_type: way.road_type().unwrap_or_default().to_string(),
            speed_limit: way.speed_limit().map(String::from),
        };
        if edge.is_degenerate() || edge.distance_m == 0.0 {
            return Err(MapDataError::DegenerateLine {
                way_id: way.id,
                point_ids: (from_id, to_id),
            });
        }
        Ok(edge)
    }

    pub fn insert_way(&mut self, way: &OsmWay) {
        if classify_way(way) != EntityClass::Keep {
            trace!(way_id = way.id, road_type = ?way.road_type(), "Skipping non motorized way");
            self.report.skipped_ways += 1;
            return;
        }
        for pair in way.point_ids.windows(2) {
            match self.get_edge(way, pair[0], pair[1]) {
                Ok(edge) => self.edges.push(edge),
                Err(error) => {
                    warn!(error = ?error, "Skipping line");
                    self.report.record(&error);
                }
            }
        }
    }

    pub fn finish(self) -> EdgeSet {
        EdgeSet {
            nodes: self.nodes,
            edges: self.edges,
            report: self.report,
        }
    }
}
