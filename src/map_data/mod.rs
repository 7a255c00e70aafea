pub mod clip;
pub mod edge;
pub mod graph;
pub mod grid;
pub mod osm;

#[derive(Debug, PartialEq, Clone, thiserror::Error)]
pub enum MapDataError {
    #[error("Way {way_id} references missing point {point_id}")]
    MissingPoint { way_id: i64, point_id: i64 },

    #[error("Point {point_id} has no valid location ({lat}, {lon})")]
    InvalidLocation { point_id: i64, lat: f64, lon: f64 },

    #[error("Zero length line {point_ids:?} in way {way_id}")]
    DegenerateLine { way_id: i64, point_ids: (i64, i64) },

    #[error("Point {point_id} has neighbor {neighbor_id} which is not in the graph")]
    DanglingNeighbor { point_id: i64, neighbor_id: i64 },

    #[error("Point {point_id} links to {neighbor_id} but not the other way around")]
    AsymmetricNeighbor { point_id: i64, neighbor_id: i64 },
}

/// Counters for everything skipped while building the edge set, graph or grid.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct BuildReport {
    pub invalid_points: usize,
    pub missing_points: usize,
    pub degenerate_lines: usize,
    pub skipped_ways: usize,
}

impl BuildReport {
    pub fn record(&mut self, error: &MapDataError) {
        match error {
            MapDataError::MissingPoint { .. }
            | MapDataError::DanglingNeighbor { .. }
            | MapDataError::AsymmetricNeighbor { .. } => self.missing_points += 1,
            MapDataError::InvalidLocation { .. } => self.invalid_points += 1,
            MapDataError::DegenerateLine { .. } => self.degenerate_lines += 1,
        }
    }

    pub fn merge(&mut self, other: &BuildReport) {
        self.invalid_points += other.invalid_points;
        self.missing_points += other.missing_points;
        self.degenerate_lines += other.degenerate_lines;
        self.skipped_ways += other.skipped_ways;
    }

    pub fn is_clean(&self) -> bool {
        self == &BuildReport::default()
    }
}
