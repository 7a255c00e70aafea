use std::{
    collections::{BTreeMap, HashSet},
    time::Instant,
};

use geo::{coord, Closest, ClosestPoint, Line, Point, Rect};
use rayon::iter::{IntoParallelRefIterator, ParallelIterator};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::gps_utils::{from_flat_m, get_distance_m, is_valid_location, to_flat_m};

use super::{clip::clip_line_to_cell, edge::StreetEdge, BuildReport, MapDataError};

/// (row, col) relative to the bounding box origin.
pub type GridCellId = (i64, i64);

#[derive(Debug, PartialEq, Clone, thiserror::Error)]
pub enum GridError {
    #[error("Cell size must be a positive number, got {cell_size}")]
    InvalidCellSize { cell_size: f64 },

    #[error("No edges to compute a bounding box from")]
    NoEdges,

    #[error("Cell size {cell_size} gives {rows} x {cols} cells, at most 2^31 per axis")]
    TooManyCells { cell_size: f64, rows: f64, cols: f64 },
}

/// Keeps row and column indices, and the ranges around them, far from `i64` limits.
pub const MAX_CELLS_PER_AXIS: f64 = 2_147_483_648.0;

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub min_lat: f64,
    pub max_lat: f64,
    pub min_lon: f64,
    pub max_lon: f64,
}

impl BoundingBox {
    /// Min and max over both endpoints of every edge.
    pub fn from_edges(edges: &[StreetEdge]) -> Option<Self> {
        let mut endpoints = edges.iter().flat_map(|edge| [edge.from, edge.to]);
        let first = endpoints.next()?;
        let init = BoundingBox {
            min_lat: first.lat,
            max_lat: first.lat,
            min_lon: first.lon,
            max_lon: first.lon,
        };
        Some(endpoints.fold(init, |bounds, point| BoundingBox {
            min_lat: bounds.min_lat.min(point.lat),
            max_lat: bounds.max_lat.max(point.lat),
            min_lon: bounds.min_lon.min(point.lon),
            max_lon: bounds.max_lon.max(point.lon),
        }))
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct GridPoint {
    pub lat: f64,
    pub lon: f64,
}

/// Part of an edge inside one cell. `node_ids` are the uncut edge's
/// endpoints, `endpoints` the clipped coordinates.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GridSegment {
    pub way_id: i64,
    pub node_ids: [i64; 2],
    pub endpoints: [GridPoint; 2],
}

impl GridSegment {
    fn line(&self) -> Line<f64> {
        Line::new(
            coord! { x: self.endpoints[0].lon, y: self.endpoints[0].lat },
            coord! { x: self.endpoints[1].lon, y: self.endpoints[1].lat },
        )
    }
}

/// First line of the grid export.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct GridMetadataRecord {
    pub min_lat: f64,
    pub max_lat: f64,
    pub min_lon: f64,
    pub max_lon: f64,
    pub cell_size: f64,
}

/// One line per non empty cell of the grid export.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GridCellRecord {
    pub cell_id: GridCellId,
    pub segments: Vec<GridSegment>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ClosestStreet {
    pub segment: GridSegment,
    pub snapped: GridPoint,
    pub distance_m: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StreetGrid {
    bounds: BoundingBox,
    cell_size: f64,
    cells: BTreeMap<GridCellId, Vec<GridSegment>>,
}

impl StreetGrid {
    pub fn new(bounds: BoundingBox, cell_size: f64) -> Result<Self, GridError> {
        if !cell_size.is_finite() || cell_size <= 0.0 {
            return Err(GridError::InvalidCellSize { cell_size });
        }
        let rows = ((bounds.max_lat - bounds.min_lat) / cell_size).ceil();
        let cols = ((bounds.max_lon - bounds.min_lon) / cell_size).ceil();
        if !(rows <= MAX_CELLS_PER_AXIS && cols <= MAX_CELLS_PER_AXIS) {
            return Err(GridError::TooManyCells {
                cell_size,
                rows,
                cols,
            });
        }
        Ok(Self {
            bounds,
            cell_size,
            cells: BTreeMap::new(),
        })
    }

    pub fn bounds(&self) -> &BoundingBox {
        &self.bounds
    }

    pub fn cell_size(&self) -> f64 {
        self.cell_size
    }

    pub fn cell_count(&self) -> usize {
        self.cells.len()
    }

    pub fn segment_count(&self) -> usize {
        self.cells.values().map(Vec::len).sum()
    }

    pub fn cells(&self) -> impl Iterator<Item = (&GridCellId, &Vec<GridSegment>)> {
        self.cells.iter()
    }

    pub fn get_cell(&self, cell_id: &GridCellId) -> Option<&[GridSegment]> {
        self.cells.get(cell_id).map(Vec::as_slice)
    }

    pub fn cell_id(&self, lat: f64, lon: f64) -> GridCellId {
        (
            ((lat - self.bounds.min_lat) / self.cell_size).floor() as i64,
            ((lon - self.bounds.min_lon) / self.cell_size).floor() as i64,
        )
    }

    /// Rectangle of a cell in (lon, lat) space.
    pub fn cell_bounds(&self, (row, col): GridCellId) -> Rect<f64> {
        Rect::new(
            coord! {
                x: self.bounds.min_lon + col as f64 * self.cell_size,
                y: self.bounds.min_lat + row as f64 * self.cell_size,
            },
            coord! {
                x: self.bounds.min_lon + col.saturating_add(1) as f64 * self.cell_size,
                y: self.bounds.min_lat + row.saturating_add(1) as f64 * self.cell_size,
            },
        )
    }

    fn push_segment(&mut self, cell_id: GridCellId, segment: GridSegment) {
        self.cells.entry(cell_id).or_default().push(segment);
    }

    /// Segments of the point's cell and its eight neighbors.
    pub fn segments_near(&self, lat: f64, lon: f64) -> Vec<&GridSegment> {
        let (row, col) = self.cell_id(lat, lon);
        (row.saturating_sub(1)..=row.saturating_add(1))
            .flat_map(|r| (col.saturating_sub(1)..=col.saturating_add(1)).map(move |c| (r, c)))
            .filter_map(|cell_id| self.cells.get(&cell_id))
            .flatten()
            .collect()
    }

    /// Up to `count` nearby streets ordered by distance, one per way.
    pub fn closest_streets(&self, lat: f64, lon: f64, count: usize) -> Vec<ClosestStreet> {
        let (x, y) = to_flat_m(lat, lon, lat);
        let query = Point::new(x, y);

        let mut candidates = self
            .segments_near(lat, lon)
            .into_iter()
            .filter_map(|segment| {
                let line = segment.line();
                let (x0, y0) = to_flat_m(line.start.y, line.start.x, lat);
                let (x1, y1) = to_flat_m(line.end.y, line.end.x, lat);
                let flat = Line::new(coord! { x: x0, y: y0 }, coord! { x: x1, y: y1 });
                let snapped = match flat.closest_point(&query) {
                    Closest::Intersection(p) | Closest::SinglePoint(p) => p,
                    Closest::Indeterminate => return None,
                };
                let (snapped_lat, snapped_lon) = from_flat_m(snapped.x(), snapped.y(), lat);
                Some(ClosestStreet {
                    segment: segment.clone(),
                    snapped: GridPoint {
                        lat: snapped_lat,
                        lon: snapped_lon,
                    },
                    distance_m: get_distance_m(&lat, &lon, &snapped_lat, &snapped_lon),
                })
            })
            .collect::<Vec<_>>();
        candidates.sort_by(|a, b| a.distance_m.total_cmp(&b.distance_m));

        let mut seen_ways = HashSet::new();
        candidates
            .into_iter()
            .filter(|candidate| seen_ways.insert(candidate.segment.way_id))
            .take(count)
            .collect()
    }

    pub fn metadata_record(&self) -> GridMetadataRecord {
        GridMetadataRecord {
            min_lat: self.bounds.min_lat,
            max_lat: self.bounds.max_lat,
            min_lon: self.bounds.min_lon,
            max_lon: self.bounds.max_lon,
            cell_size: self.cell_size,
        }
    }

    pub fn cell_records(&self) -> impl Iterator<Item = GridCellRecord> + '_ {
        self.cells.iter().map(|(cell_id, segments)| GridCellRecord {
            cell_id: *cell_id,
            segments: segments.clone(),
        })
    }

    pub fn from_records<I>(metadata: GridMetadataRecord, cells: I) -> Result<Self, GridError>
    where
        I: IntoIterator<Item = GridCellRecord>,
    {
        let mut grid = StreetGrid::new(
            BoundingBox {
                min_lat: metadata.min_lat,
                max_lat: metadata.max_lat,
                min_lon: metadata.min_lon,
                max_lon: metadata.max_lon,
            },
            metadata.cell_size,
        )?;
        for cell in cells {
            grid.cells
                .entry(cell.cell_id)
                .or_default()
                .extend(cell.segments);
        }
        Ok(grid)
    }
}

pub struct GridIndexBuilder {
    grid: StreetGrid,
}

impl GridIndexBuilder {
    /// Bounding box is fixed here, before any edge is bucketed.
    pub fn new(edges: &[StreetEdge], cell_size: f64) -> Result<Self, GridError> {
        let bounds = BoundingBox::from_edges(edges).ok_or(GridError::NoEdges)?;
        Self::with_bounds(bounds, cell_size)
    }

    pub fn with_bounds(bounds: BoundingBox, cell_size: f64) -> Result<Self, GridError> {
        Ok(Self {
            grid: StreetGrid::new(bounds, cell_size)?,
        })
    }

    /// Every cell piece of one edge, in candidate range order.
    ///
    /// Candidates are the rectangle spanned by the endpoint cells, padded by
    /// one cell since the floor formula and the rebuilt cell boundaries can
    /// disagree by one ulp. Cells the line does not enter are dropped by the
    /// clipping.
    pub fn split_edge(
        &self,
        edge: &StreetEdge,
    ) -> Result<Vec<(GridCellId, GridSegment)>, MapDataError> {
        if edge.is_degenerate() {
            return Err(MapDataError::DegenerateLine {
                way_id: edge.way_id,
                point_ids: (edge.from.id, edge.to.id),
            });
        }
        for endpoint in [edge.from, edge.to] {
            if !is_valid_location(&endpoint.lat, &endpoint.lon) {
                return Err(MapDataError::InvalidLocation {
                    point_id: endpoint.id,
                    lat: endpoint.lat,
                    lon: endpoint.lon,
                });
            }
        }
        let line = edge.line();
        let (from_row, from_col) = self.grid.cell_id(edge.from.lat, edge.from.lon);
        let (to_row, to_col) = self.grid.cell_id(edge.to.lat, edge.to.lon);

        let mut segments = Vec::new();
        let rows =
            from_row.min(to_row).saturating_sub(1)..=from_row.max(to_row).saturating_add(1);
        let cols =
            from_col.min(to_col).saturating_sub(1)..=from_col.max(to_col).saturating_add(1);
        for row in rows {
            for col in cols.clone() {
                let cell = self.grid.cell_bounds((row, col));
                let Some(clipped) = clip_line_to_cell(&line, &cell) else {
                    continue;
                };
                segments.push((
                    (row, col),
                    GridSegment {
                        way_id: edge.way_id,
                        node_ids: [edge.from.id, edge.to.id],
                        endpoints: [
                            GridPoint {
                                lat: clipped.start.y,
                                lon: clipped.start.x,
                            },
                            GridPoint {
                                lat: clipped.end.y,
                                lon: clipped.end.x,
                            },
                        ],
                    },
                ));
            }
        }
        Ok(segments)
    }

    /// Edges are split in parallel, then merged in edge order by this thread.
    #[tracing::instrument(skip_all)]
    pub fn build(self, edges: &[StreetEdge], progress_every: usize) -> (StreetGrid, BuildReport) {
        let start = Instant::now();
        let mut report = BuildReport::default();

        let split = edges
            .par_iter()
            .map(|edge| self.split_edge(edge))
            .collect::<Vec<_>>();

        let mut grid = self.grid;
        for (idx, result) in split.into_iter().enumerate() {
            match result {
                Ok(segments) => {
                    for (cell_id, segment) in segments {
                        grid.push_segment(cell_id, segment);
                    }
                }
                Err(error) => {
                    warn!(error = ?error, "Skipping line");
                    report.record(&error);
                }
            }
            if progress_every > 0 && (idx + 1) % progress_every == 0 {
                info!(edges = idx + 1, "Mapped edges to grid");
            }
        }

        info!(
            cells = grid.cell_count(),
            segments = grid.segment_count(),
            duration_secs = start.elapsed().as_secs(),
            "Grid built"
        );
        (grid, report)
    }
}
