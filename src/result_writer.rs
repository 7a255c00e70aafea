use std::{
    fs::File,
    io::{self, BufWriter, Write},
    path::{Path, PathBuf},
    time::Instant,
};

use serde::Serialize;
use tracing::{info, trace};

use crate::map_data::{graph::StreetGraph, grid::StreetGrid};

#[derive(Debug, thiserror::Error)]
pub enum ResultWriterError {
    #[error("Failed to create {file:?}: {error}")]
    FileCreate { file: PathBuf, error: io::Error },

    #[error("JSON Serialization error {error}")]
    SerializeJson { error: serde_json::Error },

    #[error("Failed to write to file {file:?}: {error}")]
    FileWrite { file: PathBuf, error: io::Error },
}

/// Line delimited JSON output, one record per line.
struct JsonLinesWriter {
    file: PathBuf,
    writer: BufWriter<File>,
    records: usize,
    progress_every: usize,
    what: &'static str,
}

impl JsonLinesWriter {
    fn create(
        file: &Path,
        what: &'static str,
        progress_every: usize,
    ) -> Result<Self, ResultWriterError> {
        let f = File::create(file).map_err(|error| ResultWriterError::FileCreate {
            file: file.to_path_buf(),
            error,
        })?;
        Ok(Self {
            file: file.to_path_buf(),
            writer: BufWriter::new(f),
            records: 0,
            progress_every,
            what,
        })
    }

    fn write_record<T: Serialize>(&mut self, record: &T) -> Result<(), ResultWriterError> {
        serde_json::to_writer(&mut self.writer, record)
            .map_err(|error| ResultWriterError::SerializeJson { error })?;
        self.writer
            .write_all(b"\n")
            .map_err(|error| ResultWriterError::FileWrite {
                file: self.file.clone(),
                error,
            })?;
        self.records += 1;
        if self.progress_every > 0 && self.records % self.progress_every == 0 {
            info!(records = self.records, what = self.what, "Writing");
        }
        Ok(())
    }

    fn finish(mut self) -> Result<usize, ResultWriterError> {
        self.writer
            .flush()
            .map_err(|error| ResultWriterError::FileWrite {
                file: self.file.clone(),
                error,
            })?;
        trace!(file = ?self.file, records = self.records, "Flushed");
        Ok(self.records)
    }
}

pub struct ResultWriter;

impl ResultWriter {
    /// One node per line with its neighbor map. Returns the number of lines.
    #[tracing::instrument(skip(graph))]
    pub fn write_graph(
        file: &Path,
        graph: &StreetGraph,
        unknown_speed_limit: &str,
        progress_every: usize,
    ) -> Result<usize, ResultWriterError> {
        let start = Instant::now();
        let mut writer = JsonLinesWriter::create(file, "graph nodes", progress_every)?;
        for record in graph.to_records(unknown_speed_limit) {
            writer.write_record(&record)?;
        }
        let records = writer.finish()?;
        info!(
            records,
            duration_secs = start.elapsed().as_secs(),
            "Graph written"
        );
        Ok(records)
    }

    /// Metadata line first, then one line per non empty cell. Returns the
    /// number of cell lines.
    #[tracing::instrument(skip(grid))]
    pub fn write_grid(
        file: &Path,
        grid: &StreetGrid,
        progress_every: usize,
    ) -> Result<usize, ResultWriterError> {
        let start = Instant::now();
        let mut writer = JsonLinesWriter::create(file, "grid cells", progress_every)?;
        writer.write_record(&grid.metadata_record())?;
        for record in grid.cell_records() {
            writer.write_record(&record)?;
        }
        let cells = writer.finish()? - 1;
        info!(
            cells,
            duration_secs = start.elapsed().as_secs(),
            "Grid written"
        );
        Ok(cells)
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use crate::{
        map_data::{edge::EdgeSetBuilder, graph::GraphBuilder, grid::GridIndexBuilder},
        test_utils::kept_test_dataset_1,
    };

    use super::*;

    #[test]
    fn graph_has_one_line_per_node() {
        let edge_set = EdgeSetBuilder::from_source(&kept_test_dataset_1()).unwrap();
        let (graph, _) = GraphBuilder::build(&edge_set);
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("graph.jsonl");

        let written = ResultWriter::write_graph(&file, &graph, "Unknown", 2).unwrap();
        assert_eq!(written, 9);

        let text = fs::read_to_string(&file).unwrap();
        let lines = text.lines().collect::<Vec<_>>();
        assert_eq!(lines.len(), 9);
        let first: serde_json::Value = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(first["node_id"], 1);
        assert_eq!(first["neighbors"]["2"]["street_type"], "residential");
        assert_eq!(first["neighbors"]["2"]["maxspeed"], "30");
        assert_eq!(first["neighbors"]["2"]["way_id"], 1234);
        assert!(text.contains(r#""maxspeed":"Unknown""#));
    }

    #[test]
    fn grid_starts_with_metadata() {
        let edge_set = EdgeSetBuilder::from_source(&kept_test_dataset_1()).unwrap();
        let (grid, _) = GridIndexBuilder::new(&edge_set.edges, 0.0005)
            .unwrap()
            .build(&edge_set.edges, 0);
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("grid.jsonl");

        let cells = ResultWriter::write_grid(&file, &grid, 1).unwrap();
        assert_eq!(cells, grid.cell_count());

        let text = fs::read_to_string(&file).unwrap();
        let lines = text.lines().collect::<Vec<_>>();
        assert_eq!(lines.len(), cells + 1);
        let metadata: serde_json::Value = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(metadata["cell_size"], 0.0005);
        assert_eq!(metadata["min_lon"], 7.85);
        let cell: serde_json::Value = serde_json::from_str(lines[1]).unwrap();
        assert!(cell["cell_id"].is_array());
        assert!(!cell["segments"].as_array().unwrap().is_empty());
    }

    #[test]
    fn missing_directory_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("nope").join("graph.jsonl");
        let result = ResultWriter::write_graph(&file, &StreetGraph::new(), "Unknown", 0);
        assert!(matches!(result, Err(ResultWriterError::FileCreate { .. })));
    }
}
