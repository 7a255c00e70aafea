use std::{
    io::{self, Write},
    path::PathBuf,
    time::Instant,
};

use clap::{Parser, Subcommand};
use tracing::{info, Level};

use crate::{
    config::{ConfigError, PipelineConfig},
    gps_utils::is_valid_location,
    map_data::{
        edge::{EdgeSet, EdgeSetBuilder},
        graph::{GraphBuilder, StreetGraph},
        grid::{GridError, GridIndexBuilder, StreetGrid},
        BuildReport,
    },
    osm_data::{
        data_reader::OsmDataReader, json_writer::JsonWriter, DataSource, EntitySink,
        EntitySource, OsmDataReaderError, OsmDataWriterError,
    },
    partition::{partition_entities, PartitionError, PartitionStats},
    result_reader::ResultReaderError,
    result_writer::{ResultWriter, ResultWriterError},
};

#[derive(Debug, thiserror::Error)]
pub enum RunnerError {
    #[error("Config error: {error}")]
    Config { error: ConfigError },

    #[error("Input error: {error}")]
    Source { error: OsmDataReaderError },

    #[error("Output error: {error}")]
    Sink { error: OsmDataWriterError },

    #[error("Filtering failed: {error}")]
    Partition { error: PartitionError },

    #[error("Grid error: {error}")]
    Grid { error: GridError },

    #[error("Export failed: {error}")]
    ResultWrite { error: ResultWriterError },

    #[error("Failed to load export: {error}")]
    ResultRead { error: ResultReaderError },

    #[error("JSON Serialization error {error}")]
    SerializeJson { error: serde_json::Error },

    #[error("Failed to write to stdout: {error}")]
    Stdout { error: io::Error },

    #[error("Coordinate ({lat}, {lon}) is outside the valid range")]
    InvalidCoordinate { lat: f64, lon: f64 },
}

#[derive(Parser)]
#[command(version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// JSON pipeline config, defaults apply when omitted
    #[arg(long, value_name = "FILE", global = true)]
    pub config: Option<PathBuf>,

    #[arg(long, value_name = "LEVEL", global = true, default_value = "info")]
    pub log_level: Level,

    #[command(subcommand)]
    pub mode: CliMode,
}

#[derive(Subcommand, Debug, Clone)]
pub enum CliMode {
    /// Split an extract into motorized (kept) and other (discarded) entities
    Filter {
        #[arg(long, value_name = "FILE")]
        input: PathBuf,

        #[arg(long, value_name = "FILE")]
        kept: PathBuf,

        #[arg(long, value_name = "FILE")]
        discarded: Option<PathBuf>,
    },
    /// Export the street graph of a (filtered) extract
    Graph {
        #[arg(long, value_name = "FILE")]
        input: PathBuf,

        #[arg(long, value_name = "FILE")]
        output: PathBuf,
    },
    /// Export the street grid of a (filtered) extract
    Grid {
        #[arg(long, value_name = "FILE")]
        input: PathBuf,

        #[arg(long, value_name = "FILE")]
        output: PathBuf,

        #[arg(long, value_name = "DEGREES")]
        cell_size: Option<f64>,
    },
    /// Filter, then export both graph and grid from the kept entities
    Pipeline {
        #[arg(long, value_name = "FILE")]
        input: PathBuf,

        #[arg(long, value_name = "FILE")]
        kept: PathBuf,

        #[arg(long, value_name = "FILE")]
        discarded: Option<PathBuf>,

        #[arg(long, value_name = "FILE")]
        graph: PathBuf,

        #[arg(long, value_name = "FILE")]
        grid: PathBuf,

        #[arg(long, value_name = "DEGREES")]
        cell_size: Option<f64>,
    },
    /// Load a graph export and check that every neighbor link is mirrored
    CheckGraph {
        #[arg(long, value_name = "FILE")]
        graph: PathBuf,
    },
    /// Print the streets closest to a coordinate, looked up in a grid export
    Nearest {
        #[arg(long, value_name = "FILE")]
        grid: PathBuf,

        #[arg(long)]
        lat: f64,

        #[arg(long)]
        lon: f64,

        #[arg(long, default_value_t = 5)]
        count: usize,
    },
    /// Print the JSON schema of the config file
    ConfigSchema,
}

pub struct Runner {
    mode: CliMode,
    config_file: Option<PathBuf>,
}

impl Runner {
    pub fn new(cli: Cli) -> Self {
        Self {
            mode: cli.mode,
            config_file: cli.config,
        }
    }

    pub fn run(&self) -> Result<(), RunnerError> {
        let cell_size = match &self.mode {
            CliMode::Grid { cell_size, .. } | CliMode::Pipeline { cell_size, .. } => *cell_size,
            _ => None,
        };
        let config = PipelineConfig::read(self.config_file.clone())
            .and_then(|config| config.with_cell_size(cell_size))
            .map_err(|error| RunnerError::Config { error })?;

        match &self.mode {
            CliMode::Filter {
                input,
                kept,
                discarded,
            } => {
                let source = get_source(input)?;
                run_filter(&source, kept, discarded.as_ref())?;
                Ok(())
            }
            CliMode::Graph { input, output } => {
                let edge_set = get_edge_set(&get_source(input)?)?;
                run_graph(&edge_set, output, &config)
            }
            CliMode::Grid { input, output, .. } => {
                let edge_set = get_edge_set(&get_source(input)?)?;
                run_grid(&edge_set, output, &config)
            }
            CliMode::Pipeline {
                input,
                kept,
                discarded,
                graph,
                grid,
                ..
            } => run_pipeline(input, kept, discarded.as_ref(), graph, grid, &config),
            CliMode::CheckGraph { graph } => {
                let graph = StreetGraph::read_jsonl(graph, &config.graph.unknown_speed_limit)
                    .map_err(|error| RunnerError::ResultRead { error })?;
                let isolated = graph.iter().filter(|node| node.degree() == 0).count();
                info!(
                    nodes = graph.len(),
                    directed_edges = graph.edge_count(),
                    isolated,
                    "Graph is consistent"
                );
                Ok(())
            }
            CliMode::Nearest {
                grid,
                lat,
                lon,
                count,
            } => {
                if !is_valid_location(lat, lon) {
                    return Err(RunnerError::InvalidCoordinate {
                        lat: *lat,
                        lon: *lon,
                    });
                }
                let grid = StreetGrid::read_jsonl(grid)
                    .map_err(|error| RunnerError::ResultRead { error })?;
                let closest = grid.closest_streets(*lat, *lon, *count);
                let json = serde_json::to_string(&closest)
                    .map_err(|error| RunnerError::SerializeJson { error })?;
                writeln!(io::stdout(), "{json}").map_err(|error| RunnerError::Stdout { error })
            }
            CliMode::ConfigSchema => {
                let schema =
                    PipelineConfig::schema().map_err(|error| RunnerError::Config { error })?;
                writeln!(io::stdout(), "{schema}").map_err(|error| RunnerError::Stdout { error })
            }
        }
    }
}

fn get_source(input: &PathBuf) -> Result<OsmDataReader, RunnerError> {
    let data_source =
        DataSource::from_path(input.clone()).map_err(|error| RunnerError::Source { error })?;
    let reader = OsmDataReader::new(data_source);
    info!(source = ?reader.source(), "Input");
    Ok(reader)
}

fn get_edge_set<S: EntitySource>(source: &S) -> Result<EdgeSet, RunnerError> {
    EdgeSetBuilder::from_source(source).map_err(|error| RunnerError::Source { error })
}

fn log_report(stage: &str, report: &BuildReport) {
    if report.is_clean() {
        info!(stage, "No anomalies");
    } else {
        tracing::warn!(
            stage,
            invalid_points = report.invalid_points,
            missing_points = report.missing_points,
            degenerate_lines = report.degenerate_lines,
            skipped_ways = report.skipped_ways,
            "Input anomalies were skipped"
        );
    }
}

#[tracing::instrument(skip(source))]
fn run_filter<S: EntitySource>(
    source: &S,
    kept: &PathBuf,
    discarded: Option<&PathBuf>,
) -> Result<PartitionStats, RunnerError> {
    let mut kept_writer =
        JsonWriter::create(kept.clone()).map_err(|error| RunnerError::Sink { error })?;
    let mut discarded_writer = discarded
        .map(|file| JsonWriter::create(file.clone()))
        .transpose()
        .map_err(|error| RunnerError::Sink { error })?;

    partition_entities(
        source,
        &mut kept_writer,
        discarded_writer
            .as_mut()
            .map(|writer| writer as &mut dyn EntitySink),
    )
    .map_err(|error| RunnerError::Partition { error })
}

#[tracing::instrument(skip(edge_set, config))]
fn run_graph(
    edge_set: &EdgeSet,
    output: &PathBuf,
    config: &PipelineConfig,
) -> Result<(), RunnerError> {
    let (graph, mut report) = GraphBuilder::build(edge_set);
    report.merge(&edge_set.report);
    log_report("graph", &report);

    ResultWriter::write_graph(
        output,
        &graph,
        &config.graph.unknown_speed_limit,
        config.progress_every,
    )
    .map_err(|error| RunnerError::ResultWrite { error })?;
    Ok(())
}

#[tracing::instrument(skip(edge_set, config))]
fn run_grid(
    edge_set: &EdgeSet,
    output: &PathBuf,
    config: &PipelineConfig,
) -> Result<(), RunnerError> {
    let (grid, mut report) = GridIndexBuilder::new(&edge_set.edges, config.grid.cell_size)
        .map_err(|error| RunnerError::Grid { error })?
        .build(&edge_set.edges, config.progress_every);
    report.merge(&edge_set.report);
    log_report("grid", &report);

    ResultWriter::write_grid(output, &grid, config.progress_every)
        .map_err(|error| RunnerError::ResultWrite { error })?;
    Ok(())
}

/// Filter first, then build graph and grid side by side from the kept file.
#[tracing::instrument(skip(config))]
fn run_pipeline(
    input: &PathBuf,
    kept: &PathBuf,
    discarded: Option<&PathBuf>,
    graph: &PathBuf,
    grid: &PathBuf,
    config: &PipelineConfig,
) -> Result<(), RunnerError> {
    let start = Instant::now();
    run_filter(&get_source(input)?, kept, discarded)?;

    let kept_source = OsmDataReader::new(DataSource::JsonFile { file: kept.clone() });
    let edge_set = get_edge_set(&kept_source)?;

    let (graph_result, grid_result) = rayon::join(
        || run_graph(&edge_set, graph, config),
        || run_grid(&edge_set, grid, config),
    );
    graph_result?;
    grid_result?;

    info!(duration_secs = start.elapsed().as_secs(), "Pipeline done");
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::fs;

    use crate::{osm_data::json_writer::JsonWriter, test_utils::test_dataset_1};

    use super::*;

    fn write_input(dir: &std::path::Path) -> PathBuf {
        let file = dir.join("extract.jsonl");
        let mut writer = JsonWriter::create(file.clone()).unwrap();
        for entity in test_dataset_1() {
            match entity {
                crate::map_data::osm::OsmEntity::Node(node) => writer.add_node(&node).unwrap(),
                crate::map_data::osm::OsmEntity::Way(way) => writer.add_way(&way).unwrap(),
            }
        }
        writer.close().unwrap();
        file
    }

    fn cli(args: &[&str]) -> Cli {
        Cli::parse_from(std::iter::once("street-grid").chain(args.iter().copied()))
    }

    #[test]
    fn pipeline_writes_all_products() {
        let dir = tempfile::tempdir().unwrap();
        let input = write_input(dir.path());
        let path = |name: &str| dir.path().join(name).to_string_lossy().to_string();

        Runner::new(cli(&[
            "pipeline",
            "--input",
            &input.to_string_lossy(),
            "--kept",
            &path("kept.jsonl"),
            "--discarded",
            &path("discarded.jsonl"),
            "--graph",
            &path("graph.jsonl"),
            "--grid",
            &path("grid.jsonl"),
            "--cell-size",
            "0.001",
        ]))
        .run()
        .unwrap();

        let kept = fs::read_to_string(path("kept.jsonl")).unwrap();
        let discarded = fs::read_to_string(path("discarded.jsonl")).unwrap();
        // 9 nodes + 3 ways kept, 3 nodes + 2 ways discarded
        assert_eq!(kept.lines().count(), 12);
        assert_eq!(discarded.lines().count(), 5);

        let graph = StreetGraph::read_jsonl(dir.path().join("graph.jsonl").as_path(), "Unknown")
            .unwrap();
        assert_eq!(graph.len(), 9);
        assert_eq!(graph.edge_count(), 16);

        let grid = StreetGrid::read_jsonl(dir.path().join("grid.jsonl").as_path()).unwrap();
        assert_eq!(grid.cell_size(), 0.001);
        assert!(grid.segment_count() >= 8);
    }

    #[test]
    fn graph_and_grid_accept_unfiltered_input() {
        let dir = tempfile::tempdir().unwrap();
        let input = write_input(dir.path());
        let graph_file = dir.path().join("graph.jsonl");
        let grid_file = dir.path().join("grid.jsonl");

        Runner::new(cli(&[
            "graph",
            "--input",
            &input.to_string_lossy(),
            "--output",
            &graph_file.to_string_lossy(),
        ]))
        .run()
        .unwrap();
        Runner::new(cli(&[
            "grid",
            "--input",
            &input.to_string_lossy(),
            "--output",
            &grid_file.to_string_lossy(),
        ]))
        .run()
        .unwrap();

        let graph = StreetGraph::read_jsonl(&graph_file, "Unknown").unwrap();
        assert!(graph.get_edge(&11, &12).is_none());
        assert!(graph.get_edge(&6, &8).is_none());
        assert_eq!(graph.edge_count(), 16);
        let grid = StreetGrid::read_jsonl(&grid_file).unwrap();
        assert_eq!(grid.cell_size(), 0.0005);
    }

    #[test]
    fn invalid_cell_size_fails_before_reading() {
        let result = Runner::new(cli(&[
            "grid",
            "--input",
            "does-not-matter.pbf",
            "--output",
            "unused.jsonl",
            "--cell-size",
            "0",
        ]))
        .run();
        assert!(matches!(result, Err(RunnerError::Config { .. })));
    }

    #[test]
    fn unsupported_input_is_rejected() {
        let result = Runner::new(cli(&[
            "filter",
            "--input",
            "extract.osm",
            "--kept",
            "kept.jsonl",
        ]))
        .run();
        assert!(matches!(
            result,
            Err(RunnerError::Source {
                error: OsmDataReaderError::UnsupportedFormat { .. }
            })
        ));
    }

    #[test]
    fn exports_can_be_checked_and_queried() {
        let dir = tempfile::tempdir().unwrap();
        let input = write_input(dir.path());
        let graph_file = dir.path().join("graph.jsonl");
        let grid_file = dir.path().join("grid.jsonl");
        for (mode, output) in [("graph", &graph_file), ("grid", &grid_file)] {
            Runner::new(cli(&[
                mode,
                "--input",
                &input.to_string_lossy(),
                "--output",
                &output.to_string_lossy(),
            ]))
            .run()
            .unwrap();
        }

        Runner::new(cli(&["check-graph", "--graph", &graph_file.to_string_lossy()]))
            .run()
            .unwrap();
        Runner::new(cli(&[
            "nearest",
            "--grid",
            &grid_file.to_string_lossy(),
            "--lat",
            "47.998",
            "--lon",
            "7.8515",
        ]))
        .run()
        .unwrap();

        let missing = dir.path().join("missing.jsonl");
        let result =
            Runner::new(cli(&["check-graph", "--graph", &missing.to_string_lossy()])).run();
        assert!(matches!(result, Err(RunnerError::ResultRead { .. })));
    }

    #[test]
    fn nearest_rejects_coordinates_off_the_globe() {
        for (lat, lon) in [("1e300", "7.85"), ("48.0", "181"), ("NaN", "7.85")] {
            let result = Runner::new(cli(&[
                "nearest",
                "--grid",
                "never-read.jsonl",
                "--lat",
                lat,
                "--lon",
                lon,
            ]))
            .run();
            assert!(
                matches!(result, Err(RunnerError::InvalidCoordinate { .. })),
                "{lat}, {lon}: {result:?}"
            );
        }
    }

    #[test]
    fn log_level_is_parsed() {
        let parsed = cli(&["--log-level", "debug", "config-schema"]);
        assert_eq!(parsed.log_level, Level::DEBUG);
        assert!(matches!(parsed.mode, CliMode::ConfigSchema));
    }
}
