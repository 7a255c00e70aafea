use std::{collections::HashSet, time::Instant};

use tracing::info;

use crate::{
    map_data::osm::OsmEntity,
    osm_data::{
        classifier::{classify_way, EntityClass},
        EntitySink, EntitySource, OsmDataReaderError, OsmDataWriterError,
    },
};

#[derive(Debug, thiserror::Error)]
pub enum PartitionError {
    #[error("Failed to read entities: {error}")]
    Read { error: OsmDataReaderError },

    #[error("Failed to write {stream} stream: {error}")]
    Write {
        stream: &'static str,
        error: OsmDataWriterError,
    },
}

impl From<OsmDataReaderError> for PartitionError {
    fn from(error: OsmDataReaderError) -> Self {
        PartitionError::Read { error }
    }
}

/// Ids of every node used by at least one kept way.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct ReferencedNodes {
    ids: HashSet<i64>,
}

impl ReferencedNodes {
    pub fn contains(&self, id: &i64) -> bool {
        self.ids.contains(id)
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

pub struct ReferenceResolver;

impl ReferenceResolver {
    /// First pass. Has to see the whole stream, a node may be referenced by a
    /// kept way that comes after it.
    #[tracing::instrument(skip_all)]
    pub fn resolve<S: EntitySource>(source: &S) -> Result<ReferencedNodes, OsmDataReaderError> {
        let mut referenced = ReferencedNodes::default();
        source.read_entities(|entity| -> Result<(), OsmDataReaderError> {
            if let OsmEntity::Way(way) = entity {
                if classify_way(&way) == EntityClass::Keep {
                    referenced.ids.extend(way.point_ids);
                }
            }
            Ok(())
        })?;
        info!(referenced_nodes = referenced.len(), "Collected referenced nodes");
        Ok(referenced)
    }
}

#[derive(Debug, Default, Clone, PartialEq)]
pub struct PartitionStats {
    pub kept_nodes: usize,
    pub kept_ways: usize,
    pub discarded_nodes: usize,
    pub discarded_ways: usize,
}

pub struct PartitionWriter<'a> {
    referenced: &'a ReferencedNodes,
}

impl<'a> PartitionWriter<'a> {
    pub fn new(referenced: &'a ReferencedNodes) -> Self {
        Self { referenced }
    }

    /// Second pass. Every node and way goes to exactly one stream, or is
    /// dropped when there is no discarded stream. Both streams are closed
    /// afterwards.
    #[tracing::instrument(skip_all)]
    pub fn write<S: EntitySource>(
        &self,
        source: &S,
        kept: &mut dyn EntitySink,
        mut discarded: Option<&mut dyn EntitySink>,
    ) -> Result<PartitionStats, PartitionError> {
        let mut stats = PartitionStats::default();
        source.read_entities(|entity| -> Result<(), PartitionError> {
            match entity {
                OsmEntity::Node(node) => {
                    if self.referenced.contains(&node.id) {
                        kept.add_node(&node)
                            .map_err(|error| PartitionError::Write {
                                stream: "kept",
                                error,
                            })?;
                        stats.kept_nodes += 1;
                    } else {
                        if let Some(discarded) = discarded.as_mut() {
                            discarded
                                .add_node(&node)
                                .map_err(|error| PartitionError::Write {
                                    stream: "discarded",
                                    error,
                                })?;
                        }
                        stats.discarded_nodes += 1;
                    }
                }
                OsmEntity::Way(way) => {
                    if classify_way(&way) == EntityClass::Keep {
                        kept.add_way(&way)
                            .map_err(|error| PartitionError::Write {
                                stream: "kept",
                                error,
                            })?;
                        stats.kept_ways += 1;
                    } else {
                        if let Some(discarded) = discarded.as_mut() {
                            discarded
                                .add_way(&way)
                                .map_err(|error| PartitionError::Write {
                                    stream: "discarded",
                                    error,
                                })?;
                        }
                        stats.discarded_ways += 1;
                    }
                }
            }
            Ok(())
        })?;

        kept.close().map_err(|error| PartitionError::Write {
            stream: "kept",
            error,
        })?;
        if let Some(discarded) = discarded.as_mut() {
            discarded.close().map_err(|error| PartitionError::Write {
                stream: "discarded",
                error,
            })?;
        }

        Ok(stats)
    }
}

/// Runs both passes: resolve references, then route every entity.
#[tracing::instrument(skip_all)]
pub fn partition_entities<S: EntitySource>(
    source: &S,
    kept: &mut dyn EntitySink,
    discarded: Option<&mut dyn EntitySink>,
) -> Result<PartitionStats, PartitionError> {
    let start = Instant::now();
    info!("Collecting referenced nodes");
    let referenced = ReferenceResolver::resolve(source)?;

    info!("Writing nodes and ways");
    let write_discarded = discarded.is_some();
    let stats = PartitionWriter::new(&referenced).write(source, kept, discarded)?;

    info!(
        kept_nodes = stats.kept_nodes,
        kept_ways = stats.kept_ways,
        discarded_nodes = stats.discarded_nodes,
        discarded_ways = stats.discarded_ways,
        write_discarded,
        duration_secs = start.elapsed().as_secs(),
        "Filtering complete"
    );
    Ok(stats)
}
