//! Materialization engine
//!
//! Runs the full pipeline over a rule table: normalize, partition, then
//! materialize each partition as an independent unit of work on the worker
//! pool. A partition deduplicates locally in a hash set and writes one
//! N-Quads file; because partitions cannot overlap, local dedup is global
//! dedup and no synchronization crosses worker boundaries. Only the quad
//! count comes back from a worker. The first failing partition aborts the
//! run.

mod datatype;
mod functions;
mod join;
mod term;

pub use functions::{FunctionRegistry, FunctionValue, MapFunctionRegistry};
pub use term::RdfTerm;

use std::collections::HashSet;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::PathBuf;
use std::sync::Arc;

use rayon::prelude::*;
use tracing::{debug, info};

use crate::config::MaterializationConfig;
use crate::error::{RmlError, RmlResult};
use crate::model::{LogicalSource, MappingRule, Position, RuleTable, TermMap, TermType};
use crate::normalize::normalize;
use crate::partition::{assign_partition_keys, PartitionSummary};
use crate::pool::WorkerPool;
use crate::source::{ChunkIter, DataSource, SourceRegistry};
use crate::vocab::R2RML;

use term::{render_term, RowView};

/// Outcome of a materialization run
#[derive(Debug, Clone)]
pub struct MaterializationReport {
    /// Total distinct quads written across all partitions
    pub triples: u64,
    /// What the partitioner did
    pub partitioning: PartitionSummary,
    /// Output file per partition, in partition order
    pub outputs: Vec<PathBuf>,
}

/// The materialization engine
///
/// Owns the run configuration, the data-source registry, and the optional
/// function-execution collaborator. One instance drives one run end to end.
pub struct Materializer {
    config: MaterializationConfig,
    sources: SourceRegistry,
    functions: Option<Arc<dyn FunctionRegistry>>,
}

impl Materializer {
    /// Create an engine over a source registry.
    pub fn new(config: MaterializationConfig, sources: SourceRegistry) -> Self {
        Self {
            config,
            sources,
            functions: None,
        }
    }

    /// Attach a function-execution collaborator for computed columns.
    pub fn with_functions(mut self, functions: Arc<dyn FunctionRegistry>) -> Self {
        self.functions = Some(functions);
        self
    }

    /// Run the pipeline: normalize, partition, materialize.
    ///
    /// Writes one `<key>.nq` file per partition under the configured output
    /// directory and returns the aggregate report.
    pub fn materialize(&self, mut table: RuleTable) -> RmlResult<MaterializationReport> {
        normalize(&mut table)?;
        self.infer_datatypes(&mut table);

        let pool = WorkerPool::new(self.config.workers)?;
        let partitioning = assign_partition_keys(&mut table, self.config.algorithm, &pool)?;

        fs::create_dir_all(&self.config.output_dir)?;
        let partitions = table.partitions();
        info!(
            partitions = partitions.len(),
            rules = table.len(),
            workers = pool.workers(),
            "materialization started"
        );

        let table = &table;
        let results: RmlResult<Vec<(PathBuf, u64)>> = pool.install(|| {
            partitions
                .par_iter()
                .map(|(key, indices)| self.run_partition(key, indices, table))
                .collect()
        });
        let results = results?;

        let triples: u64 = results.iter().map(|(_, n)| n).sum();
        let outputs = results.into_iter().map(|(path, _)| path).collect();
        info!(triples, "materialization complete");
        Ok(MaterializationReport {
            triples,
            partitioning,
            outputs,
        })
    }

    /// Materialize one partition into its output file.
    fn run_partition(
        &self,
        key: &str,
        rule_indices: &[usize],
        table: &RuleTable,
    ) -> RmlResult<(PathBuf, u64)> {
        let path = self.config.output_dir.join(format!("{key}.nq"));
        let mut sink = PartitionSink {
            seen: HashSet::new(),
            writer: BufWriter::new(File::create(&path)?),
            quads: 0,
        };
        for &index in rule_indices {
            let rule = &table.rules()[index];
            debug!(
                partition = %key,
                triples_map = %rule.triples_map_id,
                "materializing rule"
            );
            self.execute_rule(rule, table, &mut sink)?;
        }
        sink.writer.flush()?;
        Ok((path, sink.quads))
    }

    /// Fill in inferable object datatypes from relational schemas.
    ///
    /// Runs before partitioning so the inferred datatype is part of the
    /// object's `(language, datatype)` bucket: an explicitly-typed rule and
    /// an inference-typed rule over the same column land in the same
    /// partition and deduplicate against each other.
    fn infer_datatypes(&self, table: &mut RuleTable) {
        if !self.config.infer_sql_datatypes {
            return;
        }
        for rule in table.rules_mut() {
            if rule.object_datatype.is_some() {
                continue;
            }
            let Ok(source) = self.sources.get(&rule.source_name) else {
                // Missing sources fail loudly at fetch time instead.
                continue;
            };
            if let Some(relational) = source.relational() {
                rule.object_datatype = datatype::infer_object_datatype(rule, relational);
            }
        }
    }

    /// Fetch rows for a logical source, routing raw queries through the
    /// relational view when the source has one.
    fn fetch_rows<'a>(
        &self,
        source: &'a DataSource,
        logical_source: &LogicalSource,
        columns: &[String],
    ) -> RmlResult<ChunkIter<'a>> {
        match (logical_source.query_text(), source.relational()) {
            (Some(sql), Some(relational)) => {
                relational.execute_query(sql, self.config.chunk_size)
            }
            _ => source
                .row_source()
                .fetch(logical_source, columns, self.config.chunk_size),
        }
    }

    /// Materialize one rule into the partition sink.
    fn execute_rule(
        &self,
        rule: &MappingRule,
        table: &RuleTable,
        sink: &mut PartitionSink,
    ) -> RmlResult<()> {
        let source = self.sources.get(&rule.source_name)?;

        match rule.parent_join() {
            None => {
                let object = rule.object.as_ref().ok_or_else(|| {
                    RmlError::Materialization(format!(
                        "rule of '{}' has no object map after normalization",
                        rule.triples_map_id
                    ))
                })?;
                let needed = rule.needed_columns();
                let chunks = self.fetch_rows(source, &rule.logical_source, &needed)?;
                for chunk in chunks {
                    let chunk = self.apply_functions(chunk?, rule)?;
                    for row in 0..chunk.num_rows() {
                        let view = RowView {
                            chunk: &chunk,
                            row,
                            prefix: "",
                        };
                        self.render_quad(
                            rule,
                            &view,
                            object,
                            rule.termtype(Position::Object),
                            rule.object_datatype.as_deref(),
                            rule.object_language.as_deref(),
                            &view,
                            sink,
                        )?;
                    }
                }
            }
            Some((parent_id, conditions)) => {
                let parent = table.rule_for_map(parent_id)?;
                let parent_termtype = parent.termtype(Position::Subject);
                if join::push_down_applicable(
                    rule,
                    parent,
                    source,
                    self.config.push_down_sql_joins,
                ) {
                    self.execute_push_down_join(rule, parent, conditions, source, sink)?;
                } else {
                    self.execute_memory_join(
                        rule,
                        parent,
                        parent_termtype,
                        conditions,
                        source,
                        sink,
                    )?;
                }
            }
        }
        Ok(())
    }

    fn execute_push_down_join(
        &self,
        rule: &MappingRule,
        parent: &MappingRule,
        conditions: &[crate::model::JoinCondition],
        source: &DataSource,
        sink: &mut PartitionSink,
    ) -> RmlResult<()> {
        let relational = source.relational().ok_or_else(|| {
            RmlError::Materialization("push-down join against a non-relational source".to_string())
        })?;
        let query = join::build_join_query(rule, parent, conditions)?;
        debug!(sql = %query.sql, "executing push-down join");
        let chunks = relational.execute_join(&query, self.config.chunk_size)?;
        for chunk in chunks {
            let chunk = chunk?;
            for row in 0..chunk.num_rows() {
                let child_view = RowView {
                    chunk: &chunk,
                    row,
                    prefix: "child_",
                };
                let parent_view = RowView {
                    chunk: &chunk,
                    row,
                    prefix: "parent_",
                };
                self.render_quad(
                    rule,
                    &child_view,
                    &parent.subject,
                    parent.termtype(Position::Subject),
                    None,
                    None,
                    &parent_view,
                    sink,
                )?;
            }
        }
        Ok(())
    }

    /// Chunked hash join: the parent side is re-fetched for every child
    /// chunk, so memory stays bounded by two chunks per worker.
    fn execute_memory_join(
        &self,
        rule: &MappingRule,
        parent: &MappingRule,
        parent_termtype: TermType,
        conditions: &[crate::model::JoinCondition],
        source: &DataSource,
        sink: &mut PartitionSink,
    ) -> RmlResult<()> {
        let child_cols = join::child_columns(rule, conditions);
        let parent_cols = join::parent_columns(parent, conditions);
        let parent_source = self.sources.get(&parent.source_name)?;

        let child_chunks = self.fetch_rows(source, &rule.logical_source, &child_cols)?;
        for child_chunk in child_chunks {
            let child_chunk = self.apply_functions(child_chunk?, rule)?;
            let parent_chunks =
                self.fetch_rows(parent_source, &parent.logical_source, &parent_cols)?;
            for parent_chunk in parent_chunks {
                // The parent subject may read its rule's computed columns.
                let parent_chunk = self.apply_functions(parent_chunk?, parent)?;
                let merged = join::merge_chunks(&child_chunk, &parent_chunk, conditions)?;
                for row in 0..merged.num_rows() {
                    let child_view = RowView {
                        chunk: &merged,
                        row,
                        prefix: "child_",
                    };
                    let parent_view = RowView {
                        chunk: &merged,
                        row,
                        prefix: "parent_",
                    };
                    self.render_quad(
                        rule,
                        &child_view,
                        &parent.subject,
                        parent_termtype,
                        None,
                        None,
                        &parent_view,
                        sink,
                    )?;
                }
            }
        }
        Ok(())
    }

    fn apply_functions(
        &self,
        chunk: crate::source::RowChunk,
        rule: &MappingRule,
    ) -> RmlResult<crate::source::RowChunk> {
        if rule.computed_columns.is_empty() {
            return Ok(chunk);
        }
        let registry = self.functions.as_ref().ok_or_else(|| {
            RmlError::Materialization(format!(
                "rule of '{}' uses computed columns but no function registry is attached",
                rule.triples_map_id
            ))
        })?;
        functions::apply_computed_columns(
            chunk,
            &rule.computed_columns,
            registry.as_ref(),
            &self.config,
        )
    }

    /// Render one quad from one row and emit it if complete.
    ///
    /// Any null reference in any position produces no quad. Graph terms
    /// equal to the default-graph sentinel are omitted unless configured
    /// otherwise.
    #[allow(clippy::too_many_arguments)]
    fn render_quad(
        &self,
        rule: &MappingRule,
        row: &RowView<'_>,
        object_map: &TermMap,
        object_termtype: TermType,
        object_datatype: Option<&str>,
        object_language: Option<&str>,
        object_row: &RowView<'_>,
        sink: &mut PartitionSink,
    ) -> RmlResult<()> {
        let predicate_map = rule.predicate.as_ref().ok_or_else(|| {
            RmlError::Materialization(format!(
                "rule of '{}' has no predicate map after normalization",
                rule.triples_map_id
            ))
        })?;

        let Some(subject) = render_term(
            &rule.subject,
            rule.termtype(Position::Subject),
            None,
            None,
            row,
            &self.config,
        )?
        else {
            return Ok(());
        };
        let Some(predicate) =
            render_term(predicate_map, TermType::Iri, None, None, row, &self.config)?
        else {
            return Ok(());
        };
        let Some(object) = render_term(
            object_map,
            object_termtype,
            object_datatype,
            object_language,
            object_row,
            &self.config,
        )?
        else {
            return Ok(());
        };

        let default_graph = || {
            if self.config.materialize_default_graph {
                Some(RdfTerm::iri(R2RML::DEFAULT_GRAPH))
            } else {
                None
            }
        };
        let graph = match &rule.graph {
            None => default_graph(),
            Some(graph_map) => {
                match render_term(graph_map, TermType::Iri, None, None, row, &self.config)? {
                    None => return Ok(()),
                    Some(RdfTerm::Iri(iri)) if iri == R2RML::DEFAULT_GRAPH => default_graph(),
                    Some(term) => Some(term),
                }
            }
        };

        let line = match graph {
            Some(graph) => format!(
                "{} {} {} {} .",
                subject.to_ntriples(),
                predicate.to_ntriples(),
                object.to_ntriples(),
                graph.to_ntriples()
            ),
            None => format!(
                "{} {} {} .",
                subject.to_ntriples(),
                predicate.to_ntriples(),
                object.to_ntriples()
            ),
        };
        sink.emit(line)
    }
}

impl std::fmt::Debug for Materializer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Materializer")
            .field("config", &self.config)
            .field("sources", &self.sources)
            .field("functions", &self.functions.is_some())
            .finish()
    }
}

/// Per-partition output: a dedup set and the partition's file
struct PartitionSink {
    seen: HashSet<String>,
    writer: BufWriter<File>,
    quads: u64,
}

impl PartitionSink {
    fn emit(&mut self, line: String) -> RmlResult<()> {
        if self.seen.insert(line.clone()) {
            self.writer.write_all(line.as_bytes())?;
            self.writer.write_all(b"\n")?;
            self.quads += 1;
        }
        Ok(())
    }
}
