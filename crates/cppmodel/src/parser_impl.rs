//! Implementation of the ModelExtractor trait for C++

use cppmodel_api::{
    DiagnosticKind, ExtractError, Extraction, IncludePolicy, ModelExtractor, ParserConfig,
    ParserError, ParserMetrics, TranslationUnit, UnitIR, UnitSummary,
};
use rayon::prelude::*;
use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use crate::extractor::extract_unit;
use crate::ingestor::{canonical_path, resolve_include, SourceIngestor, TreeSitterIngestor};
use crate::merger::Merger;
use crate::resolver;

/// A unit scheduled for one wave of parsing
struct PendingUnit {
    index: usize,
    unit: TranslationUnit,
    included: bool,
}

/// What a worker hands back for one unit
struct UnitOutput {
    ir: UnitIR,
    parse_time: Duration,
}

struct UnitOutcome {
    index: usize,
    path: PathBuf,
    included: bool,
    result: Result<UnitOutput, ParserError>,
}

/// C++ model extractor implementing the ModelExtractor trait
pub struct CppModelExtractor {
    config: ParserConfig,
    ingestor: Box<dyn SourceIngestor>,
    metrics: Mutex<ParserMetrics>,
}

impl CppModelExtractor {
    /// Create a new extractor with default configuration
    pub fn new() -> Self {
        Self::with_config(ParserConfig::default())
    }

    /// Create a new extractor with custom configuration
    pub fn with_config(config: ParserConfig) -> Self {
        Self::with_ingestor(config, TreeSitterIngestor::new())
    }

    /// Create an extractor that parses through another front end
    pub fn with_ingestor(config: ParserConfig, ingestor: impl SourceIngestor + 'static) -> Self {
        Self {
            config,
            ingestor: Box::new(ingestor),
            metrics: Mutex::new(ParserMetrics::default()),
        }
    }

    /// Update metrics after a unit finished
    fn update_metrics(&self, run: &mut ParserMetrics, success: bool, duration: Duration, entities: usize) {
        run.units_attempted += 1;
        if success {
            run.units_succeeded += 1;
        } else {
            run.units_failed += 1;
        }
        run.total_parse_time += duration;
        run.total_entities += entities;
    }

    fn build_pool(&self) -> Result<Option<rayon::ThreadPool>, ExtractError> {
        if !self.config.parallel {
            return Ok(None);
        }

        let mut builder = rayon::ThreadPoolBuilder::new();
        if let Some(workers) = self.config.parallel_workers {
            builder = builder.num_threads(workers);
        }
        builder
            .build()
            .map(Some)
            .map_err(|e| ExtractError::ThreadPool(e.to_string()))
    }

    /// Ingest and build one unit; runs on a worker thread
    fn process_unit(&self, pending: &PendingUnit) -> Result<UnitOutput, ParserError> {
        let start = Instant::now();
        let parsed = self.ingestor.parse(&pending.unit, &self.config)?;
        let ir = extract_unit(&parsed, pending.index, &self.config);
        let parse_time = start.elapsed();

        log::debug!(
            "Parsed {} in {:?} ({} entities)",
            pending.unit.path.display(),
            parse_time,
            ir.entity_count()
        );
        Ok(UnitOutput { ir, parse_time })
    }

    /// Results come back in wave order regardless of which worker finished first
    fn run_wave(
        &self,
        wave: &[PendingUnit],
        pool: Option<&rayon::ThreadPool>,
    ) -> Vec<Result<UnitOutput, ParserError>> {
        match pool {
            Some(pool) => pool.install(|| {
                wave.par_iter()
                    .map(|pending| self.process_unit(pending))
                    .collect()
            }),
            None => wave.iter().map(|pending| self.process_unit(pending)).collect(),
        }
    }

    /// Headers included by a parsed unit that have not been scheduled yet
    fn discover_includes(
        &self,
        pending: &PendingUnit,
        ir: &UnitIR,
        seen: &mut HashSet<PathBuf>,
        next_index: &mut usize,
    ) -> Vec<PendingUnit> {
        let compiler = self.config.compiler.layered(&pending.unit.flags);
        let mut discovered = Vec::new();

        for include in &ir.includes {
            let Some(path) =
                resolve_include(include, &pending.unit.path, &compiler, self.config.follow_includes)
            else {
                continue;
            };
            let canonical = canonical_path(&path);
            if !seen.insert(canonical.clone()) {
                continue;
            }

            log::debug!(
                "Following include {} from {}",
                canonical.display(),
                pending.unit.path.display()
            );
            let mut unit = TranslationUnit::new(canonical);
            unit.flags = pending.unit.flags.clone();
            discovered.push(PendingUnit {
                index: *next_index,
                unit,
                included: true,
            });
            *next_index += 1;
        }

        discovered
    }
}

impl Default for CppModelExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl ModelExtractor for CppModelExtractor {
    fn file_extensions(&self) -> &[&str] {
        &[".cpp", ".cc", ".cxx", ".c++", ".hpp", ".hh", ".hxx", ".h", ".h++"]
    }

    fn extract_units(&self, units: &[TranslationUnit]) -> Result<Extraction, ExtractError> {
        let start = Instant::now();
        log::info!("Extracting C++ model from {} translation units", units.len());

        let pool = self.build_pool()?;
        let mut run = ParserMetrics::default();

        let mut seen: HashSet<PathBuf> = units.iter().map(|u| canonical_path(&u.path)).collect();
        let mut next_index = units.len();
        let mut wave: Vec<PendingUnit> = units
            .iter()
            .enumerate()
            .map(|(index, unit)| PendingUnit {
                index,
                unit: unit.clone(),
                included: false,
            })
            .collect();

        // Each wave is fully parsed before the includes it discovered are
        // scheduled, so unit indices never depend on worker timing.
        let mut outcomes: Vec<UnitOutcome> = Vec::new();
        while !wave.is_empty() {
            let results = self.run_wave(&wave, pool.as_ref());
            let mut discovered = Vec::new();

            for (pending, result) in wave.iter().zip(results) {
                match result {
                    Ok(output) => {
                        self.update_metrics(&mut run, true, output.parse_time, output.ir.entity_count());
                        if self.config.follow_includes != IncludePolicy::None {
                            discovered.extend(self.discover_includes(
                                pending,
                                &output.ir,
                                &mut seen,
                                &mut next_index,
                            ));
                        }
                        outcomes.push(UnitOutcome {
                            index: pending.index,
                            path: pending.unit.path.clone(),
                            included: pending.included,
                            result: Ok(output),
                        });
                    }
                    Err(e) => {
                        self.update_metrics(&mut run, false, Duration::ZERO, 0);
                        if self.config.strict {
                            self.metrics
                                .lock()
                                .unwrap_or_else(|e| e.into_inner())
                                .merge(&run);
                            log::error!("Aborting run: {}", e);
                            return Err(ExtractError::StrictAbort {
                                path: pending.unit.path.clone(),
                                source: e,
                            });
                        }
                        log::warn!("Skipping {}: {}", pending.unit.path.display(), e);
                        outcomes.push(UnitOutcome {
                            index: pending.index,
                            path: pending.unit.path.clone(),
                            included: pending.included,
                            result: Err(e),
                        });
                    }
                }
            }

            wave = discovered;
        }

        let mut merger = Merger::new();
        let mut summaries = Vec::new();
        let mut failed_units = Vec::new();
        for outcome in outcomes {
            match outcome.result {
                Ok(output) => {
                    summaries.push(UnitSummary {
                        file_path: outcome.path,
                        unit_index: outcome.index,
                        included: outcome.included,
                        entity_count: output.ir.entity_count(),
                        parse_time: output.parse_time,
                        line_count: output.ir.line_count,
                        byte_count: output.ir.byte_count,
                    });
                    merger.add_unit(output.ir);
                }
                Err(e) => failed_units.push((outcome.path, e.to_string())),
            }
        }

        let merged = merger.finish();
        run.merge_conflicts = merged.stats.conflicts;
        let model = resolver::resolve(merged);
        run.merged_entities = model.len();
        run.comment_warnings = model
            .diagnostics_of_kind(DiagnosticKind::CommentWarning)
            .count();

        self.metrics
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .merge(&run);

        log::info!(
            "Extracted {} entities from {} units ({} failed, {} conflicts) in {:?}",
            run.merged_entities,
            summaries.len(),
            failed_units.len(),
            run.merge_conflicts,
            start.elapsed()
        );

        Ok(Extraction {
            model,
            units: summaries,
            failed_units,
            metrics: run,
        })
    }

    fn config(&self) -> &ParserConfig {
        &self.config
    }

    fn metrics(&self) -> ParserMetrics {
        self.metrics.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    fn reset_metrics(&mut self) {
        *self.metrics.lock().unwrap_or_else(|e| e.into_inner()) = ParserMetrics::default();
    }
}
