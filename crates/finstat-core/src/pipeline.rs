//! Pipeline orchestration: extract, transform, validate.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};
use std::time::Instant;

use serde::{Deserialize, Serialize};

use crate::error::ExtractError;
use crate::extract::{ExtractOptions, ExtractorRegistry, Source};
use crate::normalize::{ScaleNormalizer, Transformer};
use crate::schema::{FinancialData, UtcDateTime};
use crate::validate::{QualityValidator, ValidationResult, Validator};

pub const PIPELINE_VERSION: &str = env!("CARGO_PKG_VERSION");

const DEFAULT_BATCH_CONCURRENCY: usize = 5;

/// Per-run knobs.
#[derive(Debug, Clone, Default)]
pub struct PipelineOptions {
    /// Free-text hint forwarded to scale detection, e.g. "in thousands".
    pub context: Option<String>,
    /// In strict mode any validation issue at all fails the run's verdict.
    pub strict_validation: bool,
    pub use_cache: bool,
    /// Limit extraction to the most recent N fiscal years.
    pub years: Option<usize>,
}

impl PipelineOptions {
    pub fn new() -> Self {
        Self {
            use_cache: true,
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageTiming {
    pub stage: String,
    pub elapsed_ms: f64,
}

/// Provenance of one pipeline run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineMeta {
    pub run_id: uuid::Uuid,
    pub source: String,
    pub source_kind: String,
    pub extractor: String,
    pub started_at: UtcDateTime,
    pub pipeline_version: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelinePerformance {
    pub total_ms: f64,
    pub stages: Vec<StageTiming>,
}

/// Everything a pipeline run produces.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineReport {
    pub data: FinancialData,
    pub validation: ValidationResult,
    pub meta: PipelineMeta,
    pub performance: PipelinePerformance,
}

/// Cumulative counters across runs of one pipeline instance.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PipelineStats {
    pub runs: u64,
    pub successes: u64,
    pub failures: u64,
    pub per_extractor: BTreeMap<String, u64>,
    pub total_elapsed_ms: f64,
}

/// Outcome of a batch run: successful reports plus per-source failures.
/// One bad ticker never aborts the rest of the batch.
#[derive(Debug)]
pub struct BatchReport {
    pub reports: Vec<PipelineReport>,
    pub failures: Vec<(String, ExtractError)>,
}

/// The orchestrator. Stages run strictly in order: extraction produces the
/// aggregate, transformers rewrite it in place, validators only observe.
pub struct Pipeline {
    registry: ExtractorRegistry,
    transformers: Vec<Arc<dyn Transformer>>,
    validators: Vec<Arc<dyn Validator>>,
    stats: Mutex<PipelineStats>,
}

impl Default for Pipeline {
    fn default() -> Self {
        Self::new(
            ExtractorRegistry::default(),
            vec![Arc::new(ScaleNormalizer)],
            vec![Arc::new(QualityValidator::default())],
        )
    }
}

impl Pipeline {
    pub fn new(
        registry: ExtractorRegistry,
        transformers: Vec<Arc<dyn Transformer>>,
        validators: Vec<Arc<dyn Validator>>,
    ) -> Self {
        Self {
            registry,
            transformers,
            validators,
            stats: Mutex::new(PipelineStats::default()),
        }
    }

    pub fn extractor_ids(&self) -> Vec<&'static str> {
        self.registry.ids()
    }

    /// Run the full pipeline for one source string.
    pub async fn run(
        &self,
        source_input: &str,
        options: &PipelineOptions,
    ) -> Result<PipelineReport, ExtractError> {
        let started = Instant::now();
        let started_at = UtcDateTime::now();
        let mut stages = Vec::new();

        let result = self
            .run_stages(source_input, options, &mut stages)
            .await;

        let total_ms = elapsed_ms(started);
        match result {
            Ok((data, validation, source, extractor_id)) => {
                self.record_run(extractor_id, total_ms, true);
                Ok(PipelineReport {
                    data,
                    validation,
                    meta: PipelineMeta {
                        run_id: uuid::Uuid::new_v4(),
                        source: source.describe(),
                        source_kind: source.kind().to_owned(),
                        extractor: extractor_id.to_owned(),
                        started_at,
                        pipeline_version: PIPELINE_VERSION.to_owned(),
                        context: options.context.clone(),
                    },
                    performance: PipelinePerformance { total_ms, stages },
                })
            }
            Err(error) => {
                self.record_run("", total_ms, false);
                Err(error)
            }
        }
    }

    async fn run_stages(
        &self,
        source_input: &str,
        options: &PipelineOptions,
        stages: &mut Vec<StageTiming>,
    ) -> Result<(FinancialData, ValidationResult, Source, &'static str), ExtractError> {
        let source = Source::parse(source_input)?;
        let extractor = self.registry.select(&source).ok_or_else(|| {
            ExtractError::invalid_source(format!(
                "no extractor accepts source '{}'",
                source.describe()
            ))
        })?;

        let extract_options = ExtractOptions {
            years: options.years,
            use_cache: options.use_cache,
            context: options.context.clone(),
        };

        let stage_start = Instant::now();
        let mut data = extractor.extract(&source, &extract_options).await?;
        stages.push(StageTiming {
            stage: "extract".to_owned(),
            elapsed_ms: elapsed_ms(stage_start),
        });

        for transformer in &self.transformers {
            let stage_start = Instant::now();
            // A failed transformer is recorded and skipped; downstream
            // validation still sees the untransformed data.
            if let Err(error) = transformer.apply(&mut data, options.context.as_deref()) {
                data.metadata.push_warning(format!(
                    "transformer '{}' failed: {}",
                    transformer.name(),
                    error.message()
                ));
            }
            stages.push(StageTiming {
                stage: transformer.name().to_owned(),
                elapsed_ms: elapsed_ms(stage_start),
            });
        }

        let stage_start = Instant::now();
        let mut validation = ValidationResult::valid();
        validation.completeness = data.completeness_score();
        for validator in &self.validators {
            validation.merge(validator.validate(&data, options.strict_validation));
        }
        stages.push(StageTiming {
            stage: "validate".to_owned(),
            elapsed_ms: elapsed_ms(stage_start),
        });

        Ok((data, validation, source, extractor.id()))
    }

    /// Run a batch of sources with bounded concurrency. Failures are
    /// collected per source; successes come back in completion order.
    pub async fn run_batch(
        self: &Arc<Self>,
        sources: Vec<String>,
        options: &PipelineOptions,
        concurrency: Option<usize>,
    ) -> BatchReport {
        let limit = concurrency.unwrap_or(DEFAULT_BATCH_CONCURRENCY).max(1);
        let semaphore = Arc::new(tokio::sync::Semaphore::new(limit));
        let mut join_set = tokio::task::JoinSet::new();

        for source in sources {
            let pipeline = Arc::clone(self);
            let semaphore = Arc::clone(&semaphore);
            let options = options.clone();
            join_set.spawn(async move {
                // Closing the semaphore is not part of this flow; acquire
                // only fails on close.
                let _permit = semaphore.acquire_owned().await;
                let outcome = pipeline.run(&source, &options).await;
                (source, outcome)
            });
        }

        let mut reports = Vec::new();
        let mut failures = Vec::new();
        while let Some(joined) = join_set.join_next().await {
            match joined {
                Ok((_, Ok(report))) => reports.push(report),
                Ok((source, Err(error))) => failures.push((source, error)),
                Err(join_error) => failures.push((
                    String::from("<task>"),
                    ExtractError::internal(format!("batch task failed: {join_error}")),
                )),
            }
        }

        BatchReport { reports, failures }
    }

    pub fn stats(&self) -> PipelineStats {
        self.lock_stats().clone()
    }

    pub fn reset_stats(&self) {
        *self.lock_stats() = PipelineStats::default();
    }

    fn record_run(&self, extractor_id: &str, elapsed: f64, success: bool) {
        let mut stats = self.lock_stats();
        stats.runs += 1;
        if success {
            stats.successes += 1;
            *stats
                .per_extractor
                .entry(extractor_id.to_owned())
                .or_default() += 1;
        } else {
            stats.failures += 1;
        }
        stats.total_elapsed_ms += elapsed;
    }

    fn lock_stats(&self) -> std::sync::MutexGuard<'_, PipelineStats> {
        // Counter updates cannot panic mid-write, so a poisoned lock still
        // holds consistent data.
        match self.stats.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

fn elapsed_ms(start: Instant) -> f64 {
    start.elapsed().as_secs_f64() * 1000.0
}
