use std::sync::Arc;

use finstat_core::{Pipeline, PipelineOptions};
use serde_json::{json, Value};

use crate::cli::BatchArgs;
use crate::error::CliError;

pub async fn run(pipeline: Pipeline, args: &BatchArgs, strict: bool) -> Result<Value, CliError> {
    let options = PipelineOptions {
        context: args.context.clone(),
        strict_validation: strict,
        use_cache: !args.no_cache,
        years: args.years,
    };

    let pipeline = Arc::new(pipeline);
    let batch = pipeline
        .run_batch(args.sources.clone(), &options, Some(args.concurrency))
        .await;

    if batch.reports.is_empty() && !batch.failures.is_empty() {
        let summary: Vec<String> = batch
            .failures
            .iter()
            .map(|(source, error)| format!("{source}: {error}"))
            .collect();
        return Err(CliError::Command(format!(
            "every source failed: {}",
            summary.join("; ")
        )));
    }

    let failures: Vec<Value> = batch
        .failures
        .iter()
        .map(|(source, error)| {
            json!({
                "source": source,
                "code": error.code(),
                "message": error.message(),
            })
        })
        .collect();

    Ok(json!({
        "reports": batch.reports,
        "failures": failures,
        "stats": pipeline.stats(),
    }))
}
