use finstat_core::Pipeline;
use serde_json::Value;

use crate::cli::SourceArgs;
use crate::error::CliError;

use super::to_pipeline_options;

pub async fn run(pipeline: &Pipeline, args: &SourceArgs, strict: bool) -> Result<Value, CliError> {
    let options = to_pipeline_options(args, strict);
    let report = pipeline.run(&args.source, &options).await?;

    if !report.validation.is_valid {
        return Err(CliError::DataInvalid {
            issue_count: report.validation.issues.len(),
            worst: report
                .validation
                .max_severity()
                .map(|severity| format!("{severity:?}").to_lowercase())
                .unwrap_or_else(|| String::from("none")),
        });
    }

    serde_json::to_value(&report.validation).map_err(CliError::from)
}
