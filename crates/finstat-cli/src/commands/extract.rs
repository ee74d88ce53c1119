use finstat_core::Pipeline;
use serde_json::Value;

use crate::cli::SourceArgs;
use crate::error::CliError;

use super::to_pipeline_options;

pub async fn run(pipeline: &Pipeline, args: &SourceArgs, strict: bool) -> Result<Value, CliError> {
    let options = to_pipeline_options(args, strict);
    let report = pipeline.run(&args.source, &options).await?;
    serde_json::to_value(&report).map_err(CliError::from)
}
