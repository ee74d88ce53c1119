mod batch;
mod extract;
mod providers;
mod validate;

use finstat_core::{Pipeline, PipelineOptions};
use serde_json::Value;

use crate::cli::{Cli, Command, SourceArgs};
use crate::error::CliError;

pub async fn run(cli: &Cli) -> Result<Value, CliError> {
    let pipeline = Pipeline::default();

    match &cli.command {
        Command::Extract(args) => extract::run(&pipeline, args, cli.strict).await,
        Command::Validate(args) => validate::run(&pipeline, args, cli.strict).await,
        Command::Batch(args) => batch::run(pipeline, args, cli.strict).await,
        Command::Providers => providers::run(),
    }
}

fn to_pipeline_options(args: &SourceArgs, strict: bool) -> PipelineOptions {
    PipelineOptions {
        context: args.context.clone(),
        strict_validation: strict,
        use_cache: !args.no_cache,
        years: args.years,
    }
}
