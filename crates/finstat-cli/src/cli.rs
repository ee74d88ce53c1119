use clap::{Args, Parser, Subcommand, ValueEnum};

#[derive(Debug, Parser)]
#[command(name = "finstat", version, about = "Financial statement extraction pipeline")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Output format.
    #[arg(long, global = true, value_enum, default_value = "json")]
    pub format: OutputFormat,

    /// Pretty-print JSON output.
    #[arg(long, global = true)]
    pub pretty: bool,

    /// Fail on any validation issue, not just errors.
    #[arg(long, global = true)]
    pub strict: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run the full pipeline for one source and print the report.
    Extract(SourceArgs),
    /// Run the pipeline and print only the validation result. Exits
    /// non-zero when the data is invalid.
    Validate(SourceArgs),
    /// Run the pipeline for several sources concurrently.
    Batch(BatchArgs),
    /// Show the configured web-API providers and their status.
    Providers,
}

#[derive(Debug, Args)]
pub struct SourceArgs {
    /// Spreadsheet path (.xlsx/.xlsm/.xls/.csv) or ticker symbol.
    pub source: String,

    /// Limit extraction to the most recent N fiscal years.
    #[arg(long)]
    pub years: Option<usize>,

    /// Free-text scale hint, e.g. "figures in thousands".
    #[arg(long)]
    pub context: Option<String>,

    /// Skip the provider response cache.
    #[arg(long)]
    pub no_cache: bool,
}

#[derive(Debug, Args)]
pub struct BatchArgs {
    /// Sources to process, spreadsheet paths or tickers.
    #[arg(required = true)]
    pub sources: Vec<String>,

    /// Maximum sources processed in parallel.
    #[arg(long, default_value_t = 5)]
    pub concurrency: usize,

    /// Limit extraction to the most recent N fiscal years.
    #[arg(long)]
    pub years: Option<usize>,

    /// Free-text scale hint applied to every source.
    #[arg(long)]
    pub context: Option<String>,

    /// Skip the provider response cache.
    #[arg(long)]
    pub no_cache: bool,
}
