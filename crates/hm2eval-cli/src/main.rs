//! hm2eval CLI: grade model answers from the command line.

use std::path::PathBuf;
use std::process;

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(
    name = "hm2eval",
    version,
    about = "Answer equivalence evaluation for parametrized math problems"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Evaluate a single response against a reference solution
    Check {
        /// Model response text, or @path to read it from a file
        #[arg(long)]
        response: String,

        /// Reference solution
        #[arg(long)]
        solution: String,

        /// Parameter bindings (e.g. "m = 2, g = 9.81")
        #[arg(long, default_value = "")]
        parameters: String,

        /// Force the answer kind: numeric, symbolic, functional
        #[arg(long)]
        kind: Option<String>,

        /// Config file path
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// Batch-evaluate query results and save a report
    Evaluate {
        /// Query-results file or directory (default: models selected in config)
        #[arg(long)]
        input: Option<PathBuf>,

        /// Directory for the timestamped report (default: eval_results_dir)
        #[arg(long)]
        output: Option<PathBuf>,

        /// Config file path
        #[arg(long)]
        config: Option<PathBuf>,

        /// Max concurrent evaluations
        #[arg(long)]
        parallelism: Option<usize>,
    },

    /// Print statistics for a saved report
    Summarize {
        /// Report directory, or "latest" under eval_results_dir
        #[arg(long, default_value = "latest")]
        report: String,

        /// Output format: text, json
        #[arg(long, default_value = "text")]
        format: String,

        /// Config file path
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// Create a starter hm2eval.toml
    Init,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("hm2eval=info".parse().unwrap()),
        )
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Check {
            response,
            solution,
            parameters,
            kind,
            config,
        } => commands::check::execute(response, solution, parameters, kind, config),
        Commands::Evaluate {
            input,
            output,
            config,
            parallelism,
        } => commands::evaluate::execute(input, output, config, parallelism).await,
        Commands::Summarize {
            report,
            format,
            config,
        } => commands::summarize::execute(report, format, config),
        Commands::Init => commands::init::execute(),
    };

    if let Err(e) = result {
        eprintln!("Error: {e:#}");
        process::exit(1);
    }
}
