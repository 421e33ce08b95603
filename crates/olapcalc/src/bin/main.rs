//! OLAP expression engine command-line interface

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use olapcalc::cli::execute::{self, ExecuteConfig};
use olapcalc::cli::{logger, output};
use std::path::PathBuf;

/// OLAP expression engine tool
#[derive(Parser)]
#[command(name = "olapcalc")]
#[command(author, version, about = "Compile and evaluate OLAP queries over an in-memory cube", long_about = None)]
struct Cli {
    /// Increase log verbosity (repeatable); OLAPCALC_LOG overrides
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Output format (json, table, pretty)
    #[arg(short = 'f', long, global = true)]
    format: Option<String>,

    /// Output file (default: stdout)
    #[arg(short, long, global = true)]
    output: Option<PathBuf>,

    /// Color output (auto, always, never)
    #[arg(long, default_value = "auto", global = true)]
    color: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct QueryArgs {
    /// Cube schema and facts (JSON)
    #[arg(short, long)]
    cube: PathBuf,

    /// Query (JSON)
    #[arg(short, long)]
    query: PathBuf,

    /// Engine configuration (JSON)
    #[arg(long)]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Execute a query and print the result grid
    Eval(QueryArgs),

    /// Print the compiled plan of a query
    Explain(QueryArgs),

    /// List the built-in functions
    Functions,
}

fn main() {
    human_panic::setup_panic!();

    let cli = Cli::parse();
    output::setup_colors(&cli.color);

    if let Err(e) = run(cli) {
        eprintln!("{}", output::format_error(&e));
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<()> {
    logger::init(cli.verbose)?;

    let format = cli.format.as_deref().map_or(output::OutputFormat::Table, output::OutputFormat::parse);
    let execute_config = |args: QueryArgs| ExecuteConfig {
        cube: args.cube,
        query: args.query,
        config: args.config,
        output_format: format,
        output_file: cli.output.clone(),
    };

    match cli.command {
        Commands::Eval(args) => execute::eval(&execute_config(args)),
        Commands::Explain(args) => execute::explain(&execute_config(args)),
        Commands::Functions => execute::functions(format, cli.output.as_deref()),
    }
}
