//! Metadata tooling for the test selection pass.
//!
//! Provides the `ekstazi` binary with subcommands over the `.ekstazi/`
//! metadata directory: the driver-facing filter string, dependency
//! queries for one function, and summary statistics. The analysis pass
//! itself runs inside the host compiler; these commands only read what
//! it persisted.

use std::collections::BTreeSet;
use std::path::PathBuf;
use std::process;

use clap::{Parser, Subcommand};

use ekstazi_analysis::metadir::METADATA_DIRNAME;
use ekstazi_analysis::{module_stats, DepgraphQuery, MetaDir};

/// Regression test selection metadata tools.
#[derive(Parser)]
#[command(name = "ekstazi", about = "Regression test selection metadata tools")]
struct Cli {
    /// Metadata directory.
    #[arg(long, default_value = METADATA_DIRNAME, global = true)]
    metadata_dir: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

/// Available subcommands.
#[derive(Subcommand)]
enum Commands {
    /// Print the runner filter string for a module's last analysis.
    Filter {
        /// Module name the metadata files are keyed by.
        #[arg(short, long)]
        module: String,
    },
    /// Show the dependents and dependencies of one function.
    Query {
        /// Module name the metadata files are keyed by.
        #[arg(short, long)]
        module: String,

        /// Demangled function name to query.
        #[arg(short, long)]
        function: String,
    },
    /// Print summary statistics for a module's metadata as JSON.
    Stats {
        /// Module name the metadata files are keyed by.
        #[arg(short, long)]
        module: String,
    },
}

fn main() {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let metadata_dir = cli.metadata_dir;

    let exit_code = match cli.command {
        Commands::Filter { module } => run_filter(&MetaDir::new(metadata_dir, &module)),
        Commands::Query { module, function } => {
            run_query(&MetaDir::new(metadata_dir, &module), &function)
        }
        Commands::Stats { module } => run_stats(&MetaDir::new(metadata_dir, &module)),
    };
    process::exit(exit_code);
}

/// Print the filter the test driver should pass to the runner.
fn run_filter(metadir: &MetaDir) -> i32 {
    match metadir.driver_filter() {
        Ok(filter) => {
            println!("{filter}");
            0
        }
        Err(e) => {
            eprintln!("Error: {e}");
            1
        }
    }
}

/// Print the transitive dependents and dependencies of a function.
fn run_query(metadir: &MetaDir, function: &str) -> i32 {
    let query = match DepgraphQuery::load(metadir) {
        Ok(query) => query,
        Err(e) => {
            eprintln!("Error: failed to load dependency graphs: {e}");
            return 1;
        }
    };

    // Sort for stable output.
    let dependents: BTreeSet<String> = query.dependents(function).into_iter().collect();
    let dependencies: BTreeSet<String> = query.dependencies(function).into_iter().collect();

    println!("Dependents:");
    for name in dependents {
        println!("{name}");
    }
    println!("Dependencies:");
    for name in dependencies {
        println!("{name}");
    }
    0
}

/// Print module statistics as machine-readable JSON.
fn run_stats(metadir: &MetaDir) -> i32 {
    match module_stats(metadir) {
        Ok(stats) => {
            let json = serde_json::to_string_pretty(&stats)
                .unwrap_or_else(|e| format!("{{\"error\": \"failed to serialize stats: {e}\"}}"));
            println!("{json}");
            0
        }
        Err(e) => {
            eprintln!("Error: {e}");
            1
        }
    }
}
