//! Dossier CLI - Command-line interface for Dossier
//!
//! Ingests text dossiers into an entity repository, runs linking and
//! graph queries over it, and keeps state between invocations in a
//! snapshot document.

use clap::{Parser, Subcommand};
use colored::Colorize;
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod commands;

#[derive(Parser)]
#[command(name = "dossier")]
#[command(author = "Dossier Contributors")]
#[command(version)]
#[command(about = "Entity resolution and relation graphs over text dossiers", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Snapshot document holding the repository between runs
    #[arg(long, global = true, default_value = "dossier.json")]
    data: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Ingest every .txt dossier in a folder
    Ingest {
        /// Folder with dossier text files
        folder: PathBuf,
    },

    /// Run the pairwise relation-detection heuristic
    Detect,

    /// Find the shortest path between two people
    Path {
        /// First person's name
        from: String,
        /// Second person's name
        to: String,
    },

    /// Show the local neighborhood between two people
    Neighborhood {
        from: String,
        to: String,

        /// Maximum path length in hops
        #[arg(long, default_value = "3")]
        max_hops: usize,
    },

    /// Cluster people into groups and list bridge entities
    Cluster,

    /// Show repository statistics
    Stats,

    /// List all people in the repository
    List,

    /// Merge people into the richest of them
    Merge {
        /// Names of the people to merge (at least two)
        #[arg(num_args = 2..)]
        names: Vec<String>,
    },

    /// Add a relation between two people
    Link {
        from: String,
        to: String,
        /// Relation kind, e.g. "муж" or "коллега"
        kind: String,
    },

    /// Remove a relation between two people
    Unlink {
        from: String,
        to: String,
        kind: String,
    },

    /// Delete a person and every relation pointing at them
    Delete { name: String },

    /// Print the analysis summary text for a person
    Summary { name: String },

    /// Export nodes, edges and cluster labels for rendering
    Export {
        /// Output file
        #[arg(short, long, default_value = "dossier-graph.json")]
        output: PathBuf,

        /// Layout strategy: "circular" or "force"
        #[arg(long, default_value = "circular")]
        layout: String,
    },
}

fn main() {
    let cli = Cli::parse();

    // Set up logging
    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false),
        )
        .with(tracing_subscriber::EnvFilter::new(filter))
        .init();

    let data = cli.data;
    let result = match cli.command {
        Commands::Ingest { folder } => commands::ingest(&folder, &data),
        Commands::Detect => commands::detect(&data),
        Commands::Path { from, to } => commands::path(&from, &to, &data),
        Commands::Neighborhood { from, to, max_hops } => {
            commands::neighborhood(&from, &to, max_hops, &data)
        }
        Commands::Cluster => commands::cluster(&data),
        Commands::Stats => commands::stats(&data),
        Commands::List => commands::list(&data),
        Commands::Merge { names } => commands::merge(&names, &data),
        Commands::Link { from, to, kind } => commands::link(&from, &to, &kind, &data),
        Commands::Unlink { from, to, kind } => commands::unlink(&from, &to, &kind, &data),
        Commands::Delete { name } => commands::delete(&name, &data),
        Commands::Summary { name } => commands::summary(&name, &data),
        Commands::Export { output, layout } => commands::export(&output, &layout, &data),
    };

    if let Err(e) = result {
        eprintln!("{} {}", "error:".red().bold(), e);
        std::process::exit(1);
    }
}
