//! CLI command definitions for wiki-graph.
//!
//! The main entry point is the `Cli` struct which contains subcommands.

pub mod client;

use clap::{Parser, Subcommand};

/// Shortest link paths between wiki pages
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, global = true)]
    pub config: Option<String>,

    /// Path to database file (overrides config)
    #[arg(short, long, global = true)]
    pub database: Option<String>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Logging output: 0/off, 1/stdout, 2/stderr (default), or filename
    #[arg(short, long, default_value = "2", global = true)]
    pub log: String,

    #[command(subcommand)]
    pub command: Command,
}

/// Available subcommands
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run the HTTP request server
    Serve {
        /// Listen address (overrides config)
        #[arg(long)]
        addr: Option<String>,
    },

    /// Consume queued tasks and compute their paths
    Worker,

    /// Request the shortest path between two pages
    Find {
        /// Start page title
        from: String,

        /// Target page title
        to: String,

        /// Poll until the task is done and print the path
        #[arg(short, long)]
        wait: bool,

        /// Server URL (overrides config)
        #[arg(long)]
        server: Option<String>,
    },

    /// Show the state of a task
    Status {
        /// Task id returned by `find`
        id: String,

        /// Server URL (overrides config)
        #[arg(long)]
        server: Option<String>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_find_with_wait() {
        let cli = Cli::parse_from(["wiki-graph", "find", "Rust", "Mozilla", "--wait"]);
        match cli.command {
            Command::Find { from, to, wait, .. } => {
                assert_eq!(from, "Rust");
                assert_eq!(to, "Mozilla");
                assert!(wait);
            }
            other => panic!("unexpected command {:?}", other),
        }
        assert_eq!(cli.log, "2");
    }

    #[test]
    fn global_flags_follow_subcommand() {
        let cli = Cli::parse_from(["wiki-graph", "worker", "--database", "x.db", "-v"]);
        assert!(matches!(cli.command, Command::Worker));
        assert_eq!(cli.database.as_deref(), Some("x.db"));
        assert!(cli.verbose);
    }
}
