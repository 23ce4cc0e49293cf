pub mod commands;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "summarist")]
#[command(about = "Fetch market news and summarize it with a pool of workers", long_about = None)]
pub struct Cli {
    /// Config file (default: ~/.config/summarist/config.toml)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Number of local worker processes, overriding the config
    #[arg(short, long, global = true)]
    pub workers: Option<usize>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Fetch the top article for a query and print it as JSON
    Fetch {
        /// Search query, e.g. a company name or ticker
        query: String,
    },
    /// Fetch, summarize and print articles for one or more queries
    Run {
        #[arg(required = true)]
        queries: Vec<String>,

        /// Also accept remote workers on the configured listen address
        #[arg(long)]
        remote: bool,
    },
    /// Print the persisted summary for a job id
    Result {
        id: String,
    },
    /// List the ids of all persisted summaries
    List,
    /// Run as a worker (spawned by the pool, or detached with --connect)
    Worker {
        /// Dispatcher address to connect to instead of serving stdio
        #[arg(long)]
        connect: Option<String>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_run_with_globals() {
        let cli = Cli::try_parse_from([
            "summarist", "run", "Samsung", "Nvidia", "--remote", "--workers", "4",
        ])
        .unwrap();
        assert_eq!(cli.workers, Some(4));
        match cli.command {
            Commands::Run { queries, remote } => {
                assert_eq!(queries, vec!["Samsung", "Nvidia"]);
                assert!(remote);
            }
            _ => panic!("expected run"),
        }
    }

    #[test]
    fn test_run_requires_a_query() {
        assert!(Cli::try_parse_from(["summarist", "run"]).is_err());
    }

    #[test]
    fn test_parse_worker_connect() {
        let cli = Cli::try_parse_from(["summarist", "worker", "--connect", "10.0.0.5:6666"]).unwrap();
        match cli.command {
            Commands::Worker { connect } => assert_eq!(connect.as_deref(), Some("10.0.0.5:6666")),
            _ => panic!("expected worker"),
        }
    }
}
