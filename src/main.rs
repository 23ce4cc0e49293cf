use clap::Parser;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use summarist::app::AppContext;
use summarist::cli::{commands, Cli, Commands};
use summarist::config::Config;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Logs go to stderr; a worker's stdout carries protocol frames
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let mut config = match cli.config {
        Some(ref path) => Config::load_from(path)?,
        None => Config::load()?,
    };
    if let Some(workers) = cli.workers {
        config.pool.workers = workers;
    }

    if let Commands::Worker { ref connect } = cli.command {
        commands::run_worker(&config, connect.as_deref()).await?;
        return Ok(());
    }

    let mut ctx = AppContext::new(config)?;
    ctx.config_path = cli.config.clone();

    match cli.command {
        Commands::Fetch { query } => {
            commands::fetch(&ctx, &query).await?;
        }
        Commands::Run { queries, remote } => {
            commands::run(&ctx, &queries, remote).await?;
        }
        Commands::Result { id } => {
            commands::show_result(&ctx, &id)?;
        }
        Commands::List => {
            commands::list_results(&ctx)?;
        }
        Commands::Worker { .. } => {}
    }

    Ok(())
}
