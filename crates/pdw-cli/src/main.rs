use anyhow::Result;
use clap::{Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(name = "pdw")]
#[command(about = "Phone Deal Watch command-line interface")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Scrape the catalog once, report deal changes, rewrite the snapshot.
    Run,
    /// Apply snapshot store migrations.
    Migrate,
    /// Run on the configured cron schedule until interrupted.
    Watch,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command.unwrap_or(Commands::Run) {
        Commands::Run => {
            let summary = pdw_sync::run_once_from_env().await?;
            println!(
                "run complete: run_id={} products={} failed={} variants={} rows={} notified={}",
                summary.run_id,
                summary.products_seen,
                summary.products_failed,
                summary.variants,
                summary.rows_emitted,
                summary.notified
            );
        }
        Commands::Migrate => {
            pdw_sync::migrate_from_env().await?;
            println!("migrations applied");
        }
        Commands::Watch => {
            pdw_sync::run_scheduled_from_env().await?;
        }
    }

    Ok(())
}
