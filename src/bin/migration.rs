use anyhow::Context;
use clap::{Parser, Subcommand};
use migrations::Migrator;
use sea_orm_migration::MigratorTrait;
use tracing::info;

use coursepay_api::db::{establish_connection_with_config, DbConfig};

#[derive(Parser)]
#[command(name = "migration", about = "Apply or roll back the CoursePay schema", version)]
struct Cli {
    #[arg(
        long,
        env = "DATABASE_URL",
        default_value = "sqlite://coursepay.db?mode=rwc",
        help = "Database connection URL"
    )]
    database_url: String,
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Apply pending migrations (default)
    Up {
        #[arg(long, help = "Apply at most this many migrations")]
        steps: Option<u32>,
    },
    /// Roll back applied migrations
    Down {
        #[arg(long, default_value_t = 1, help = "Number of migrations to roll back")]
        steps: u32,
    },
    /// Print applied and pending migrations
    Status,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .init();

    let cli = Cli::parse();

    let db = establish_connection_with_config(&DbConfig {
        url: cli.database_url.clone(),
        max_connections: 2,
        min_connections: 1,
        ..Default::default()
    })
    .await
    .context("failed to connect to the database")?;

    match cli.command.unwrap_or(Commands::Up { steps: None }) {
        Commands::Up { steps } => {
            info!("Applying migrations");
            Migrator::up(&db, steps).await?;
            info!("Migration completed successfully");
        }
        Commands::Down { steps } => {
            info!("Rolling back {} migration(s)", steps);
            Migrator::down(&db, Some(steps)).await?;
            info!("Rollback completed successfully");
        }
        Commands::Status => {
            Migrator::status(&db).await?;
        }
    }

    Ok(())
}
