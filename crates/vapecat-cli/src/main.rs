mod preview;
mod reconcile;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use crate::preview::PreviewArgs;
use crate::reconcile::ReconcileArgs;

#[derive(Debug, Parser)]
#[command(name = "vapecat-cli")]
#[command(about = "Reconcile scraped vape listings into the product catalog")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Group scraped listings and write products, prices and price history
    Reconcile(ReconcileArgs),
    /// Print the groups a run would produce without writing anything
    Preview(PreviewArgs),
    /// Apply pending database migrations
    Migrate,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let Some(command) = cli.command else {
        println!("vapecat-cli: no command given; see --help");
        return Ok(());
    };

    let config = vapecat_core::load_app_config()?;
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(config.log_level.clone()))?;
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    tracing::debug!(?config, "configuration loaded");

    match command {
        Commands::Reconcile(args) => reconcile::run_reconcile(&config, &args).await,
        Commands::Preview(args) => preview::run_preview(&config, &args).await,
        Commands::Migrate => run_migrate(&config).await,
    }
}

async fn connect(config: &vapecat_core::AppConfig) -> anyhow::Result<sqlx::PgPool> {
    let pool_config = vapecat_db::PoolConfig::from_app_config(config);
    let pool = vapecat_db::connect_pool(&config.database_url, pool_config).await?;
    Ok(pool)
}

async fn run_migrate(config: &vapecat_core::AppConfig) -> anyhow::Result<()> {
    let pool = connect(config).await?;
    let applied = vapecat_db::run_migrations(&pool).await?;
    println!("applied {applied} migration(s)");
    Ok(())
}

#[cfg(test)]
mod tests;
