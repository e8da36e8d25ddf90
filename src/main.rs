use anyhow::Context;
use clap::{Parser, Subcommand};
use comfy_table::Table;
use configuration::{AppConfig, AppEnvironment, LoggingSettings};
use database::design_time::create_context_in;
use database::migrations::{self, MigrationStatus};
use database::{build_model, verify_schema, ContextOptions, DbContext};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// The main entry point for the schema tooling.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from the .env file, if there is one.
    let _ = dotenvy::dotenv();

    // Parse command-line arguments
    let cli = Cli::parse();

    let environment = AppEnvironment::resolve();
    let base_dir = match cli.config_dir {
        Some(dir) => dir,
        None => configuration::executable_dir()?,
    };
    let config = configuration::load_config_from(&base_dir, environment.clone())
        .with_context(|| format!("Failed to load settings from {}", base_dir.display()))?;

    // The loader announced the environment before any subscriber existed.
    init_tracing(&config.settings.logging);
    tracing::info!(environment = %config.environment, files = config.sources.len(), "{}", config.environment.banner());

    // Execute the appropriate command
    match cli.command {
        Commands::Env => handle_env(&config),
        Commands::Migrate => {
            let ctx = create_context_in(&base_dir, environment).await?;
            let applied = migrations::apply(ctx.pool()).await;
            finish(&ctx, applied.map(|applied| report("Applied", &applied))).await
        }
        Commands::Rollback(args) => {
            let ctx = create_context_in(&base_dir, environment).await?;
            let reverted = migrations::revert(ctx.pool(), args.to).await;
            finish(&ctx, reverted.map(|reverted| report("Reverted", &reverted))).await
        }
        Commands::Migrations => {
            let ctx = create_context_in(&base_dir, environment).await?;
            let statuses = migrations::status(ctx.pool()).await;
            finish(&ctx, statuses.map(|statuses| println!("{}", migrations_table(&statuses)))).await
        }
        Commands::Verify => {
            let ctx = create_context_in(&base_dir, environment).await?;
            let model = build_model()?;
            let drift = verify_schema(ctx.pool(), &model).await;
            ctx.close().await;
            let drift = drift.map_err(|e| anyhow::anyhow!(ctx.describe_error(&e)))?;
            if drift.is_empty() {
                println!("Schema matches the model ({} tables).", model.entities.len());
                return Ok(());
            }
            for d in &drift {
                println!("- {d}");
            }
            anyhow::bail!("{} difference(s) between the database and the model", drift.len())
        }
    }
}

// ==============================================================================
// CLI Structure
// ==============================================================================

/// Configures the PostgreSQL context and manages its schema migrations.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Directory holding appsettings.json (defaults to the executable's directory).
    #[arg(long, global = true)]
    config_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Show the resolved environment, settings files and connection options.
    Env,
    /// Apply all pending migrations.
    Migrate,
    /// Revert applied migrations.
    Rollback(RollbackArgs),
    /// List migrations and whether they are applied.
    Migrations,
    /// Compare the live schema with the declared model.
    Verify,
}

#[derive(Parser, Debug)]
struct RollbackArgs {
    /// Version to revert to; 0 reverts everything. Defaults to undoing the latest migration.
    #[arg(long)]
    to: Option<i64>,
}

// ==============================================================================
// Command Logic
// ==============================================================================

fn init_tracing(logging: &LoggingSettings) {
    let fallback = logging.filter_directive().unwrap_or("info");
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback));
    tracing_subscriber::fmt().with_env_filter(filter).with_target(false).init();
}

/// Closes the context, then surfaces the command's outcome.
async fn finish(ctx: &DbContext, outcome: Result<(), database::DbError>) -> anyhow::Result<()> {
    ctx.close().await;
    outcome.map_err(|e| anyhow::anyhow!(ctx.describe_error(&e)))
}

fn handle_env(config: &AppConfig) -> anyhow::Result<()> {
    let options = ContextOptions::from_config(config)?;

    let mut table = Table::new();
    table.set_header(vec!["Setting", "Value"]);
    table.add_row(vec!["Environment".to_string(), config.environment.to_string()]);
    table.add_row(vec!["Base directory".to_string(), config.base_dir.display().to_string()]);
    for source in &config.sources {
        table.add_row(vec!["Settings file".to_string(), source.display().to_string()]);
    }
    table.add_row(vec!["Connection string".to_string(), options.masked_connection_string()]);
    table.add_row(vec!["Command timeout".to_string(), format!("{}s", options.command_timeout.as_secs())]);
    table.add_row(vec!["Max retry count".to_string(), options.max_retry_count.to_string()]);
    table.add_row(vec!["PostgreSQL version".to_string(), options.postgres_version.to_string()]);
    table.add_row(vec!["Detailed errors".to_string(), options.detailed_errors.to_string()]);
    table.add_row(vec!["Sensitive data logging".to_string(), options.sensitive_data_logging.to_string()]);

    println!("{table}");
    Ok(())
}

fn report(verb: &str, migrations: &[MigrationStatus]) {
    if migrations.is_empty() {
        println!("No migrations to process.");
    }
    for migration in migrations {
        println!("{verb} {}", migration.name());
    }
}

fn migrations_table(statuses: &[MigrationStatus]) -> Table {
    let mut table = Table::new();
    table.set_header(vec!["Version", "Name", "Status", "Applied On"]);
    for status in statuses {
        let (state, applied_on) = match status.applied_on {
            Some(at) => ("Applied", at.format("%Y-%m-%d %H:%M:%S UTC").to_string()),
            None => ("Pending", "-".to_string()),
        };
        table.add_row(vec![
            status.version.to_string(),
            status.description.clone(),
            state.to_string(),
            applied_on,
        ]);
    }
    table
}
