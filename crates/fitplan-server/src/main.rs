mod config;
mod generate_cmd;
mod plans_cmds;
mod serve_cmd;
mod services;
#[cfg(test)]
mod test_util;

use std::sync::Arc;

use clap::{Parser, Subcommand};

use fitplan_db::pool;

use config::FitplanConfig;
use generate_cmd::GenerateArgs;
use serve_cmd::AppState;

#[derive(Parser)]
#[command(name = "fitplan", about = "AI fitness plan generator")]
struct Cli {
    /// Database URL (overrides FITPLAN_DATABASE_URL env var)
    #[arg(long, global = true)]
    database_url: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Write a fitplan config file (no database required)
    Init {
        /// PostgreSQL connection URL
        #[arg(long, default_value = "postgresql://localhost:5432/fitplan")]
        db_url: String,
        /// Gemini API key to store in the config file
        #[arg(long)]
        api_key: Option<String>,
        /// Overwrite existing config file
        #[arg(long)]
        force: bool,
    },
    /// Create and migrate the fitplan database
    DbInit,
    /// Run the HTTP API
    Serve {
        /// Address to bind
        #[arg(long, default_value = "127.0.0.1")]
        bind: String,
        /// Port to listen on
        #[arg(long, default_value_t = 3000)]
        port: u16,
    },
    /// Generate a plan and print it
    Generate(GenerateArgs),
    /// Saved plan management
    Plans {
        #[command(subcommand)]
        command: PlansCommands,
    },
}

#[derive(Subcommand)]
pub enum PlansCommands {
    /// List saved plans, newest first
    List {
        /// User whose plans to list
        #[arg(long, default_value = "anonymous")]
        user: String,
    },
    /// Delete a saved plan
    Delete {
        /// Saved plan ID
        id: String,
        #[arg(long, default_value = "anonymous")]
        user: String,
    },
    /// Export a saved plan as JSON
    Export {
        /// Saved plan ID
        id: String,
        #[arg(long, default_value = "anonymous")]
        user: String,
        /// Write to this file instead of stdout
        #[arg(long)]
        output: Option<String>,
    },
}

/// Execute the `fitplan init` command: write config file.
fn cmd_init(db_url: &str, api_key: Option<String>, force: bool) -> anyhow::Result<()> {
    let path = config::config_path();

    if path.exists() && !force {
        anyhow::bail!(
            "config file already exists at {}\nUse --force to overwrite.",
            path.display()
        );
    }

    let has_key = api_key.is_some();
    let cfg = config::ConfigFile {
        database: config::DatabaseSection {
            url: db_url.to_string(),
        },
        gemini: config::GeminiSection {
            api_key,
            ..Default::default()
        },
        server: config::ServerSection::default(),
    };
    config::save_config(&cfg)?;

    println!("Config written to {}", path.display());
    println!("  database.url = {db_url}");
    if has_key {
        println!("  gemini.api_key = (set)");
    } else {
        println!("  gemini.api_key not set; export GEMINI_API_KEY to enable plan generation");
    }
    println!();
    println!("Next: run `fitplan db-init` to create and migrate the database.");

    Ok(())
}

/// Execute the `fitplan db-init` command: create database and run migrations.
async fn cmd_db_init(cli_db_url: Option<&str>) -> anyhow::Result<()> {
    let resolved = FitplanConfig::resolve(cli_db_url)?;

    println!("Initializing fitplan database...");
    if pool::ensure_database(&resolved.db_config).await? {
        println!("Created database.");
    }

    let db_pool = pool::create_pool(&resolved.db_config).await?;
    pool::run_migrations(&db_pool).await?;

    let status = pool::schema_status(&db_pool).await?;
    match &status.applied {
        Some((version, description)) => println!("Schema at {version} ({description})."),
        None => println!("Schema has no applied migrations."),
    }
    println!("Saved plans: {}", status.saved_plans);

    db_pool.close().await;
    println!("fitplan db-init complete.");
    Ok(())
}

async fn cmd_serve(cli_db_url: Option<&str>, bind: &str, port: u16) -> anyhow::Result<()> {
    let resolved = FitplanConfig::resolve(cli_db_url)?;
    let http = services::http_client()?;

    let state = AppState {
        orchestrator: services::orchestrator(&resolved, &http),
        images: Arc::new(services::image_generator(&resolved, &http)),
        search: Arc::new(services::image_search(&http)),
        store: services::plan_store(&resolved)?,
        app_id: resolved.app_id.clone(),
    };
    serve_cmd::run_serve(state, bind, port).await
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Init {
            db_url,
            api_key,
            force,
        } => {
            cmd_init(&db_url, api_key, force)?;
        }
        Commands::DbInit => {
            cmd_db_init(cli.database_url.as_deref()).await?;
        }
        Commands::Serve { bind, port } => {
            cmd_serve(cli.database_url.as_deref(), &bind, port).await?;
        }
        Commands::Generate(args) => {
            let resolved = FitplanConfig::resolve(cli.database_url.as_deref())?;
            generate_cmd::run_generate(&resolved, &args).await?;
        }
        Commands::Plans { command } => {
            let resolved = FitplanConfig::resolve(cli.database_url.as_deref())?;
            let store = services::plan_store(&resolved)?;
            plans_cmds::run_plans_command(command, store, &resolved.app_id).await?;
        }
    }

    Ok(())
}
