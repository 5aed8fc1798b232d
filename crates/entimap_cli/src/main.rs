//! entimap CLI
//!
//! Renders the statements entimap would send for a schema described in JSON.
//!
//! # Commands
//!
//! - `entities` - List the entities of a schema with their tables and keys
//! - `render` - Print the SQL and parameters of one statement

mod commands;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// entimap statement inspection tools.
#[derive(Parser)]
#[command(name = "entimap")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to the schema file (a JSON array of entity descriptors)
    #[arg(global = true, short, long)]
    schema: Option<PathBuf>,

    /// SQL dialect (sqlserver, sqlite)
    #[arg(global = true, short, long, default_value = "sqlserver")]
    dialect: String,

    /// Enable verbose output
    #[arg(global = true, short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List entities with their tables and keys
    Entities {
        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Print the SQL and parameters of a statement
    Render {
        /// Statement kind (select, count, insert, update, delete)
        statement: String,

        /// Entity name
        entity: String,

        /// Query options (select, count) or entity values (insert, update,
        /// delete) as a JSON file
        #[arg(short, long)]
        input: Option<PathBuf>,

        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Show version information
    Version,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Entities { format } => {
            let path = cli.schema.ok_or("Schema path required for entities")?;
            commands::schema::run(&path, &format)?;
        }
        Commands::Render {
            statement,
            entity,
            input,
            format,
        } => {
            let path = cli.schema.ok_or("Schema path required for render")?;
            let dialect = commands::parse_dialect(&cli.dialect)?;
            commands::render::run(
                &path,
                dialect,
                &statement,
                &entity,
                input.as_deref(),
                &format,
            )?;
        }
        Commands::Version => {
            println!("entimap CLI v{}", env!("CARGO_PKG_VERSION"));
        }
    }

    Ok(())
}
