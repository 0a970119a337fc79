use clap::{Parser, Subcommand};
use scaflog_zoho_mcp::Result;
use scaflog_zoho_mcp::commands::{
    check_connection, list_forms, list_records, list_reports, serve_mcp,
};
use scaflog_zoho_mcp::config::{resolve_config_dir, run_interactive_config, show_config};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "scaflog-zoho-mcp-server")]
#[command(about = "MCP server exposing a Zoho Creator application to MCP clients")]
#[command(version)]
struct Cli {
    /// Directory holding config.toml (defaults to the platform config directory)
    #[arg(long, global = true)]
    config_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start MCP server on stdio (default)
    Serve,
    /// Configure Zoho credentials and environment
    Config {
        /// Show current configuration
        #[arg(long)]
        show: bool,
    },
    /// List forms and their fields
    Forms {
        /// Bypass the form cache
        #[arg(long)]
        refresh: bool,
    },
    /// List reports
    Reports,
    /// Print records of a form
    Records {
        /// Link name of the form
        form: String,
        /// Zoho criteria expression, e.g. 'Status == "Open"'
        #[arg(long)]
        criteria: Option<String>,
        /// Maximum number of records
        #[arg(long)]
        limit: Option<u32>,
    },
    /// Verify that the configured credentials can obtain an access token
    Check,
}

#[tokio::main]
async fn main() -> Result<()> {
    // stdout carries the MCP protocol, so logs go to stderr
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config_dir = resolve_config_dir(cli.config_dir)?;

    match cli.command.unwrap_or(Commands::Serve) {
        Commands::Serve => {
            serve_mcp(&config_dir).await?;
        }
        Commands::Config { show } => {
            if show {
                show_config(&config_dir)?;
            } else {
                run_interactive_config(&config_dir)?;
            }
        }
        Commands::Forms { refresh } => {
            list_forms(&config_dir, refresh)?;
        }
        Commands::Reports => {
            list_reports(&config_dir)?;
        }
        Commands::Records {
            form,
            criteria,
            limit,
        } => {
            list_records(&config_dir, &form, criteria.as_deref(), limit)?;
        }
        Commands::Check => {
            check_connection(&config_dir)?;
        }
    }

    Ok(())
}
