use anyhow::{Context, Result};
use console::style;
use std::path::Path;
use std::sync::Arc;
use tracing::{error, info};

use crate::config::Config;
use crate::mcp::{McpServer, ZohoResources, register_zoho_tools};
use crate::zoho::ZohoCreatorService;
use crate::{SERVER_NAME, SERVER_VERSION};

const SERVER_INSTRUCTIONS: &str = "Tools and resources for a Zoho Creator application. \
Call list-forms to discover form link names and fields before reading or writing records.";

fn load_service(config_dir: &Path) -> Result<(Config, ZohoCreatorService)> {
    let config = Config::load(config_dir).context("Failed to load configuration")?;
    let service = ZohoCreatorService::new(&config).context("Failed to create Zoho client")?;
    Ok((config, service))
}

/// Build an MCP server with every Zoho tool and the resource provider registered
#[inline]
pub async fn build_server(service: Arc<ZohoCreatorService>) -> Arc<McpServer> {
    let server = McpServer::new(SERVER_NAME.to_string(), SERVER_VERSION.to_string())
        .with_instructions(SERVER_INSTRUCTIONS);

    register_zoho_tools(&server, &service).await;
    server
        .set_resource_provider(ZohoResources::new(service))
        .await;

    Arc::new(server)
}

/// Run the MCP server on stdio until the client disconnects or Ctrl+C
#[inline]
pub async fn serve_mcp(config_dir: &Path) -> Result<()> {
    let (config, service) = load_service(config_dir)?;
    info!(
        "Starting {} {} for {} environment",
        SERVER_NAME, SERVER_VERSION, config.zoho.environment
    );

    let server = build_server(Arc::new(service)).await;
    info!(
        "MCP server initialized with tools: {}",
        server.tool_names().await.join(", ")
    );

    tokio::select! {
        result = Arc::clone(&server).serve_stdio() => {
            if let Err(e) = &result {
                error!("MCP server error: {:#}", e);
            }
            result?;
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Received interrupt signal, shutting down");
        }
    }

    info!("Shutdown complete");
    Ok(())
}

/// Print all forms with their fields
#[inline]
pub fn list_forms(config_dir: &Path, force_refresh: bool) -> Result<()> {
    let (_, service) = load_service(config_dir)?;
    let forms = service
        .list_forms(force_refresh)
        .context("Failed to list forms")?;

    if forms.is_empty() {
        println!("No forms found in this application.");
        return Ok(());
    }

    println!("Forms ({} total):", forms.len());
    println!();

    for form in &forms {
        println!(
            "📋 {} ({})",
            style(&form.display_name).bold(),
            style(&form.link_name).cyan()
        );
        println!("   Access: {}", form.access_type);
        for field in &form.fields {
            let required = if field.required { " *" } else { "" };
            println!(
                "   - {} [{}]{}",
                field.api_name, field.field_type, required
            );
        }
        println!();
    }

    Ok(())
}

#[inline]
pub fn list_reports(config_dir: &Path) -> Result<()> {
    let (_, service) = load_service(config_dir)?;
    let reports = service.list_reports().context("Failed to list reports")?;

    if reports.is_empty() {
        println!("No reports found in this application.");
        return Ok(());
    }

    println!("Reports ({} total):", reports.len());
    for report in &reports {
        match &report.form_link_name {
            Some(form) => println!(
                "  📊 {} ({}) on form {}",
                style(&report.display_name).bold(),
                style(&report.link_name).cyan(),
                form
            ),
            None => println!(
                "  📊 {} ({})",
                style(&report.display_name).bold(),
                style(&report.link_name).cyan()
            ),
        }
    }

    Ok(())
}

/// Print records of a form as pretty JSON
#[inline]
pub fn list_records(
    config_dir: &Path,
    form_name: &str,
    criteria: Option<&str>,
    limit: Option<u32>,
) -> Result<()> {
    let (_, service) = load_service(config_dir)?;
    let records = service
        .get_records(form_name, criteria, limit)
        .with_context(|| format!("Failed to get records from {}", form_name))?;

    println!(
        "{} record(s) from {}",
        records.len(),
        style(form_name).cyan()
    );
    println!("{}", serde_json::to_string_pretty(&records)?);

    Ok(())
}

/// Refresh an access token to prove the credentials work
#[inline]
pub fn check_connection(config_dir: &Path) -> Result<()> {
    let (config, service) = load_service(config_dir)?;

    match service.check_connection() {
        Ok(()) => {
            println!(
                "{} Authenticated with Zoho ({})",
                style("✓").green(),
                config.zoho.environment
            );
            Ok(())
        }
        Err(e) => {
            println!("{} Authentication failed: {}", style("✗").red(), e);
            println!("Use '{} config' to update credentials.", SERVER_NAME);
            Err(e.into())
        }
    }
}
