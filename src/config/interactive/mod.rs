
use anyhow::{Context, Result};
use console::style;
use dialoguer::{Confirm, Input, Password, Select};
use std::path::Path;

use super::{Config, Environment, ZohoConfig};
use crate::zoho::ZohoCreatorService;

#[inline]
pub fn run_interactive_config(config_dir: &Path) -> Result<()> {
    eprintln!("{}", style("🔧 Zoho Creator MCP Configuration Setup").bold().cyan());
    eprintln!();

    let mut config = load_existing_config(config_dir);

    eprintln!("{}", style("Zoho OAuth Credentials").bold().yellow());
    eprintln!("Create a self client at https://api-console.zoho.com to obtain these values.");
    eprintln!();

    configure_zoho(&mut config.zoho)?;

    eprintln!();
    eprintln!("{}", style("Testing configuration...").yellow());

    match test_zoho_connection(&config) {
        Ok(()) => eprintln!("{}", style("✓ Zoho authentication successful!").green()),
        Err(e) => {
            eprintln!(
                "{}",
                style("⚠ Warning: Could not authenticate with Zoho").yellow()
            );
            eprintln!("  {:#}", e);
            eprintln!("You can continue, but the server will fail until the credentials work.");
        }
    }

    eprintln!();
    if Confirm::new()
        .with_prompt("Save configuration?")
        .default(true)
        .interact()?
    {
        config.save().context("Failed to save configuration")?;
        eprintln!("{}", style("✓ Configuration saved successfully!").green());
        eprintln!(
            "Configuration saved to: {}",
            style(config.config_file_path().display()).cyan()
        );
    } else {
        eprintln!("Configuration not saved.");
    }

    Ok(())
}

#[inline]
pub fn show_config(config_dir: &Path) -> Result<()> {
    let config = Config::load(config_dir).context("Failed to load configuration")?;

    eprintln!("{}", style("📋 Current Configuration").bold().cyan());
    eprintln!();

    eprintln!("{}", style("Zoho Settings:").bold().yellow());
    eprintln!("  Client ID: {}", style(mask_secret(&config.zoho.client_id)).cyan());
    eprintln!(
        "  Client Secret: {}",
        style(mask_secret(&config.zoho.client_secret)).cyan()
    );
    eprintln!(
        "  Refresh Token: {}",
        style(mask_secret(&config.zoho.refresh_token)).cyan()
    );
    eprintln!(
        "  Organization ID: {}",
        style(&config.zoho.organization_id).cyan()
    );
    eprintln!("  Environment: {}", style(config.zoho.environment).cyan());
    eprintln!("  Accounts URL: {}", style(&config.zoho.accounts_url).cyan());
    match config.zoho.api_base_url() {
        Ok(url) => eprintln!("  API URL: {}", style(url).cyan()),
        Err(e) => eprintln!("  API URL: {} ({})", style("Invalid").red(), e),
    }

    eprintln!();
    eprintln!("{}", style("Server Settings:").bold().yellow());
    eprintln!(
        "  Form cache TTL: {}s",
        style(config.server.cache_ttl_seconds).cyan()
    );
    eprintln!(
        "  Request timeout: {}s",
        style(config.server.request_timeout_seconds).cyan()
    );
    eprintln!(
        "  Retry attempts: {}",
        style(config.server.retry_attempts).cyan()
    );

    eprintln!();
    eprintln!(
        "Config file: {}",
        style(config.config_file_path().display()).dim()
    );

    Ok(())
}

/// Keep the last four characters of a secret visible
fn mask_secret(value: &str) -> String {
    let chars: Vec<char> = value.chars().collect();
    match chars.len() {
        0 => "(not set)".to_string(),
        len if len <= 4 => "*".repeat(len),
        len => {
            let visible: String = chars[len - 4..].iter().collect();
            format!("{}{}", "*".repeat(len - 4), visible)
        }
    }
}

fn load_existing_config(config_dir: &Path) -> Config {
    Config::load(config_dir).map_or_else(
        |_| {
            eprintln!(
                "{}",
                style("No existing configuration found. Using defaults.").yellow()
            );
            Config {
                base_dir: config_dir.to_path_buf(),
                ..Config::default()
            }
        },
        |config| {
            eprintln!("{}", style("Found existing configuration.").green());
            config
        },
    )
}

fn configure_zoho(zoho: &mut ZohoConfig) -> Result<()> {
    let client_id: String = Input::new()
        .with_prompt("Client ID")
        .default(zoho.client_id.clone())
        .validate_with(|input: &String| -> Result<(), &str> {
            if input.trim().is_empty() {
                Err("Client ID cannot be empty")
            } else {
                Ok(())
            }
        })
        .interact_text()?;

    let client_secret = prompt_secret("Client secret", &zoho.client_secret)?;
    let refresh_token = prompt_secret("Refresh token", &zoho.refresh_token)?;

    let organization_id: String = Input::new()
        .with_prompt("Organization ID")
        .default(zoho.organization_id.clone())
        .allow_empty(true)
        .interact_text()?;

    let environments: Vec<&str> = Environment::ALL.iter().map(|env| env.as_str()).collect();
    let default_index = Environment::ALL
        .iter()
        .position(|env| *env == zoho.environment)
        .unwrap_or(0);

    let environment_index = Select::new()
        .with_prompt("Zoho environment")
        .default(default_index)
        .items(&environments)
        .interact()?;

    zoho.client_id = client_id.trim().to_string();
    zoho.client_secret = client_secret;
    zoho.refresh_token = refresh_token;
    zoho.organization_id = organization_id.trim().to_string();
    zoho.environment = Environment::ALL
        .get(environment_index)
        .copied()
        .unwrap_or_default();

    Ok(())
}

/// Hidden prompt; an empty answer keeps the current value
fn prompt_secret(prompt: &str, current: &str) -> Result<String> {
    let prompt = if current.is_empty() {
        prompt.to_string()
    } else {
        format!("{} (leave empty to keep {})", prompt, mask_secret(current))
    };

    let value = Password::new()
        .with_prompt(prompt)
        .allow_empty_password(!current.is_empty())
        .interact()?;

    if value.trim().is_empty() {
        Ok(current.to_string())
    } else {
        Ok(value.trim().to_string())
    }
}

fn test_zoho_connection(config: &Config) -> Result<()> {
    let service = ZohoCreatorService::new(config)?;
    service.check_connection()?;
    Ok(())
}
