// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Configuration inspection commands.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Subcommand;
use colored::Colorize;

use edon_core::config::GatewayConfig;

#[derive(Subcommand)]
pub enum ConfigCommand {
    /// Print the effective configuration (secrets masked)
    Show,
    /// Validate the configuration and report warnings
    Validate,
}

pub fn handle_command(command: ConfigCommand, config_path: Option<PathBuf>) -> Result<()> {
    let config = GatewayConfig::load(config_path.as_deref())
        .context("Failed to load configuration")?;

    match command {
        ConfigCommand::Show => {
            let mut masked = config.clone();
            if !masked.api_token.is_empty() {
                masked.api_token = "********".to_string();
            }
            if masked.clawdbot_gateway_token.is_some() {
                masked.clawdbot_gateway_token = Some("********".to_string());
            }
            println!("{}", serde_yaml::to_string(&masked)?);
        }
        ConfigCommand::Validate => {
            let warnings = config.validate();
            if warnings.is_empty() {
                println!("{}", "Configuration OK".green());
            } else {
                for warning in &warnings {
                    println!("{} {}", "warning:".yellow(), warning);
                }
            }
            if let Err(e) = config.enforce() {
                println!("{} {}", "error:".red(), e);
                std::process::exit(1);
            }
        }
    }
    Ok(())
}
