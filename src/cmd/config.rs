//! Configuration view and validation commands — `corkboard config`.

use std::path::Path;

use anyhow::Result;
use corkboard::config::CorkboardConfig;

use super::super::ConfigCommands;

pub fn cmd_config(project_dir: &Path, command: Option<ConfigCommands>) -> Result<()> {
    let config_path = CorkboardConfig::path_for(project_dir);

    match command {
        None | Some(ConfigCommands::Show) => {
            if config_path.exists() {
                println!("Config file: {}", config_path.display());
            } else {
                println!("No corkboard.toml found at {}", config_path.display());
                println!("Using defaults. Run 'corkboard config init' to create one.");
            }
            println!();
            println!("Effective values (with env overrides):");
            let config = CorkboardConfig::load_for_project(project_dir)?;
            print!("{}", toml::to_string_pretty(&config)?);
        }
        Some(ConfigCommands::Validate) => {
            let config = match CorkboardConfig::load_for_project(project_dir) {
                Ok(config) => config,
                Err(e) => anyhow::bail!("Configuration is invalid: {:#}", e),
            };
            let problems = config.validate();
            if problems.is_empty() {
                println!("Configuration is valid.");
            } else {
                println!("Configuration problems:");
                for problem in &problems {
                    println!("  - {}", problem);
                }
                anyhow::bail!("{} configuration problem(s) found", problems.len());
            }
        }
        Some(ConfigCommands::Init) => {
            if config_path.exists() {
                println!("corkboard.toml already exists at {}", config_path.display());
                println!("Delete it first if you want to recreate it.");
                return Ok(());
            }
            CorkboardConfig::default().save(&config_path)?;
            println!("Created corkboard.toml at {}", config_path.display());
        }
    }

    Ok(())
}
