//! Configuration commands.
//!
//! - `config show`: Display the current configuration
//! - `config set-user`: Persist the current user id
//! - `config path`: Print where the configuration lives

use owo_colors::OwoColorize;
use serde_json::json;

use crate::config::{Config, UserSystem};
use crate::error::Result;
use crate::types::UserId;

/// Show current configuration
pub fn cmd_config_show(as_json: bool) -> Result<()> {
    let users = UserSystem::load()?;
    let config = users.snapshot();
    let path = Config::config_path()?;

    if as_json {
        let output = json!({
            "config_file": path.to_string_lossy(),
            "current_user": config.current_user(),
            "config": config,
        });
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(());
    }

    println!("{}\n", "Configuration:".cyan().bold());
    match config.current_user() {
        Some(user) => println!("{}: {}", "current_user".cyan(), user),
        None => println!("{}: {}", "current_user".cyan(), "not set".dimmed()),
    }
    print!("{}", serde_yaml_ng::to_string(&config)?);
    println!("\n{}: {}", "config_file".dimmed(), path.display());
    Ok(())
}

/// Persist the current user id
pub fn cmd_config_set_user(user: &str) -> Result<()> {
    let users = UserSystem::load()?;
    let user = UserId::new(user.trim());
    users.update_and_save(|config| config.set_user(user.clone()))?;
    println!("Set {} = {}", "user_id".cyan(), user.green());
    Ok(())
}

pub fn cmd_config_path() -> Result<()> {
    println!("{}", Config::config_path()?.display());
    Ok(())
}
