//! `secondbrain onboard`: first-time setup.

use secondbrain_config::AppConfig;
use std::path::Path;

pub async fn run(config_path: Option<&Path>) -> Result<(), Box<dyn std::error::Error>> {
    let default_path = AppConfig::config_dir().join("config.toml");
    let config_path = config_path.unwrap_or(&default_path);

    println!("SecondBrain: first-time setup\n");

    if let Some(dir) = config_path.parent() {
        if !dir.exists() {
            tokio::fs::create_dir_all(dir).await?;
            println!("Created config directory: {}", dir.display());
        }
    }

    if config_path.exists() {
        println!("Config already exists at: {}", config_path.display());
        println!("Edit it manually or delete it and re-run onboard.");
        return Ok(());
    }

    tokio::fs::write(config_path, AppConfig::default_toml()).await?;
    println!("Created config at: {}", config_path.display());
    println!("\nNext steps:");
    println!("  1. Add your API key to the config, or export SECONDBRAIN_API_KEY");
    println!("  2. Run: secondbrain serve");
    println!("  3. In another terminal: secondbrain add --text \"...\" then secondbrain chat");

    Ok(())
}
