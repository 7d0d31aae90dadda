//! `taskloop config`: Show the effective configuration.

use std::path::Path;

use taskloop_config::AppConfig;

pub fn show(config_path: Option<&Path>) -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load(config_path).map_err(|e| format!("Failed to load config: {e}"))?;

    let source = match config_path {
        Some(path) => path.to_path_buf(),
        None => AppConfig::config_dir().join("config.toml"),
    };
    println!("# Config file: {}", source.display());
    println!(
        "# API key:     {}",
        if config.has_api_key() { "set" } else { "not set" }
    );
    println!();
    println!("{}", config.to_toml());
    Ok(())
}
