//! Config command handlers.

use anyhow::{Context, Result};
use handy_core::config;

pub fn path() {
    println!("{}", config::paths::config_path().display());
}

pub fn init() -> Result<()> {
    let config_path = config::paths::config_path();
    config::Config::init(&config_path)
        .with_context(|| format!("init config at {}", config_path.display()))?;
    println!("Created config at {}", config_path.display());
    Ok(())
}

pub fn set_api_url(url: &str) -> Result<()> {
    let normalized = config::resolve_base_url(None, Some(url))?;
    config::Config::save_api_base_url(&normalized)?;
    println!("✓ API URL set to {normalized}");
    println!(
        "  Saved to: {}",
        config::paths::config_path().display()
    );
    Ok(())
}
