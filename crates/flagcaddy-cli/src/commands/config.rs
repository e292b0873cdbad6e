//! `flagcaddy config`: print the effective configuration.

use anyhow::{Context, Result};

use flagcaddy_types::ConfigLoader;

pub fn show(loader: &ConfigLoader) -> Result<()> {
    let path = loader.user_path();
    let config = loader.load().context("failed to load configuration")?;
    let source = if path.exists() {
        path.display().to_string()
    } else {
        format!("{} (not present, built-in defaults)", path.display())
    };
    println!("# config file: {source}");
    print!("{}", config.to_toml().context("failed to serialize config")?);
    Ok(())
}
