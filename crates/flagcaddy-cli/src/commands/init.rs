//! `flagcaddy init`: write a default config file.
//!
//! The file is written with every default spelled out so it doubles as
//! documentation of the available settings.

use std::fs;
use std::path::Path;

use anyhow::{bail, Context, Result};

use flagcaddy_types::{ConfigLoader, FlagcaddyConfig};

pub fn run(loader: &ConfigLoader, force: bool) -> Result<()> {
    let path = loader.user_path();
    let data_dir = path
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_else(flagcaddy_types::default_data_dir);
    write_default(&path, &data_dir, force)?;
    println!("Wrote {}", path.display());
    println!("  Enable advisory calls by setting [advisory] enabled = true.");
    Ok(())
}

fn write_default(path: &Path, data_dir: &Path, force: bool) -> Result<()> {
    if path.exists() && !force {
        bail!(
            "{} already exists\n  Hint: pass --force to overwrite it",
            path.display()
        );
    }
    fs::create_dir_all(data_dir)
        .with_context(|| format!("cannot create {}", data_dir.display()))?;
    let content = FlagcaddyConfig::default_for(data_dir)
        .to_toml()
        .context("failed to serialize default config")?;
    fs::write(path, content).with_context(|| format!("cannot write {}", path.display()))
}
