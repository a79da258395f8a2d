//! `dossier config` subcommands.

use std::path::Path;

use anyhow::{bail, Result};

use dossier_core::config::CONFIG_FILE;
use dossier_core::DossierConfig;

pub fn show(config_dir: &Path) -> Result<()> {
    let config = DossierConfig::load(config_dir)?;
    println!("# {}", config_dir.join(CONFIG_FILE).display());
    println!("{}", serde_json::to_string_pretty(&config)?);
    println!();
    println!("history: {}", config.history_dir(config_dir).display());
    match config.log_dir(config_dir) {
        Some(dir) => println!("protocol logs: {}", dir.display()),
        None => println!("protocol logs: off"),
    }
    Ok(())
}

pub fn init(config_dir: &Path, force: bool) -> Result<()> {
    let path = config_dir.join(CONFIG_FILE);
    if path.exists() && !force {
        bail!("{} already exists (use --force to overwrite)", path.display());
    }
    DossierConfig::default().save(config_dir)?;
    println!("Wrote {}", path.display());
    Ok(())
}
