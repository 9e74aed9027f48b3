use anyhow::Result;
use docgen_core::config::{self, paths};

pub fn path() {
    println!("{}", paths::config_path().display());
}

pub fn init() -> Result<()> {
    let path = paths::config_path();
    config::Config::init(&path)?;
    println!("Created config at {}", path.display());
    Ok(())
}
