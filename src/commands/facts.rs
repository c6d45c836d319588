use crate::ui;
use anyhow::{Context, Result};
use converge::PlatformFacts;

pub fn run() -> Result<()> {
    let facts = PlatformFacts::detect().context("failed to detect platform facts")?;
    ui::header("Platform facts");
    ui::kv("family", &facts.family);
    ui::kv("version", &facts.version);
    ui::kv("arch", &facts.arch);
    Ok(())
}
