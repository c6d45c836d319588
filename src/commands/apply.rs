use crate::cli::ApplyArgs;
use crate::collaborators::SystemWorld;
use crate::manifest;
use crate::ui;
use anyhow::{Context, Result};
use converge::{Driver, PlatformFacts, RunOptions, RunStatus};
use std::path::Path;

pub fn run(args: ApplyArgs) -> Result<()> {
    let path = manifest::resolve_path(args.manifest)?;
    let list = manifest::load(&path)?;
    manifest::validate(&list)?;

    let facts = match args.family {
        Some(family) => PlatformFacts::new(
            &family,
            args.platform_version.as_deref().unwrap_or_default(),
            std::env::consts::ARCH,
        ),
        None => PlatformFacts::detect().context("failed to detect platform facts")?,
    };
    log::info!(
        "converging '{}' on {} {}",
        list.name,
        facts.family,
        facts.version
    );

    let manifest_dir = path.parent().unwrap_or(Path::new("."));
    let world = SystemWorld::new(&facts, manifest_dir)?;
    let driver = Driver::new(facts, world.capabilities());

    let options = RunOptions {
        dry_run: args.dry_run,
    };
    if args.dry_run {
        ui::info("dry run: no changes will be made");
    }

    let report = driver.run(&list, options).map_err(|e| {
        ui::error(&format!("convergence failed: {e}"));
        anyhow::anyhow!("run aborted")
    })?;

    if report.status == RunStatus::Converged {
        for resource in &report.resources {
            ui::resource_line(resource);
        }
    }
    ui::run_summary(&report);
    Ok(())
}
