use crate::cli::ValidateArgs;
use crate::manifest;
use crate::ui;
use anyhow::Result;

pub fn run(args: ValidateArgs) -> Result<()> {
    let path = manifest::resolve_path(args.manifest)?;
    let list = manifest::load(&path)?;
    manifest::validate(&list)?;

    ui::success(&format!(
        "{} is valid ({} resources)",
        path.display(),
        list.len()
    ));
    Ok(())
}
