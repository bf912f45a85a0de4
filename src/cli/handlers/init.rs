use std::path::PathBuf;

use crate::cli::commands::InitArgs;
use crate::io::project_io;

/// Create a project in `-C dir` (created if missing) or the current directory
pub fn cmd_init(args: InitArgs, project_dir: Option<&str>) -> Result<(), Box<dyn std::error::Error>> {
    let root = match project_dir {
        Some(dir) => PathBuf::from(dir),
        None => std::env::current_dir()?,
    };
    project_io::init_project(&root, args.force)?;
    println!("Initialized gantt project in {}", root.display());
    Ok(())
}
