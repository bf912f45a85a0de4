use std::fs;
use std::path::Path;

use crate::io::project_io::{ProjectError, atomic_write};
use crate::model::config::EditorConfig;

pub const CONFIG_FILE: &str = "gantt.toml";

/// Written by `gl init`. Every key is commented out so the defaults apply
/// until the user edits it.
const CONFIG_TEMPLATE: &str = r##"# ganttline settings. Uncomment and edit to override defaults.

[editor]
# default_duration_days = 7
# undo_limit = 500
# new_task_name = "New Task"
# new_group_name = "New Group"

[colors]
# task = "#4a90d9"
# summary = "#5c6370"
# milestone = "#e5a50a"
"##;

/// Read gantt.toml from the project root. A missing file means defaults.
pub fn read_config(root: &Path) -> Result<EditorConfig, ProjectError> {
    let path = root.join(CONFIG_FILE);
    if !path.exists() {
        return Ok(EditorConfig::default());
    }
    let text = fs::read_to_string(&path).map_err(|e| ProjectError::ReadError {
        path: path.clone(),
        source: e,
    })?;
    let config: EditorConfig = toml::from_str(&text)?;
    Ok(config)
}

/// Write the commented default gantt.toml
pub fn write_config_template(root: &Path) -> Result<(), ProjectError> {
    atomic_write(&root.join(CONFIG_FILE), CONFIG_TEMPLATE.as_bytes())?;
    Ok(())
}
