use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;

use crate::io::config_io;
use crate::model::command::Command;
use crate::model::config::EditorConfig;
use crate::model::dependency::Dependency;
use crate::model::task::Task;
use crate::store::{CommandLog, DependencyLinks, DirtyFlag, TaskStore};

pub const PROJECT_FILE: &str = "gantt.json";
pub const HISTORY_FILE: &str = ".gantt-history.json";

/// Error type for project I/O operations
#[derive(Debug, thiserror::Error)]
pub enum ProjectError {
    #[error("not a gantt project: no gantt.json found")]
    NotAProject,
    #[error("a project already exists in {0} (use --force to reinitialize)")]
    AlreadyExists(PathBuf),
    #[error("could not read {path}: {source}")]
    ReadError {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("could not parse {path}: {source}")]
    JsonParseError {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[error("could not serialize project data: {0}")]
    JsonSerializeError(#[from] serde_json::Error),
    #[error("could not parse gantt.toml: {0}")]
    ConfigParseError(#[from] toml::de::Error),
    #[error("io error: {0}")]
    IoError(#[from] std::io::Error),
}

/// On-disk shape of gantt.json
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProjectFile {
    #[serde(default)]
    pub tasks: Vec<Task>,
    #[serde(default)]
    pub dependencies: Vec<Dependency>,
}

/// On-disk shape of .gantt-history.json (both stacks oldest first)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HistoryFile {
    #[serde(default)]
    pub undo: Vec<Command>,
    #[serde(default)]
    pub redo: Vec<Command>,
}

/// Everything loaded from a project directory
#[derive(Debug)]
pub struct Project {
    pub root: PathBuf,
    pub config: EditorConfig,
    pub data: ProjectFile,
    pub history: HistoryFile,
}

impl Project {
    /// Hand the loaded tasks, links and undo history to a task store
    pub fn into_store(self) -> TaskStore {
        let limit = self.config.editor.undo_limit;
        let mut store = TaskStore::with_collaborators(
            DependencyLinks::new(self.data.dependencies),
            DirtyFlag::default(),
            self.config,
        );
        store.set_tasks(self.data.tasks);
        store.set_history(CommandLog::from_parts(
            self.history.undo,
            self.history.redo,
            limit,
        ));
        store
    }
}

/// Discover the project by walking up from the given directory, looking
/// for a `gantt.json` file.
pub fn discover_project(start: &Path) -> Result<PathBuf, ProjectError> {
    let mut current = start.to_path_buf();
    loop {
        if current.join(PROJECT_FILE).is_file() {
            return Ok(current);
        }
        if !current.pop() {
            return Err(ProjectError::NotAProject);
        }
    }
}

/// Create an empty project (gantt.json + commented gantt.toml) in `root`.
/// With `force`, an existing project is emptied and its history dropped.
pub fn init_project(root: &Path, force: bool) -> Result<(), ProjectError> {
    let project_path = root.join(PROJECT_FILE);
    if project_path.exists() && !force {
        return Err(ProjectError::AlreadyExists(root.to_path_buf()));
    }
    fs::create_dir_all(root)?;
    write_json(&project_path, &ProjectFile::default())?;
    let history_path = root.join(HISTORY_FILE);
    if history_path.exists() {
        fs::remove_file(&history_path)?;
    }
    if !root.join(config_io::CONFIG_FILE).exists() {
        config_io::write_config_template(root)?;
    }
    tracing::debug!(root = %root.display(), "initialized project");
    Ok(())
}

/// Load a project from the given root directory.
pub fn load_project(root: &Path) -> Result<Project, ProjectError> {
    let project_path = root.join(PROJECT_FILE);
    if !project_path.is_file() {
        return Err(ProjectError::NotAProject);
    }
    let data: ProjectFile = read_json(&project_path)?;
    let config = config_io::read_config(root)?;
    let history = load_history(root);
    tracing::debug!(
        tasks = data.tasks.len(),
        dependencies = data.dependencies.len(),
        undo = history.undo.len(),
        "loaded project"
    );
    Ok(Project {
        root: root.to_path_buf(),
        config,
        data,
        history,
    })
}

/// Read the undo history. A missing or unreadable file starts a fresh
/// history rather than blocking the project.
pub fn load_history(root: &Path) -> HistoryFile {
    let path = root.join(HISTORY_FILE);
    if !path.exists() {
        return HistoryFile::default();
    }
    match read_json(&path) {
        Ok(history) => history,
        Err(e) => {
            tracing::warn!(error = %e, "discarding unreadable undo history");
            HistoryFile::default()
        }
    }
}

/// Write the store's tasks, links and history back to `root`.
pub fn save_store(root: &Path, store: &TaskStore) -> Result<(), ProjectError> {
    let data = ProjectFile {
        tasks: store.tasks().values().cloned().collect(),
        dependencies: store.dependencies().links().to_vec(),
    };
    write_json(&root.join(PROJECT_FILE), &data)?;
    save_history(root, store.history())?;
    Ok(())
}

pub fn save_history(root: &Path, log: &CommandLog) -> Result<(), ProjectError> {
    let history = HistoryFile {
        undo: log.undo_stack().to_vec(),
        redo: log.redo_stack().to_vec(),
    };
    write_json(&root.join(HISTORY_FILE), &history)
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T, ProjectError> {
    let text = fs::read_to_string(path).map_err(|e| ProjectError::ReadError {
        path: path.to_path_buf(),
        source: e,
    })?;
    serde_json::from_str(&text).map_err(|e| ProjectError::JsonParseError {
        path: path.to_path_buf(),
        source: e,
    })
}

fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<(), ProjectError> {
    let mut text = serde_json::to_string_pretty(value)?;
    text.push('\n');
    atomic_write(path, text.as_bytes())?;
    Ok(())
}

/// Write via a temp file in the same directory, then rename over `path`.
pub fn atomic_write(path: &Path, content: &[u8]) -> io::Result<()> {
    let dir = path.parent().unwrap_or(Path::new("."));
    let mut tmp = NamedTempFile::new_in(dir)?;
    tmp.write_all(content)?;
    tmp.flush()?;
    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}
