use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;

use crate::model::command::{Command, CommandKind};
use crate::model::dependency::{Dependency, DependencyKind};
use crate::model::task::{Task, TaskMap, TaskType};
use crate::ops::hierarchy::{FlatTask, effective_parent, task_children, task_level};

/// Characters of a task id shown in text output
pub const SHORT_ID_LEN: usize = 8;

// ---------------------------------------------------------------------------
// JSON output structs
// ---------------------------------------------------------------------------

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskJson {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub kind: TaskType,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub duration: i64,
    pub progress: u8,
    pub color: String,
    pub order: i64,
    pub level: usize,
    /// Parent as the hierarchy resolves it (dangling parents read as none)
    pub parent: Option<String>,
    pub open: bool,
    pub has_children: bool,
}

#[derive(Serialize)]
pub struct TaskDetailJson {
    #[serde(flatten)]
    pub task: TaskJson,
    pub children: Vec<String>,
    pub links: Vec<Dependency>,
}

#[derive(Serialize)]
pub struct CommandJson {
    pub id: String,
    pub kind: CommandKind,
    pub description: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Serialize)]
pub struct HistoryJson {
    pub undo: Vec<CommandJson>,
    pub redo: Vec<CommandJson>,
}

/// Result of a write command: the ids it created or touched
#[derive(Serialize)]
pub struct ChangeJson {
    pub description: Option<String>,
    pub ids: Vec<String>,
}

// ---------------------------------------------------------------------------
// Conversions
// ---------------------------------------------------------------------------

pub fn row_to_json(tasks: &TaskMap, row: &FlatTask<'_>) -> TaskJson {
    TaskJson {
        id: row.task.id.clone(),
        name: row.task.name.clone(),
        kind: row.task.kind,
        start_date: row.task.start_date,
        end_date: row.task.end_date,
        duration: row.task.duration,
        progress: row.task.progress,
        color: row.task.color.clone(),
        order: row.task.order,
        level: row.level,
        parent: effective_parent(tasks, row.task).map(str::to_string),
        open: row.task.is_open(),
        has_children: row.has_children,
    }
}

pub fn task_to_json(tasks: &TaskMap, task: &Task) -> TaskJson {
    let row = FlatTask {
        task,
        level: task_level(tasks, &task.id),
        has_children: !task_children(tasks, Some(&task.id)).is_empty(),
    };
    row_to_json(tasks, &row)
}

pub fn command_to_json(command: &Command) -> CommandJson {
    CommandJson {
        id: command.id.clone(),
        kind: command.kind(),
        description: command.description.clone(),
        timestamp: command.timestamp,
    }
}

// ---------------------------------------------------------------------------
// Human-readable formatting
// ---------------------------------------------------------------------------

pub fn short_id(id: &str) -> &str {
    match id.char_indices().nth(SHORT_ID_LEN) {
        Some((end, _)) => &id[..end],
        None => id,
    }
}

fn row_marker(row: &FlatTask<'_>) -> char {
    if row.task.kind == TaskType::Milestone {
        '◆'
    } else if !row.has_children {
        '•'
    } else if row.task.is_open() {
        '▾'
    } else {
        '▸'
    }
}

/// `2025-03-03 → 2025-03-07 (5d)`, or `no dates` when undated
pub fn format_dates(task: &Task) -> String {
    match (task.start_date, task.end_date) {
        (Some(start), _) if task.kind == TaskType::Milestone => start.to_string(),
        (Some(start), Some(end)) => format!("{} → {} ({}d)", start, end, task.duration),
        (Some(start), None) => format!("{} →", start),
        (None, Some(end)) => format!("→ {}", end),
        (None, None) => "no dates".to_string(),
    }
}

/// One line of the chart listing, indented by level
pub fn format_row(row: &FlatTask<'_>) -> String {
    let mut line = format!(
        "{}{} {}  {}  {}",
        "  ".repeat(row.level),
        row_marker(row),
        short_id(&row.task.id),
        row.task.name,
        format_dates(row.task)
    );
    if row.task.progress > 0 {
        line.push_str(&format!("  {}%", row.task.progress));
    }
    line
}

/// Detailed view of a single task
pub fn format_task_detail(tasks: &TaskMap, task: &Task, links: &[Dependency]) -> Vec<String> {
    let mut lines = Vec::new();
    lines.push(format!("{} {}", task.id, task.name));
    lines.push(format!("type: {}", task.kind));
    lines.push(format!("dates: {}", format_dates(task)));
    lines.push(format!("progress: {}%", task.progress));
    if !task.color.is_empty() {
        lines.push(format!("color: {}", task.color));
    }
    if let Some(parent) = effective_parent(tasks, task).and_then(|id| tasks.get(id)) {
        lines.push(format!("parent: {} {}", short_id(&parent.id), parent.name));
    }

    let children = task_children(tasks, Some(&task.id));
    if !children.is_empty() {
        lines.push(String::new());
        lines.push(format!(
            "children{}:",
            if task.is_open() { "" } else { " (collapsed)" }
        ));
        for child in children {
            lines.push(format!("  {} {}", short_id(&child.id), child.name));
        }
    }

    if !links.is_empty() {
        lines.push(String::new());
        lines.push("links:".to_string());
        for link in links {
            lines.push(format!("  {}", format_link(tasks, link)));
        }
    }
    lines
}

fn kind_label(kind: DependencyKind) -> &'static str {
    match kind {
        DependencyKind::FinishToStart => "FS",
        DependencyKind::StartToStart => "SS",
        DependencyKind::FinishToFinish => "FF",
        DependencyKind::StartToFinish => "SF",
    }
}

pub fn format_link(tasks: &TaskMap, link: &Dependency) -> String {
    let name = |id: &str| {
        tasks
            .get(id)
            .map(|t| t.name.clone())
            .unwrap_or_else(|| "?".to_string())
    };
    format!(
        "{} {} {} → {}",
        short_id(&link.id),
        kind_label(link.kind),
        name(&link.from_task),
        name(&link.to_task)
    )
}

pub fn format_command(command: &Command) -> String {
    format!(
        "{}  {}",
        command.timestamp.format("%Y-%m-%d %H:%M:%S"),
        command.description
    )
}
