use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::dependency::Dependency;
use crate::model::task::{DateSpan, Task, TaskMap};

/// The kind of a recorded command
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CommandKind {
    AddTask,
    UpdateTask,
    DeleteTask,
    ReorderTasks,
    IndentTasks,
    OutdentTasks,
    GroupTasks,
    UngroupTasks,
    MultiDragTasks,
}

impl CommandKind {
    pub fn as_str(self) -> &'static str {
        match self {
            CommandKind::AddTask => "ADD_TASK",
            CommandKind::UpdateTask => "UPDATE_TASK",
            CommandKind::DeleteTask => "DELETE_TASK",
            CommandKind::ReorderTasks => "REORDER_TASKS",
            CommandKind::IndentTasks => "INDENT_TASKS",
            CommandKind::OutdentTasks => "OUTDENT_TASKS",
            CommandKind::GroupTasks => "GROUP_TASKS",
            CommandKind::UngroupTasks => "UNGROUP_TASKS",
            CommandKind::MultiDragTasks => "MULTI_DRAG_TASKS",
        }
    }
}

impl fmt::Display for CommandKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One user-visible logical operation in the undo log.
///
/// `params` carries owned copies of everything needed to reverse and
/// replay the operation; nothing in it points at live tasks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Command {
    pub id: String,
    pub timestamp: DateTime<Utc>,
    pub description: String,
    pub params: CommandParams,
}

impl Command {
    pub fn new(description: impl Into<String>, params: CommandParams) -> Self {
        Command {
            id: uuid::Uuid::new_v4().to_string(),
            timestamp: Utc::now(),
            description: description.into(),
            params,
        }
    }

    pub fn kind(&self) -> CommandKind {
        self.params.kind()
    }
}

/// Per-variant undo/redo payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(
    tag = "type",
    rename_all = "SCREAMING_SNAKE_CASE",
    rename_all_fields = "camelCase"
)]
pub enum CommandParams {
    /// Tasks created by add / insert-above / insert-below
    AddTask {
        added: Vec<PlacedTask>,
        cascade: Vec<CascadeRecord>,
        before: HierarchySnapshot,
        after: HierarchySnapshot,
    },
    /// Field edit of a single task, with type-change side effects folded in
    UpdateTask {
        task_id: String,
        before: Task,
        after: Task,
        cascade: Vec<CascadeRecord>,
    },
    /// Single, cascading or selection delete
    DeleteTask {
        /// Every removed task, at its position in the collection
        deleted: Vec<PlacedTask>,
        cascade: Vec<CascadeRecord>,
        before: HierarchySnapshot,
        after: HierarchySnapshot,
    },
    ReorderTasks {
        task_id: String,
        old_parent: Option<String>,
        new_parent: Option<String>,
        cascade: Vec<CascadeRecord>,
        before: HierarchySnapshot,
        after: HierarchySnapshot,
    },
    IndentTasks {
        changes: Vec<ParentChange>,
        cascade: Vec<CascadeRecord>,
        before: HierarchySnapshot,
        after: HierarchySnapshot,
    },
    OutdentTasks {
        changes: Vec<ParentChange>,
        cascade: Vec<CascadeRecord>,
        before: HierarchySnapshot,
        after: HierarchySnapshot,
    },
    GroupTasks {
        /// The synthesized summary as it was right after grouping
        group: PlacedTask,
        changes: Vec<ParentChange>,
        cascade: Vec<CascadeRecord>,
        before: HierarchySnapshot,
        after: HierarchySnapshot,
    },
    UngroupTasks {
        /// In processing order (deepest first)
        ungrouped: Vec<UngroupedSummary>,
        cascade: Vec<CascadeRecord>,
        before: HierarchySnapshot,
        after: HierarchySnapshot,
    },
    MultiDragTasks {
        moves: Vec<DateMove>,
        cascade: Vec<CascadeRecord>,
    },
}

impl CommandParams {
    pub fn kind(&self) -> CommandKind {
        match self {
            CommandParams::AddTask { .. } => CommandKind::AddTask,
            CommandParams::UpdateTask { .. } => CommandKind::UpdateTask,
            CommandParams::DeleteTask { .. } => CommandKind::DeleteTask,
            CommandParams::ReorderTasks { .. } => CommandKind::ReorderTasks,
            CommandParams::IndentTasks { .. } => CommandKind::IndentTasks,
            CommandParams::OutdentTasks { .. } => CommandKind::OutdentTasks,
            CommandParams::GroupTasks { .. } => CommandKind::GroupTasks,
            CommandParams::UngroupTasks { .. } => CommandKind::UngroupTasks,
            CommandParams::MultiDragTasks { .. } => CommandKind::MultiDragTasks,
        }
    }

    /// Summary date changes triggered by the operation
    pub fn cascade(&self) -> &[CascadeRecord] {
        match self {
            CommandParams::AddTask { cascade, .. }
            | CommandParams::UpdateTask { cascade, .. }
            | CommandParams::DeleteTask { cascade, .. }
            | CommandParams::ReorderTasks { cascade, .. }
            | CommandParams::IndentTasks { cascade, .. }
            | CommandParams::OutdentTasks { cascade, .. }
            | CommandParams::GroupTasks { cascade, .. }
            | CommandParams::UngroupTasks { cascade, .. }
            | CommandParams::MultiDragTasks { cascade, .. } => cascade,
        }
    }
}

/// A task together with its index in the collection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlacedTask {
    pub index: usize,
    pub task: Task,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParentChange {
    pub task_id: String,
    pub old_parent: Option<String>,
    pub new_parent: Option<String>,
}

/// A summary whose dates changed because a descendant changed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CascadeRecord {
    pub id: String,
    pub updates: DateSpan,
    pub previous_values: DateSpan,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DateMove {
    pub task_id: String,
    pub before: DateSpan,
    pub after: DateSpan,
}

/// Everything needed to bring back one ungrouped summary
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UngroupedSummary {
    pub summary: PlacedTask,
    pub children: Vec<ParentChange>,
    pub dependencies: Vec<Dependency>,
}

/// Parent, order and expanded state of one task
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HierarchyEntry {
    pub id: String,
    pub parent: Option<String>,
    pub order: i64,
    pub open: Option<bool>,
}

/// Structural state of the whole collection at one instant
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct HierarchySnapshot(pub Vec<HierarchyEntry>);

impl HierarchySnapshot {
    pub fn capture(tasks: &TaskMap) -> Self {
        HierarchySnapshot(
            tasks
                .values()
                .map(|t| HierarchyEntry {
                    id: t.id.clone(),
                    parent: t.parent.clone(),
                    order: t.order,
                    open: t.open,
                })
                .collect(),
        )
    }

    /// Write the captured structure back onto whichever tasks still exist
    pub fn restore(&self, tasks: &mut TaskMap) {
        for entry in &self.0 {
            if let Some(task) = tasks.get_mut(&entry.id) {
                task.parent = entry.parent.clone();
                task.order = entry.order;
                task.open = entry.open;
            }
        }
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}
