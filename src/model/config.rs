use serde::{Deserialize, Serialize};

/// Configuration from gantt.toml
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EditorConfig {
    #[serde(default)]
    pub editor: EditorSection,
    #[serde(default)]
    pub colors: ColorConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EditorSection {
    /// Length given to synthesized tasks and milestone → task conversions
    #[serde(default = "default_duration_days")]
    pub default_duration_days: i64,
    /// Oldest commands are dropped beyond this many
    #[serde(default = "default_undo_limit")]
    pub undo_limit: usize,
    #[serde(default = "default_task_name")]
    pub new_task_name: String,
    #[serde(default = "default_group_name")]
    pub new_group_name: String,
}

impl Default for EditorSection {
    fn default() -> Self {
        EditorSection {
            default_duration_days: default_duration_days(),
            undo_limit: default_undo_limit(),
            new_task_name: default_task_name(),
            new_group_name: default_group_name(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColorConfig {
    #[serde(default = "default_task_color")]
    pub task: String,
    #[serde(default = "default_summary_color")]
    pub summary: String,
    #[serde(default = "default_milestone_color")]
    pub milestone: String,
}

impl Default for ColorConfig {
    fn default() -> Self {
        ColorConfig {
            task: default_task_color(),
            summary: default_summary_color(),
            milestone: default_milestone_color(),
        }
    }
}

impl ColorConfig {
    pub fn for_kind(&self, kind: crate::model::task::TaskType) -> &str {
        use crate::model::task::TaskType;
        match kind {
            TaskType::Task => &self.task,
            TaskType::Summary => &self.summary,
            TaskType::Milestone => &self.milestone,
        }
    }
}

fn default_duration_days() -> i64 {
    7
}

fn default_undo_limit() -> usize {
    500
}

fn default_task_name() -> String {
    "New Task".to_string()
}

fn default_group_name() -> String {
    "New Group".to_string()
}

fn default_task_color() -> String {
    "#4a90d9".to_string()
}

fn default_summary_color() -> String {
    "#5c6370".to_string()
}

fn default_milestone_color() -> String {
    "#e5a50a".to_string()
}
