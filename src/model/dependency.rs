use serde::{Deserialize, Serialize};

/// Scheduling relationship between two tasks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DependencyKind {
    #[default]
    FinishToStart,
    StartToStart,
    FinishToFinish,
    StartToFinish,
}

/// A link drawn between two tasks (e.g. a scheduling arrow)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Dependency {
    pub id: String,
    pub from_task: String,
    pub to_task: String,
    #[serde(default)]
    pub kind: DependencyKind,
}

impl Dependency {
    pub fn new(from_task: impl Into<String>, to_task: impl Into<String>, kind: DependencyKind) -> Self {
        Dependency {
            id: uuid::Uuid::new_v4().to_string(),
            from_task: from_task.into(),
            to_task: to_task.into(),
            kind,
        }
    }

    /// True if either end of the link is `task_id`
    pub fn references(&self, task_id: &str) -> bool {
        self.from_task == task_id || self.to_task == task_id
    }
}
