use std::fmt;
use std::str::FromStr;

use chrono::NaiveDate;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Number of hierarchy levels a chart may use (root = level 0).
pub const MAX_HIERARCHY_DEPTH: usize = 3;

/// Deepest level a task may sit at.
pub const MAX_TASK_LEVEL: usize = MAX_HIERARCHY_DEPTH - 1;

/// The task collection, keyed by task id. Iteration order is the
/// collection order; display order comes from `Task::order`.
pub type TaskMap = IndexMap<String, Task>;

/// Kind of a chart row. Determines editing and parenting rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskType {
    #[default]
    Task,
    Summary,
    Milestone,
}

impl TaskType {
    pub fn as_str(self) -> &'static str {
        match self {
            TaskType::Task => "task",
            TaskType::Summary => "summary",
            TaskType::Milestone => "milestone",
        }
    }
}

impl fmt::Display for TaskType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TaskType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "task" => Ok(TaskType::Task),
            "summary" => Ok(TaskType::Summary),
            "milestone" => Ok(TaskType::Milestone),
            other => Err(format!("unknown task type: {}", other)),
        }
    }
}

/// Start, end and inclusive day count of a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DateSpan {
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub duration: i64,
}

impl DateSpan {
    pub fn new(start_date: Option<NaiveDate>, end_date: Option<NaiveDate>) -> Self {
        DateSpan {
            start_date,
            end_date,
            duration: span_duration(start_date, end_date),
        }
    }

    /// A zero-length span pinned to `date`
    pub fn milestone(date: Option<NaiveDate>) -> Self {
        DateSpan {
            start_date: date,
            end_date: date,
            duration: 0,
        }
    }

    /// A span of `days` calendar days starting at `start`
    pub fn starting_at(start: NaiveDate, days: i64) -> Self {
        let days = days.max(1);
        DateSpan::new(Some(start), Some(shift_date(start, days - 1)))
    }

    /// A span of `days` calendar days ending at `end`
    pub fn ending_at(end: NaiveDate, days: i64) -> Self {
        let days = days.max(1);
        DateSpan::new(Some(shift_date(end, -(days - 1))), Some(end))
    }
}

/// Inclusive day count between two dates; 0 when either is missing.
pub fn span_duration(start: Option<NaiveDate>, end: Option<NaiveDate>) -> i64 {
    match (start, end) {
        (Some(start), Some(end)) => end.signed_duration_since(start).num_days() + 1,
        _ => 0,
    }
}

/// Move a date by a signed number of days, saturating at chrono's range.
pub fn shift_date(date: NaiveDate, days: i64) -> NaiveDate {
    chrono::TimeDelta::try_days(days)
        .and_then(|delta| date.checked_add_signed(delta))
        .unwrap_or(if days < 0 { NaiveDate::MIN } else { NaiveDate::MAX })
}

/// A single row of the chart
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    /// Opaque unique id, stable for the task's lifetime
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub start_date: Option<NaiveDate>,
    /// Equal to `start_date` for milestones
    #[serde(default)]
    pub end_date: Option<NaiveDate>,
    /// Inclusive calendar days; 0 for milestones
    #[serde(default)]
    pub duration: i64,
    /// Percent complete, 0..=100
    #[serde(default)]
    pub progress: u8,
    #[serde(default)]
    pub color: String,
    /// Display position; normalized to the depth-first order of the tree
    #[serde(default)]
    pub order: i64,
    #[serde(rename = "type", default)]
    pub kind: TaskType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<String>,
    /// Expanded state for rows with children (missing = expanded)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub open: Option<bool>,
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub metadata: IndexMap<String, serde_json::Value>,
}

impl Task {
    /// Create an undated root-level task
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Task {
            id: id.into(),
            name: name.into(),
            start_date: None,
            end_date: None,
            duration: 0,
            progress: 0,
            color: String::new(),
            order: 0,
            kind: TaskType::Task,
            parent: None,
            open: None,
            metadata: IndexMap::new(),
        }
    }

    /// Builder-style date setter, keeps `duration` consistent
    pub fn with_dates(mut self, start: NaiveDate, end: NaiveDate) -> Self {
        let span = if self.kind == TaskType::Milestone {
            DateSpan::milestone(Some(start))
        } else {
            DateSpan::new(Some(start), Some(end))
        };
        self.set_span(span);
        self
    }

    pub fn with_kind(mut self, kind: TaskType) -> Self {
        self.kind = kind;
        if kind == TaskType::Milestone {
            self.set_span(DateSpan::milestone(self.start_date));
        }
        self
    }

    pub fn with_parent(mut self, parent: impl Into<String>) -> Self {
        self.parent = Some(parent.into());
        self
    }

    pub fn with_order(mut self, order: i64) -> Self {
        self.order = order;
        self
    }

    pub fn span(&self) -> DateSpan {
        DateSpan {
            start_date: self.start_date,
            end_date: self.end_date,
            duration: self.duration,
        }
    }

    pub fn set_span(&mut self, span: DateSpan) {
        self.start_date = span.start_date;
        self.end_date = span.end_date;
        self.duration = span.duration;
    }

    /// Whether descendants are shown in the flattened view
    pub fn is_open(&self) -> bool {
        self.open.unwrap_or(true)
    }
}

/// Field values for a task created through the store
#[derive(Debug, Clone, Default)]
pub struct NewTask {
    pub name: String,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub progress: u8,
    /// Falls back to the configured color for the task type
    pub color: Option<String>,
    pub kind: TaskType,
    pub parent: Option<String>,
    pub open: Option<bool>,
    pub metadata: IndexMap<String, serde_json::Value>,
}

impl NewTask {
    pub fn named(name: impl Into<String>) -> Self {
        NewTask {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn dated(name: impl Into<String>, start: NaiveDate, end: NaiveDate) -> Self {
        NewTask {
            name: name.into(),
            start_date: Some(start),
            end_date: Some(end),
            ..Default::default()
        }
    }
}

/// A partial edit of one task. `None` fields are left alone.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TaskUpdate {
    pub name: Option<String>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    /// Inclusive days; moves `end_date` when no end date is given
    pub duration: Option<i64>,
    pub progress: Option<u8>,
    pub color: Option<String>,
    pub kind: Option<TaskType>,
    pub open: Option<bool>,
    pub metadata: Option<IndexMap<String, serde_json::Value>>,
}

impl TaskUpdate {
    pub fn touches_dates(&self) -> bool {
        self.start_date.is_some() || self.end_date.is_some() || self.duration.is_some()
    }

    pub fn is_empty(&self) -> bool {
        *self == TaskUpdate::default()
    }
}
