use crate::model::task::{DateSpan, MAX_HIERARCHY_DEPTH, Task, TaskType, shift_date, span_duration};

/// Error type for task store operations.
///
/// Every variant is a rejection: the operation that returned it made no
/// change to the task collection, the command log or the selection.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TaskError {
    #[error("task not found: {0}")]
    NotFound(String),
    #[error("cannot nest deeper than {} levels", MAX_HIERARCHY_DEPTH)]
    MaxDepthExceeded,
    #[error("moving {task} under {parent} would create a circular hierarchy")]
    CircularHierarchy { task: String, parent: String },
    #[error("milestone {0} cannot have children")]
    MilestoneCannotParent(String),
    #[error("cannot convert {0} to a milestone while it has children")]
    MilestoneHasChildren(String),
    #[error("end date {end} is before start date {start}")]
    InvalidDateRange { start: String, end: String },
    #[error("no tasks selected")]
    EmptySelection,
    #[error("selected tasks must share the same parent to be grouped")]
    MixedParents,
    #[error("nothing in the selection can be indented")]
    NothingToIndent,
    #[error("nothing in the selection can be outdented")]
    NothingToOutdent,
    #[error("selection contains no summary tasks with children")]
    NothingToUngroup,
}

/// Milestones are leaves; every other type may parent tasks.
pub fn can_have_children(task: &Task) -> bool {
    task.kind != TaskType::Milestone
}

/// Switch `task` to `new_kind`, applying the conversion side effects.
///
/// - to milestone: rejected while the task has children, otherwise the
///   span collapses onto the start date and progress resets
/// - milestone to task: gets a `default_days` span from its date
/// - to summary: `open` defaults to expanded (dates are re-derived from
///   children by the caller)
pub fn apply_type_change(
    task: &mut Task,
    new_kind: TaskType,
    has_children: bool,
    default_days: i64,
) -> Result<(), TaskError> {
    if task.kind == new_kind {
        return Ok(());
    }
    match new_kind {
        TaskType::Milestone => {
            if has_children {
                return Err(TaskError::MilestoneHasChildren(task.id.clone()));
            }
            task.set_span(DateSpan::milestone(task.start_date.or(task.end_date)));
            task.progress = 0;
        }
        TaskType::Task if task.kind == TaskType::Milestone => {
            match task.start_date.or(task.end_date) {
                Some(start) => task.set_span(DateSpan::starting_at(start, default_days)),
                None => task.duration = 0,
            }
        }
        TaskType::Task | TaskType::Summary => {
            task.duration = span_duration(task.start_date, task.end_date);
        }
    }
    if new_kind == TaskType::Summary && task.open.is_none() {
        task.open = Some(true);
    }
    task.kind = new_kind;
    Ok(())
}

/// Reject spans whose end precedes their start.
pub fn ensure_date_order(task_id: &str, span: &DateSpan) -> Result<(), TaskError> {
    match (span.start_date, span.end_date) {
        (Some(start), Some(end)) if end < start => {
            tracing::debug!(task = task_id, %start, %end, "rejected inverted date range");
            Err(TaskError::InvalidDateRange {
                start: start.to_string(),
                end: end.to_string(),
            })
        }
        _ => Ok(()),
    }
}

/// Resolve the span a task ends up with after an edit of its dates.
///
/// An explicit end wins over a duration; a lone duration moves the end.
pub fn resolve_span(
    kind: TaskType,
    current: DateSpan,
    start: Option<chrono::NaiveDate>,
    end: Option<chrono::NaiveDate>,
    duration: Option<i64>,
) -> DateSpan {
    let start_date = start.or(current.start_date);
    if kind == TaskType::Milestone {
        return DateSpan::milestone(start_date.or(end));
    }
    let end_date = match (end, duration, start_date) {
        (Some(end), _, _) => Some(end),
        (None, Some(days), Some(start)) => Some(shift_date(start, days.max(1) - 1)),
        (None, _, _) => current.end_date,
    };
    DateSpan::new(start_date, end_date)
}
