use std::collections::HashSet;

use serde::Serialize;

use crate::model::task::{MAX_TASK_LEVEL, TaskMap, TaskType, span_duration};
use crate::ops::hierarchy::{
    calculate_summary_dates, effective_parent, flattened_ids, has_children, task_level,
};

/// Structured result from `gl check`, suitable for --json output.
#[derive(Debug, Default, Serialize)]
pub struct CheckResult {
    pub valid: bool,
    pub errors: Vec<CheckError>,
    pub warnings: Vec<CheckWarning>,
}

/// A structural violation (the chart breaks a hierarchy invariant).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type")]
pub enum CheckError {
    /// `parent` names a task that does not exist
    #[serde(rename = "dangling_parent")]
    DanglingParent { task_id: String, parent: String },
    /// Following `parent` links from this task loops
    #[serde(rename = "circular_parent")]
    CircularParent { task_id: String },
    /// Task sits deeper than the hierarchy allows
    #[serde(rename = "depth_exceeded")]
    DepthExceeded { task_id: String, level: usize },
    /// A milestone has children
    #[serde(rename = "milestone_parent")]
    MilestoneParent { task_id: String, child_id: String },
    /// A summary's dates differ from its children's span
    #[serde(rename = "stale_summary")]
    StaleSummary { task_id: String },
}

/// A consistency issue that does not break the hierarchy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type")]
pub enum CheckWarning {
    /// `duration` disagrees with the dates
    #[serde(rename = "duration_mismatch")]
    DurationMismatch {
        task_id: String,
        expected: i64,
        actual: i64,
    },
    /// Milestone whose end differs from its start
    #[serde(rename = "milestone_span")]
    MilestoneSpan { task_id: String },
    /// `order` does not follow the depth-first layout
    #[serde(rename = "order_out_of_sequence")]
    OrderOutOfSequence { task_id: String },
    #[serde(rename = "progress_out_of_range")]
    ProgressOutOfRange { task_id: String, progress: u8 },
}

/// Validate a task collection and return structured results.
///
/// Read-only; checks performed:
/// 1. Every `parent` resolves, without loops
/// 2. No task deeper than the maximum level
/// 3. No task parented by a milestone
/// 4. Summaries with children carry their children's span
/// 5. Warnings for duration/date drift, stretched milestones, order gaps
pub fn check_tasks(tasks: &TaskMap) -> CheckResult {
    let mut result = CheckResult::default();

    for task in tasks.values() {
        if let Some(parent) = &task.parent {
            match tasks.get(parent) {
                None => result.errors.push(CheckError::DanglingParent {
                    task_id: task.id.clone(),
                    parent: parent.clone(),
                }),
                Some(_) if effective_parent(tasks, task).is_none() => {
                    result.errors.push(CheckError::CircularParent {
                        task_id: task.id.clone(),
                    })
                }
                Some(p) if p.kind == TaskType::Milestone => {
                    result.errors.push(CheckError::MilestoneParent {
                        task_id: p.id.clone(),
                        child_id: task.id.clone(),
                    })
                }
                Some(_) => {}
            }
        }

        let level = task_level(tasks, &task.id);
        if level > MAX_TASK_LEVEL {
            result.errors.push(CheckError::DepthExceeded {
                task_id: task.id.clone(),
                level,
            });
        }

        if task.kind == TaskType::Summary
            && has_children(tasks, &task.id)
            && let Some(span) = calculate_summary_dates(tasks, &task.id)
            && (span.start_date != task.start_date || span.end_date != task.end_date)
        {
            result.errors.push(CheckError::StaleSummary {
                task_id: task.id.clone(),
            });
        }

        check_dates(task, &mut result);
    }

    check_order(tasks, &mut result);

    result.valid = result.errors.is_empty();
    result
}

fn check_dates(task: &crate::model::task::Task, result: &mut CheckResult) {
    if task.kind == TaskType::Milestone {
        if task.start_date != task.end_date {
            result.warnings.push(CheckWarning::MilestoneSpan {
                task_id: task.id.clone(),
            });
        }
    } else {
        let expected = span_duration(task.start_date, task.end_date);
        if expected != task.duration {
            result.warnings.push(CheckWarning::DurationMismatch {
                task_id: task.id.clone(),
                expected,
                actual: task.duration,
            });
        }
    }
    if task.progress > 100 {
        result.warnings.push(CheckWarning::ProgressOutOfRange {
            task_id: task.id.clone(),
            progress: task.progress,
        });
    }
}

/// Orders must strictly increase along the depth-first layout.
fn check_order(tasks: &TaskMap, result: &mut CheckResult) {
    let mut last: Option<i64> = None;
    let mut reported = HashSet::new();
    for id in flattened_ids(tasks) {
        let Some(task) = tasks.get(&id) else {
            continue;
        };
        if let Some(prev) = last
            && task.order <= prev
            && reported.insert(id.clone())
        {
            result.warnings.push(CheckWarning::OrderOutOfSequence { task_id: id });
        }
        last = Some(task.order);
    }
}
