//! Applying recorded commands backward (undo) and forward (redo).
//!
//! Replay only copies captured values back; it never re-runs validation
//! or cascades. Entries that name tasks which no longer exist are skipped.

use crate::model::command::{CascadeRecord, CommandParams, DateMove, ParentChange, PlacedTask};
use crate::model::task::{Task, TaskMap};
use crate::store::collab::DependencyStore;

/// Undo `params` against the collection.
pub(crate) fn apply_inverse<D: DependencyStore + ?Sized>(
    params: &CommandParams,
    tasks: &mut TaskMap,
    dependencies: &mut D,
) {
    // cascades were applied last, so they come off first
    restore_cascade(tasks, params.cascade());
    match params {
        CommandParams::AddTask { added, before, .. } => {
            for placed in added {
                tasks.shift_remove(&placed.task.id);
            }
            before.restore(tasks);
        }
        CommandParams::UpdateTask { before, .. } => replace_fields(tasks, before),
        CommandParams::DeleteTask {
            deleted, before, ..
        } => {
            // captured in ascending index order
            for placed in deleted {
                reinsert(tasks, placed);
            }
            before.restore(tasks);
        }
        CommandParams::ReorderTasks { before, .. } => before.restore(tasks),
        CommandParams::IndentTasks {
            changes, before, ..
        }
        | CommandParams::OutdentTasks {
            changes, before, ..
        } => {
            revert_parents(tasks, changes);
            before.restore(tasks);
        }
        CommandParams::GroupTasks {
            group,
            changes,
            before,
            ..
        } => {
            revert_parents(tasks, changes);
            tasks.shift_remove(&group.task.id);
            before.restore(tasks);
        }
        CommandParams::UngroupTasks {
            ungrouped, before, ..
        } => {
            for entry in ungrouped.iter().rev() {
                reinsert(tasks, &entry.summary);
                revert_parents(tasks, &entry.children);
                dependencies.restore_dependencies(&entry.dependencies);
            }
            before.restore(tasks);
        }
        CommandParams::MultiDragTasks { moves, .. } => {
            for DateMove { task_id, before, .. } in moves.iter().rev() {
                if let Some(task) = tasks.get_mut(task_id) {
                    task.set_span(*before);
                }
            }
        }
    }
}

/// Redo `params` against the collection.
pub(crate) fn apply_forward<D: DependencyStore + ?Sized>(
    params: &CommandParams,
    tasks: &mut TaskMap,
    dependencies: &mut D,
) {
    match params {
        CommandParams::AddTask { added, after, .. } => {
            for placed in added {
                reinsert(tasks, placed);
            }
            after.restore(tasks);
        }
        CommandParams::UpdateTask { after, .. } => replace_fields(tasks, after),
        CommandParams::DeleteTask { deleted, after, .. } => {
            for placed in deleted {
                tasks.shift_remove(&placed.task.id);
            }
            after.restore(tasks);
        }
        CommandParams::ReorderTasks { after, .. } => after.restore(tasks),
        CommandParams::IndentTasks { changes, after, .. }
        | CommandParams::OutdentTasks { changes, after, .. } => {
            apply_parents(tasks, changes);
            after.restore(tasks);
        }
        CommandParams::GroupTasks {
            group,
            changes,
            after,
            ..
        } => {
            reinsert(tasks, group);
            apply_parents(tasks, changes);
            after.restore(tasks);
        }
        CommandParams::UngroupTasks {
            ungrouped, after, ..
        } => {
            for entry in ungrouped {
                apply_parents(tasks, &entry.children);
                tasks.shift_remove(&entry.summary.task.id);
                dependencies.remove_dependencies_for_task(&entry.summary.task.id);
            }
            after.restore(tasks);
        }
        CommandParams::MultiDragTasks { moves, .. } => {
            for DateMove { task_id, after, .. } in moves {
                if let Some(task) = tasks.get_mut(task_id) {
                    task.set_span(*after);
                }
            }
        }
    }
    apply_cascade(tasks, params.cascade());
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Put a task back at its captured index (clamped). No-op if the id is taken.
fn reinsert(tasks: &mut TaskMap, placed: &PlacedTask) {
    if tasks.contains_key(&placed.task.id) {
        return;
    }
    let index = placed.index.min(tasks.len());
    tasks.shift_insert(index, placed.task.id.clone(), placed.task.clone());
}

/// Copy a task snapshot's field values over the live task, leaving its
/// place in the hierarchy alone.
fn replace_fields(tasks: &mut TaskMap, snapshot: &Task) {
    if let Some(task) = tasks.get_mut(&snapshot.id) {
        let parent = task.parent.take();
        let order = task.order;
        *task = snapshot.clone();
        task.parent = parent;
        task.order = order;
    }
}

fn revert_parents(tasks: &mut TaskMap, changes: &[ParentChange]) {
    for change in changes.iter().rev() {
        if let Some(task) = tasks.get_mut(&change.task_id) {
            task.parent = change.old_parent.clone();
        }
    }
}

fn apply_parents(tasks: &mut TaskMap, changes: &[ParentChange]) {
    for change in changes {
        if let Some(task) = tasks.get_mut(&change.task_id) {
            task.parent = change.new_parent.clone();
        }
    }
}

fn restore_cascade(tasks: &mut TaskMap, cascade: &[CascadeRecord]) {
    for record in cascade.iter().rev() {
        if let Some(task) = tasks.get_mut(&record.id) {
            task.set_span(record.previous_values);
        }
    }
}

fn apply_cascade(tasks: &mut TaskMap, cascade: &[CascadeRecord]) {
    for record in cascade {
        if let Some(task) = tasks.get_mut(&record.id) {
            task.set_span(record.updates);
        }
    }
}
