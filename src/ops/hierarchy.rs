//! Pure queries and normalizing passes over a task collection.
//!
//! Every traversal tolerates inconsistent data: a `parent` that names a
//! missing task, the task itself, or a task whose own ancestry loops back
//! is read as "no parent", so the task sits at root level.

use std::collections::{HashMap, HashSet, VecDeque};

use indexmap::IndexMap;

use crate::model::command::CascadeRecord;
use crate::model::task::{DateSpan, MAX_TASK_LEVEL, Task, TaskMap, TaskType};
use crate::ops::rules::{TaskError, can_have_children};

/// One row of the flattened (visual) task list
#[derive(Debug, Clone, Copy)]
pub struct FlatTask<'a> {
    pub task: &'a Task,
    pub level: usize,
    pub has_children: bool,
}

// ---------------------------------------------------------------------------
// Parent links
// ---------------------------------------------------------------------------

/// The parent id as the hierarchy sees it.
pub fn effective_parent<'t>(tasks: &TaskMap, task: &'t Task) -> Option<&'t str> {
    let parent = task.parent.as_deref()?;
    if parent == task.id || !tasks.contains_key(parent) || ancestry_loops(tasks, parent, &task.id) {
        return None;
    }
    Some(parent)
}

/// Walk raw parent links upward from `start`; true if they reach `id` or
/// never reach a root.
fn ancestry_loops(tasks: &TaskMap, start: &str, id: &str) -> bool {
    let mut current = start;
    for _ in 0..=tasks.len() {
        if current == id {
            return true;
        }
        match tasks.get(current).and_then(|t| t.parent.as_deref()) {
            Some(next) if tasks.contains_key(next) => current = next,
            _ => return false,
        }
    }
    true
}

/// Depth from the root (root = 0).
pub fn task_level(tasks: &TaskMap, id: &str) -> usize {
    let mut level = 0;
    let Some(mut current) = tasks.get(id) else {
        return 0;
    };
    while let Some(parent) = effective_parent(tasks, current).and_then(|p| tasks.get(p)) {
        level += 1;
        current = parent;
    }
    level
}

/// Ids of every ancestor of `id`, nearest first.
pub fn ancestor_ids(tasks: &TaskMap, id: &str) -> Vec<String> {
    let mut out = Vec::new();
    let mut current = tasks.get(id);
    while let Some(task) = current {
        match effective_parent(tasks, task) {
            Some(parent) => {
                out.push(parent.to_string());
                current = tasks.get(parent);
            }
            None => break,
        }
    }
    out
}

// ---------------------------------------------------------------------------
// Children and descendants
// ---------------------------------------------------------------------------

/// Direct children grouped by parent, each list sorted by `order`.
fn children_index(tasks: &TaskMap) -> HashMap<Option<&str>, Vec<&Task>> {
    let mut index: HashMap<Option<&str>, Vec<&Task>> = HashMap::new();
    for task in tasks.values() {
        index.entry(effective_parent(tasks, task)).or_default().push(task);
    }
    for list in index.values_mut() {
        list.sort_by_key(|t| t.order);
    }
    index
}

/// Direct children of `parent` (`None` = root level), sorted by `order`.
pub fn task_children<'a>(tasks: &'a TaskMap, parent: Option<&str>) -> Vec<&'a Task> {
    let mut children: Vec<&Task> = tasks
        .values()
        .filter(|t| effective_parent(tasks, t) == parent)
        .collect();
    children.sort_by_key(|t| t.order);
    children
}

pub fn has_children(tasks: &TaskMap, id: &str) -> bool {
    tasks
        .values()
        .any(|t| effective_parent(tasks, t) == Some(id))
}

/// The full subtree below `id` (not including `id`), parents before children.
pub fn task_descendants<'a>(tasks: &'a TaskMap, id: &str) -> Vec<&'a Task> {
    let Some(root) = tasks.get(id) else {
        return Vec::new();
    };
    let index = children_index(tasks);
    let mut out = Vec::new();
    let mut seen = HashSet::new();
    let mut queue: VecDeque<&str> = VecDeque::from([root.id.as_str()]);
    while let Some(current) = queue.pop_front() {
        for child in index.get(&Some(current)).into_iter().flatten() {
            if seen.insert(child.id.as_str()) {
                out.push(*child);
                queue.push_back(child.id.as_str());
            }
        }
    }
    out
}

/// Add every descendant id of `id` to `into`.
pub fn collect_descendant_ids(tasks: &TaskMap, id: &str, into: &mut HashSet<String>) {
    for task in task_descendants(tasks, id) {
        into.insert(task.id.clone());
    }
}

/// Levels spanned below `id` (0 for a leaf).
pub fn subtree_height(tasks: &TaskMap, id: &str) -> usize {
    let index = children_index(tasks);
    let mut height = 0;
    let mut seen = HashSet::new();
    let mut queue: VecDeque<(&str, usize)> = VecDeque::from([(id, 0)]);
    while let Some((current, depth)) = queue.pop_front() {
        height = height.max(depth);
        for child in index.get(&Some(current)).into_iter().flatten() {
            if seen.insert(child.id.as_str()) {
                queue.push_back((child.id.as_str(), depth + 1));
            }
        }
    }
    height
}

/// Deepest level reached inside the subtree rooted at `id`.
pub fn max_descendant_level(tasks: &TaskMap, id: &str) -> usize {
    task_level(tasks, id) + subtree_height(tasks, id)
}

// ---------------------------------------------------------------------------
// Reparent validation
// ---------------------------------------------------------------------------

/// True if making `new_parent` the parent of `candidate` would close a
/// loop, i.e. `new_parent` is `candidate` or one of its descendants.
pub fn would_create_circular_hierarchy(
    tasks: &TaskMap,
    candidate: &str,
    new_parent: Option<&str>,
) -> bool {
    let Some(new_parent) = new_parent else {
        return false;
    };
    if new_parent == candidate {
        return true;
    }
    ancestor_ids(tasks, new_parent).iter().any(|a| a == candidate)
}

/// Check that the subtree at `task_id` may move under `new_parent`.
///
/// The whole subtree has to fit under the depth bound, not just the
/// moved task.
pub fn check_reparent(
    tasks: &TaskMap,
    task_id: &str,
    new_parent: Option<&str>,
) -> Result<(), TaskError> {
    if !tasks.contains_key(task_id) {
        return Err(TaskError::NotFound(task_id.to_string()));
    }
    let base_level = match new_parent {
        None => 0,
        Some(parent_id) => {
            let parent = tasks
                .get(parent_id)
                .ok_or_else(|| TaskError::NotFound(parent_id.to_string()))?;
            if !can_have_children(parent) {
                return Err(TaskError::MilestoneCannotParent(parent_id.to_string()));
            }
            if would_create_circular_hierarchy(tasks, task_id, Some(parent_id)) {
                return Err(TaskError::CircularHierarchy {
                    task: task_id.to_string(),
                    parent: parent_id.to_string(),
                });
            }
            task_level(tasks, parent_id) + 1
        }
    };
    if base_level + subtree_height(tasks, task_id) > MAX_TASK_LEVEL {
        return Err(TaskError::MaxDepthExceeded);
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Flattening and order
// ---------------------------------------------------------------------------

/// Depth-first, parent-before-children linearization of the tree.
///
/// Siblings follow `order`; the subtree below any id in `collapsed` is
/// left out (the collapsed row itself is kept).
pub fn build_flattened_task_list<'a>(
    tasks: &'a TaskMap,
    collapsed: &HashSet<String>,
) -> Vec<FlatTask<'a>> {
    let index = children_index(tasks);
    let mut out = Vec::with_capacity(tasks.len());
    let mut seen = HashSet::new();
    flatten_into(&index, None, 0, collapsed, &mut seen, &mut out);
    out
}

fn flatten_into<'a>(
    index: &HashMap<Option<&str>, Vec<&'a Task>>,
    parent: Option<&str>,
    level: usize,
    collapsed: &HashSet<String>,
    seen: &mut HashSet<&'a str>,
    out: &mut Vec<FlatTask<'a>>,
) {
    let Some(children) = index.get(&parent) else {
        return;
    };
    for &task in children {
        if !seen.insert(task.id.as_str()) {
            continue;
        }
        let has_children = index
            .get(&Some(task.id.as_str()))
            .is_some_and(|c| !c.is_empty());
        out.push(FlatTask {
            task,
            level,
            has_children,
        });
        if has_children && !collapsed.contains(&task.id) {
            flatten_into(index, Some(task.id.as_str()), level + 1, collapsed, seen, out);
        }
    }
}

/// Ids in full (uncollapsed) depth-first order.
pub fn flattened_ids(tasks: &TaskMap) -> Vec<String> {
    build_flattened_task_list(tasks, &HashSet::new())
        .iter()
        .map(|row| row.task.id.clone())
        .collect()
}

/// Reassign `order` to match the depth-first traversal, keeping the
/// existing relative order among siblings.
pub fn normalize_task_order(tasks: &mut TaskMap) {
    for (position, id) in flattened_ids(tasks).into_iter().enumerate() {
        if let Some(task) = tasks.get_mut(&id) {
            task.order = position as i64;
        }
    }
}

/// Normalize, then scale every `order` by a stride wider than `room`
/// so callers can slot up to `room` tasks between neighbours.
/// Returns the stride; run `normalize_task_order` afterwards.
pub(crate) fn spread_task_order(tasks: &mut TaskMap, room: usize) -> i64 {
    normalize_task_order(tasks);
    let stride = (tasks.len() + room + 1) as i64;
    for task in tasks.values_mut() {
        task.order *= stride;
    }
    stride
}

// ---------------------------------------------------------------------------
// Summary dates
// ---------------------------------------------------------------------------

/// Min start / max end across the descendants of `summary_id` that carry
/// dates; `None` when none do.
pub fn calculate_summary_dates(tasks: &TaskMap, summary_id: &str) -> Option<DateSpan> {
    span_of(task_descendants(tasks, summary_id))
}

/// Min start / max end across `rows`.
pub fn span_of<'a>(rows: impl IntoIterator<Item = &'a Task>) -> Option<DateSpan> {
    let mut start = None;
    let mut end = None;
    for task in rows {
        if let Some(s) = task.start_date {
            start = Some(start.map_or(s, |cur: chrono::NaiveDate| cur.min(s)));
        }
        if let Some(e) = task.end_date {
            end = Some(end.map_or(e, |cur: chrono::NaiveDate| cur.max(e)));
        }
    }
    match (start, end) {
        (Some(start), Some(end)) => Some(DateSpan::new(Some(start), Some(end.max(start)))),
        _ => None,
    }
}

/// Re-derive summary dates upward from each id in `changed_parent_ids`.
///
/// Each id is walked toward the root. A summary with children is
/// recomputed from the current collection; when its span changes the walk
/// continues with its parent, otherwise it stops there. Non-summary rows
/// are passed through. Summaries touched more than once keep their first
/// `previous_values` and their last `updates`, so the result is one record
/// per summary and a second run over the same input changes nothing.
pub fn recalculate_summary_ancestors<I, S>(
    tasks: &mut TaskMap,
    changed_parent_ids: I,
) -> Vec<CascadeRecord>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let mut records: IndexMap<String, CascadeRecord> = IndexMap::new();
    let mut queue: VecDeque<String> = VecDeque::new();
    let mut pending: HashSet<String> = HashSet::new();
    for id in changed_parent_ids {
        let id = id.into();
        if pending.insert(id.clone()) {
            queue.push_back(id);
        }
    }

    // Bounded: every pass either stops or climbs one level
    let mut budget = (tasks.len() + 1) * (MAX_TASK_LEVEL + 2) + queue.len();
    while let Some(id) = queue.pop_front() {
        pending.remove(&id);
        if budget == 0 {
            tracing::warn!(task = %id, "summary cascade did not settle");
            break;
        }
        budget -= 1;

        let Some(task) = tasks.get(&id) else {
            continue;
        };
        let parent = effective_parent(tasks, task).map(str::to_string);

        if task.kind == TaskType::Summary && has_children(tasks, &id) {
            let current = task.span();
            let Some(span) = calculate_summary_dates(tasks, &id) else {
                continue;
            };
            if span == current {
                continue;
            }
            if let Some(task) = tasks.get_mut(&id) {
                task.set_span(span);
            }
            records
                .entry(id.clone())
                .and_modify(|r| r.updates = span)
                .or_insert_with(|| CascadeRecord {
                    id: id.clone(),
                    updates: span,
                    previous_values: current,
                });
        }

        if let Some(parent) = parent
            && pending.insert(parent.clone())
        {
            queue.push_back(parent);
        }
    }

    records.into_values().collect()
}
