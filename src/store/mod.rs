//! The task store: sole owner of the task collection, the selection and
//! the command log.
//!
//! Every mutating operation follows the same sequence: validate against
//! the current collection, mutate, cascade summary dates, record one
//! command, notify the dirty tracker. A rejected operation returns
//! `Err` before the mutate step, so nothing is changed, recorded or
//! notified.

pub mod collab;
pub mod history;
mod replay;
mod structure;

use std::collections::HashSet;

use chrono::NaiveDate;
use indexmap::{IndexMap, IndexSet};
use serde::{Deserialize, Serialize};

use crate::model::command::{Command, CommandParams, DateMove, HierarchySnapshot, PlacedTask};
use crate::model::config::EditorConfig;
use crate::model::task::{
    DateSpan, MAX_TASK_LEVEL, NewTask, Task, TaskMap, TaskType, TaskUpdate,
};
use crate::ops::hierarchy::{
    FlatTask, ancestor_ids, build_flattened_task_list, calculate_summary_dates, check_reparent,
    collect_descendant_ids, effective_parent, flattened_ids, has_children, normalize_task_order,
    recalculate_summary_ancestors, task_children, task_level,
};
use crate::ops::rules::{
    TaskError, apply_type_change, can_have_children, ensure_date_order, resolve_span,
};

pub use collab::{DependencyLinks, DependencyStore, DirtyFlag, DirtyTracker};
pub use history::{CommandLog, DEFAULT_UNDO_LIMIT, ReplayGuard, ReplayMode};

/// Editable column of the task grid
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Column {
    #[default]
    Name,
    StartDate,
    EndDate,
    Duration,
    Progress,
}

/// The focused grid cell. Its task is the fallback target of selection
/// operations when nothing is multi-selected.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActiveCell {
    pub task_id: String,
    pub column: Column,
}

/// New dates for one task in a batch (multi-task drag)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DateChange {
    pub task_id: String,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
}

impl DateChange {
    pub fn new(task_id: impl Into<String>, start: NaiveDate, end: NaiveDate) -> Self {
        DateChange {
            task_id: task_id.into(),
            start_date: Some(start),
            end_date: Some(end),
        }
    }
}

pub struct TaskStore<D = DependencyLinks, P = DirtyFlag> {
    tasks: TaskMap,
    selected: IndexSet<String>,
    /// Fixed end of shift-click range selection
    anchor: Option<String>,
    active_cell: Option<ActiveCell>,
    history: CommandLog,
    config: EditorConfig,
    dependencies: D,
    tracker: P,
}

impl TaskStore {
    /// Store with in-memory collaborators and default configuration
    pub fn new() -> Self {
        TaskStore::with_collaborators(
            DependencyLinks::default(),
            DirtyFlag::default(),
            EditorConfig::default(),
        )
    }
}

impl Default for TaskStore {
    fn default() -> Self {
        TaskStore::new()
    }
}

impl<D: DependencyStore, P: DirtyTracker> TaskStore<D, P> {
    pub fn with_collaborators(dependencies: D, tracker: P, config: EditorConfig) -> Self {
        TaskStore {
            tasks: TaskMap::new(),
            selected: IndexSet::new(),
            anchor: None,
            active_cell: None,
            history: CommandLog::new(config.editor.undo_limit),
            config,
            dependencies,
            tracker,
        }
    }

    // -----------------------------------------------------------------------
    // Reads
    // -----------------------------------------------------------------------

    pub fn tasks(&self) -> &TaskMap {
        &self.tasks
    }

    pub fn task(&self, id: &str) -> Option<&Task> {
        self.tasks.get(id)
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    pub fn config(&self) -> &EditorConfig {
        &self.config
    }

    pub fn dependencies(&self) -> &D {
        &self.dependencies
    }

    /// Direct access for link editing; changes made here are not recorded
    pub fn dependencies_mut(&mut self) -> &mut D {
        &mut self.dependencies
    }

    pub fn dirty_tracker(&self) -> &P {
        &self.tracker
    }

    pub fn dirty_tracker_mut(&mut self) -> &mut P {
        &mut self.tracker
    }

    /// Ids of rows whose subtree is hidden
    pub fn collapsed_ids(&self) -> HashSet<String> {
        self.tasks
            .values()
            .filter(|t| !t.is_open())
            .map(|t| t.id.clone())
            .collect()
    }

    /// The visual row list, honoring collapse state
    pub fn visible_tasks(&self) -> Vec<FlatTask<'_>> {
        build_flattened_task_list(&self.tasks, &self.collapsed_ids())
    }

    /// Every row in depth-first order, ignoring collapse state
    pub fn flattened_tasks(&self) -> Vec<FlatTask<'_>> {
        build_flattened_task_list(&self.tasks, &HashSet::new())
    }

    // -----------------------------------------------------------------------
    // Load
    // -----------------------------------------------------------------------

    /// Replace the whole collection (load/import). Selection and history
    /// are dropped. Duplicate ids keep the last occurrence.
    pub fn set_tasks(&mut self, tasks: impl IntoIterator<Item = Task>) {
        let mut map = TaskMap::new();
        for task in tasks {
            let id = task.id.clone();
            if map.insert(id.clone(), task).is_some() {
                tracing::warn!(task = %id, "duplicate task id on load, keeping the last one");
            }
        }
        for task in map.values() {
            if task.parent.is_some() && effective_parent(&map, task).is_none() {
                tracing::warn!(
                    task = %task.id,
                    parent = task.parent.as_deref().unwrap_or_default(),
                    "parent is missing or circular, treating task as root"
                );
            }
        }
        tracing::debug!(count = map.len(), "tasks replaced");
        self.tasks = map;
        self.selected.clear();
        self.anchor = None;
        self.active_cell = None;
        self.history.clear();
    }

    // -----------------------------------------------------------------------
    // Task CRUD
    // -----------------------------------------------------------------------

    /// Append a task with a fresh id. It becomes the last child of its
    /// parent (or the last root row).
    pub fn add_task(&mut self, data: NewTask) -> Result<String, TaskError> {
        if let Some(parent_id) = data.parent.as_deref() {
            let parent = self.require(parent_id)?;
            if !can_have_children(parent) {
                return Err(TaskError::MilestoneCannotParent(parent_id.to_string()));
            }
            if task_level(&self.tasks, parent_id) + 1 > MAX_TASK_LEVEL {
                return Err(TaskError::MaxDepthExceeded);
            }
        }

        let id = new_id();
        let span = match data.kind {
            TaskType::Milestone => DateSpan::milestone(data.start_date.or(data.end_date)),
            _ => DateSpan::new(data.start_date, data.end_date),
        };
        ensure_date_order(&id, &span)?;

        let before = HierarchySnapshot::capture(&self.tasks);
        let order = self.tasks.values().map(|t| t.order).max().map_or(0, |m| m.saturating_add(1));
        let color = data
            .color
            .unwrap_or_else(|| self.config.colors.for_kind(data.kind).to_string());
        let open = match data.kind {
            TaskType::Summary => data.open.or(Some(true)),
            _ => data.open,
        };
        let mut task = Task {
            id: id.clone(),
            name: data.name,
            start_date: None,
            end_date: None,
            duration: 0,
            progress: data.progress.min(100),
            color,
            order,
            kind: data.kind,
            parent: data.parent.clone(),
            open,
            metadata: data.metadata,
        };
        task.set_span(span);
        let description = format!("Add task \"{}\"", task.name);
        let placed = PlacedTask {
            index: self.tasks.len(),
            task: task.clone(),
        };

        self.tasks.insert(id.clone(), task);
        normalize_task_order(&mut self.tasks);
        let cascade = recalculate_summary_ancestors(&mut self.tasks, data.parent);
        tracing::debug!(task = %id, "added task");

        let params = CommandParams::AddTask {
            added: vec![placed],
            cascade,
            before,
            after: HierarchySnapshot::capture(&self.tasks),
        };
        self.commit(description, params);
        Ok(id)
    }

    /// Apply a partial edit to one task.
    ///
    /// Type changes carry their side effects; a summary with children
    /// keeps dates derived from them. An edit that changes nothing is not
    /// recorded.
    pub fn update_task(&mut self, id: &str, update: TaskUpdate) -> Result<(), TaskError> {
        let before = self.require(id)?.clone();
        let children = has_children(&self.tasks, id);
        let mut task = before.clone();

        if let Some(kind) = update.kind {
            apply_type_change(
                &mut task,
                kind,
                children,
                self.config.editor.default_duration_days,
            )?;
        }
        if update.touches_dates() {
            let span = resolve_span(
                task.kind,
                task.span(),
                update.start_date,
                update.end_date,
                update.duration,
            );
            ensure_date_order(id, &span)?;
            task.set_span(span);
        }
        if task.kind == TaskType::Summary
            && children
            && let Some(span) = calculate_summary_dates(&self.tasks, id)
        {
            task.set_span(span);
        }
        if let Some(name) = update.name {
            task.name = name;
        }
        if let Some(progress) = update.progress {
            task.progress = if task.kind == TaskType::Milestone {
                0
            } else {
                progress.min(100)
            };
        }
        if let Some(color) = update.color {
            task.color = color;
        }
        if let Some(open) = update.open {
            task.open = Some(open);
        }
        if let Some(metadata) = update.metadata {
            task.metadata = metadata;
        }

        if task == before {
            return Ok(());
        }

        let reshaped = task.span() != before.span() || task.kind != before.kind;
        let parent = effective_parent(&self.tasks, &before).map(str::to_string);
        let after = task.clone();
        if let Some(slot) = self.tasks.get_mut(id) {
            *slot = task;
        }
        let cascade = if reshaped {
            recalculate_summary_ancestors(&mut self.tasks, parent)
        } else {
            Vec::new()
        };
        tracing::debug!(task = %id, cascaded = cascade.len(), "updated task");

        let description = format!("Update task \"{}\"", after.name);
        let params = CommandParams::UpdateTask {
            task_id: id.to_string(),
            before,
            after,
            cascade,
        };
        self.commit(description, params);
        Ok(())
    }

    /// Move several tasks' dates at once, cascading once over the union
    /// of affected parents. The whole batch is rejected if any entry is.
    pub fn update_multiple_tasks(&mut self, changes: &[DateChange]) -> Result<(), TaskError> {
        let mut moves: IndexMap<String, DateMove> = IndexMap::new();
        for change in changes {
            let task = self.require(&change.task_id)?;
            let current = moves
                .get(&task.id)
                .map_or_else(|| task.span(), |m| m.after);
            let span = resolve_span(task.kind, current, change.start_date, change.end_date, None);
            ensure_date_order(&task.id, &span)?;
            moves
                .entry(task.id.clone())
                .and_modify(|m| m.after = span)
                .or_insert_with(|| DateMove {
                    task_id: task.id.clone(),
                    before: task.span(),
                    after: span,
                });
        }
        moves.retain(|_, m| m.before != m.after);
        if moves.is_empty() {
            return Ok(());
        }

        let mut working: IndexSet<String> = IndexSet::new();
        for mv in moves.values() {
            let Some(task) = self.tasks.get(&mv.task_id) else {
                continue;
            };
            // a summary with children snaps back to its children's span
            if task.kind == TaskType::Summary && has_children(&self.tasks, &task.id) {
                working.insert(task.id.clone());
            }
            if let Some(parent) = effective_parent(&self.tasks, task) {
                working.insert(parent.to_string());
            }
        }
        for mv in moves.values() {
            if let Some(task) = self.tasks.get_mut(&mv.task_id) {
                task.set_span(mv.after);
            }
        }
        let cascade = recalculate_summary_ancestors(&mut self.tasks, working);

        let moves: Vec<DateMove> = moves.into_values().collect();
        let description = match moves.as_slice() {
            [single] => format!("Move task \"{}\"", self.name_of(&single.task_id)),
            many => format!("Move {} tasks", many.len()),
        };
        tracing::debug!(count = moves.len(), cascaded = cascade.len(), "moved task dates");
        self.commit(description, CommandParams::MultiDragTasks { moves, cascade });
        Ok(())
    }

    /// Delete one task. With `cascade` its whole subtree goes with it;
    /// without, its children move up to its former parent.
    /// Returns the number of tasks removed.
    pub fn delete_task(&mut self, id: &str, cascade: bool) -> Result<usize, TaskError> {
        let name = self.require(id)?.name.clone();
        let mut doomed = HashSet::from([id.to_string()]);
        if cascade {
            collect_descendant_ids(&self.tasks, id, &mut doomed);
        }
        let description = if doomed.len() > 1 {
            format!("Delete \"{}\" and {} subtasks", name, doomed.len() - 1)
        } else {
            format!("Delete task \"{}\"", name)
        };
        Ok(self.delete_ids(&doomed, description))
    }

    /// Delete the effective selection together with every descendant, as
    /// one command. Returns the number of tasks removed.
    pub fn delete_selected_tasks(&mut self) -> Result<usize, TaskError> {
        let selection = self.effective_selection();
        if selection.is_empty() {
            return Err(TaskError::EmptySelection);
        }
        let mut doomed = HashSet::new();
        for id in &selection {
            doomed.insert(id.clone());
            collect_descendant_ids(&self.tasks, id, &mut doomed);
        }
        let description = format!("Delete {} tasks", doomed.len());
        Ok(self.delete_ids(&doomed, description))
    }

    fn delete_ids(&mut self, doomed: &HashSet<String>, description: String) -> usize {
        let before = HierarchySnapshot::capture(&self.tasks);
        let deleted: Vec<PlacedTask> = self
            .tasks
            .values()
            .enumerate()
            .filter(|(_, t)| doomed.contains(&t.id))
            .map(|(index, t)| PlacedTask {
                index,
                task: t.clone(),
            })
            .collect();

        // survivors hanging off a deleted task move up to the nearest
        // surviving ancestor, at the deleted task's position
        normalize_task_order(&mut self.tasks);
        let mut working: IndexSet<String> = IndexSet::new();
        let mut promotions = Vec::new();
        for task in self.tasks.values() {
            if doomed.contains(&task.id) {
                if let Some(parent) = effective_parent(&self.tasks, task)
                    && !doomed.contains(parent)
                {
                    working.insert(parent.to_string());
                }
                continue;
            }
            let Some(parent) = effective_parent(&self.tasks, task) else {
                continue;
            };
            if doomed.contains(parent) {
                let survivor = ancestor_ids(&self.tasks, &task.id)
                    .into_iter()
                    .find(|a| !doomed.contains(a));
                promotions.push((task.id.clone(), survivor));
            }
        }
        for (id, parent) in promotions {
            if let Some(task) = self.tasks.get_mut(&id) {
                task.parent = parent;
            }
        }

        self.tasks.retain(|id, _| !doomed.contains(id));
        normalize_task_order(&mut self.tasks);
        let cascade = recalculate_summary_ancestors(&mut self.tasks, working);
        tracing::debug!(count = deleted.len(), cascaded = cascade.len(), "deleted tasks");

        let count = deleted.len();
        let params = CommandParams::DeleteTask {
            deleted,
            cascade,
            before,
            after: HierarchySnapshot::capture(&self.tasks),
        };
        self.commit(description, params);
        count
    }

    /// Drag-and-drop move of `active_id` next to `over_id`.
    ///
    /// `active` joins `over`'s parent and lands right after `over` when it
    /// was above it in the visual list, right before it otherwise.
    pub fn reorder_tasks(&mut self, active_id: &str, over_id: &str) -> Result<(), TaskError> {
        let active = self.require(active_id)?;
        let over = self.require(over_id)?;
        if active_id == over_id {
            return Ok(());
        }
        let old_parent = effective_parent(&self.tasks, active).map(str::to_string);
        let new_parent = effective_parent(&self.tasks, over).map(str::to_string);
        if new_parent != old_parent {
            check_reparent(&self.tasks, active_id, new_parent.as_deref())?;
        }
        let name = active.name.clone();

        let visual = flattened_ids(&self.tasks);
        let position = |id: &str| visual.iter().position(|v| v == id);
        let was_above = position(active_id) < position(over_id);

        let before = HierarchySnapshot::capture(&self.tasks);
        let mut siblings: Vec<String> = task_children(&self.tasks, new_parent.as_deref())
            .into_iter()
            .filter(|t| t.id != active_id)
            .map(|t| t.id.clone())
            .collect();
        let over_index = siblings
            .iter()
            .position(|s| s == over_id)
            .unwrap_or(siblings.len());
        let insert_at = if was_above {
            (over_index + 1).min(siblings.len())
        } else {
            over_index
        };
        siblings.insert(insert_at, active_id.to_string());

        if let Some(task) = self.tasks.get_mut(active_id) {
            task.parent = new_parent.clone();
        }
        for (order, id) in siblings.iter().enumerate() {
            if let Some(task) = self.tasks.get_mut(id) {
                task.order = order as i64;
            }
        }
        normalize_task_order(&mut self.tasks);
        let after = HierarchySnapshot::capture(&self.tasks);
        if after == before {
            return Ok(());
        }

        let cascade = if new_parent != old_parent {
            recalculate_summary_ancestors(
                &mut self.tasks,
                old_parent.iter().chain(new_parent.iter()).cloned(),
            )
        } else {
            Vec::new()
        };
        tracing::debug!(task = %active_id, over = %over_id, "reordered task");

        let params = CommandParams::ReorderTasks {
            task_id: active_id.to_string(),
            old_parent,
            new_parent,
            cascade,
            before,
            after,
        };
        self.commit(format!("Move task \"{}\"", name), params);
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Collapse state (view state: marks dirty, not recorded)
    // -----------------------------------------------------------------------

    /// Flip a row's expanded state; returns the new state
    pub fn toggle_collapse(&mut self, id: &str) -> Result<bool, TaskError> {
        let open = !self.require(id)?.is_open();
        self.set_open(id, open)?;
        Ok(open)
    }

    pub fn set_open(&mut self, id: &str, open: bool) -> Result<(), TaskError> {
        let task = self
            .tasks
            .get_mut(id)
            .ok_or_else(|| TaskError::NotFound(id.to_string()))?;
        if task.open != Some(open) {
            task.open = Some(open);
            self.tracker.mark_dirty();
        }
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Selection
    // -----------------------------------------------------------------------

    /// Selected ids in the order they were selected
    pub fn selected_task_ids(&self) -> &IndexSet<String> {
        &self.selected
    }

    pub fn is_selected(&self, id: &str) -> bool {
        self.selected.contains(id)
    }

    /// Replace the selection. Unknown ids are dropped.
    pub fn set_selected_task_ids<I, S>(&mut self, ids: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.selected = ids
            .into_iter()
            .map(Into::into)
            .filter(|id| self.tasks.contains_key(id))
            .collect();
        self.anchor = self.selected.last().cloned();
    }

    /// Add or remove one id (ctrl-click)
    pub fn toggle_selection(&mut self, id: &str) {
        if !self.tasks.contains_key(id) {
            return;
        }
        if !self.selected.shift_remove(id) {
            self.selected.insert(id.to_string());
        }
        self.anchor = Some(id.to_string());
    }

    /// Select every visible row between `anchor` and `target`, inclusive
    /// (shift-click). Falls back to just `target` when `anchor` is not
    /// visible.
    pub fn select_range(&mut self, anchor: &str, target: &str) {
        let rows: Vec<String> = self
            .visible_tasks()
            .iter()
            .map(|row| row.task.id.clone())
            .collect();
        let from = rows.iter().position(|id| id == anchor);
        let to = rows.iter().position(|id| id == target);
        self.selected = match (from, to) {
            (Some(from), Some(to)) => {
                let (lo, hi) = if from <= to { (from, to) } else { (to, from) };
                rows[lo..=hi].iter().cloned().collect()
            }
            (None, Some(to)) => IndexSet::from([rows[to].clone()]),
            _ => IndexSet::new(),
        };
        self.anchor = from.map(|_| anchor.to_string());
    }

    /// Extend from the last clicked row to `target`
    pub fn select_range_to(&mut self, target: &str) {
        match self.anchor.clone() {
            Some(anchor) => self.select_range(&anchor, target),
            None => self.set_selected_task_ids([target]),
        }
    }

    pub fn clear_selection(&mut self) {
        self.selected.clear();
        self.anchor = None;
    }

    pub fn active_cell(&self) -> Option<&ActiveCell> {
        self.active_cell.as_ref()
    }

    pub fn set_active_cell(&mut self, task_id: &str, column: Column) -> Result<(), TaskError> {
        self.require(task_id)?;
        self.active_cell = Some(ActiveCell {
            task_id: task_id.to_string(),
            column,
        });
        Ok(())
    }

    pub fn clear_active_cell(&mut self) {
        self.active_cell = None;
    }

    /// What selection operations act on: the multi-selection, or else
    /// the active cell's task.
    pub fn effective_selection(&self) -> Vec<String> {
        if !self.selected.is_empty() {
            return self
                .selected
                .iter()
                .filter(|id| self.tasks.contains_key(*id))
                .cloned()
                .collect();
        }
        self.active_cell
            .as_ref()
            .filter(|cell| self.tasks.contains_key(&cell.task_id))
            .map(|cell| vec![cell.task_id.clone()])
            .unwrap_or_default()
    }

    fn prune_selection(&mut self) {
        let tasks = &self.tasks;
        self.selected.retain(|id| tasks.contains_key(id));
        if self.anchor.as_ref().is_some_and(|id| !tasks.contains_key(id)) {
            self.anchor = None;
        }
        if self
            .active_cell
            .as_ref()
            .is_some_and(|cell| !tasks.contains_key(&cell.task_id))
        {
            self.active_cell = None;
        }
    }

    // -----------------------------------------------------------------------
    // Undo / redo
    // -----------------------------------------------------------------------

    pub fn history(&self) -> &CommandLog {
        &self.history
    }

    /// Swap in a log restored from disk
    pub fn set_history(&mut self, history: CommandLog) {
        self.history = history;
    }

    pub fn clear_history(&mut self) {
        self.history.clear();
    }

    pub fn can_undo(&self) -> bool {
        self.history.can_undo()
    }

    pub fn can_redo(&self) -> bool {
        self.history.can_redo()
    }

    pub fn undo_description(&self) -> Option<&str> {
        self.history.undo_description()
    }

    pub fn redo_description(&self) -> Option<&str> {
        self.history.redo_description()
    }

    /// Reverse the most recent command; returns its description
    pub fn undo(&mut self) -> Option<String> {
        let command = self.history.pop_undo()?;
        {
            let _replay = self.history.enter(ReplayMode::Undoing);
            replay::apply_inverse(&command.params, &mut self.tasks, &mut self.dependencies);
        }
        tracing::debug!(kind = %command.kind(), "undid command");
        let description = command.description.clone();
        self.history.push_redo(command);
        self.prune_selection();
        self.tracker.mark_dirty();
        Some(description)
    }

    /// Re-apply the most recently undone command; returns its description
    pub fn redo(&mut self) -> Option<String> {
        let command = self.history.pop_redo()?;
        {
            let _replay = self.history.enter(ReplayMode::Redoing);
            replay::apply_forward(&command.params, &mut self.tasks, &mut self.dependencies);
        }
        tracing::debug!(kind = %command.kind(), "redid command");
        let description = command.description.clone();
        self.history.push_undo(command);
        self.prune_selection();
        self.tracker.mark_dirty();
        Some(description)
    }

    // -----------------------------------------------------------------------
    // Internals
    // -----------------------------------------------------------------------

    fn require(&self, id: &str) -> Result<&Task, TaskError> {
        self.tasks.get(id).ok_or_else(|| {
            tracing::warn!(task = id, "operation on unknown task");
            TaskError::NotFound(id.to_string())
        })
    }

    fn name_of(&self, id: &str) -> String {
        self.tasks.get(id).map(|t| t.name.clone()).unwrap_or_default()
    }

    /// Record, tidy the selection and notify, in that order
    fn commit(&mut self, description: String, params: CommandParams) {
        self.history.record(Command::new(description, params));
        self.prune_selection();
        self.tracker.mark_dirty();
    }
}

fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

fn today() -> NaiveDate {
    chrono::Local::now().date_naive()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(&format!("2025-{}", s), "%Y-%m-%d").unwrap()
    }

    fn add(store: &mut TaskStore, name: &str, start: &str, end: &str) -> String {
        store
            .add_task(NewTask::dated(name, date(start), date(end)))
            .unwrap()
    }

    fn add_child(store: &mut TaskStore, parent: &str, name: &str, start: &str, end: &str) -> String {
        let mut data = NewTask::dated(name, date(start), date(end));
        data.parent = Some(parent.to_string());
        store.add_task(data).unwrap()
    }

    fn summary(store: &mut TaskStore, name: &str) -> String {
        store
            .add_task(NewTask {
                name: name.into(),
                kind: TaskType::Summary,
                ..Default::default()
            })
            .unwrap()
    }

    #[test]
    fn test_add_task_assigns_id_order_and_color() {
        let mut store = TaskStore::new();
        let a = add(&mut store, "A", "01-01", "01-05");
        let b = add(&mut store, "B", "01-06", "01-10");
        assert_ne!(a, b);
        assert_eq!(store.task(&a).unwrap().order, 0);
        assert_eq!(store.task(&b).unwrap().order, 1);
        assert_eq!(store.task(&a).unwrap().duration, 5);
        assert_eq!(store.task(&a).unwrap().color, store.config().colors.task);
        assert_eq!(store.history().undo_stack().len(), 2);
        assert!(store.dirty_tracker().is_dirty());
    }

    #[test]
    fn test_add_task_under_milestone_rejected() {
        let mut store = TaskStore::new();
        let m = store
            .add_task(NewTask {
                name: "Ship".into(),
                kind: TaskType::Milestone,
                start_date: Some(date("02-01")),
                ..Default::default()
            })
            .unwrap();
        store.dirty_tracker_mut().clear();
        let mut data = NewTask::named("child");
        data.parent = Some(m.clone());
        assert_eq!(
            store.add_task(data),
            Err(TaskError::MilestoneCannotParent(m))
        );
        assert_eq!(store.len(), 1);
        assert_eq!(store.history().undo_stack().len(), 1);
        assert!(!store.dirty_tracker().is_dirty());
    }

    #[test]
    fn test_add_child_cascades_into_summary() {
        let mut store = TaskStore::new();
        let s = summary(&mut store, "Phase");
        add_child(&mut store, &s, "One", "01-01", "01-03");
        add_child(&mut store, &s, "Two", "01-10", "01-12");
        let phase = store.task(&s).unwrap();
        assert_eq!(phase.start_date, Some(date("01-01")));
        assert_eq!(phase.end_date, Some(date("01-12")));
        assert_eq!(phase.open, Some(true));
    }

    #[test]
    fn test_add_at_max_depth_rejected() {
        let mut store = TaskStore::new();
        let a = summary(&mut store, "L0");
        let b = add_child(&mut store, &a, "L1", "01-01", "01-02");
        let c = add_child(&mut store, &b, "L2", "01-01", "01-02");
        let mut data = NewTask::named("L3");
        data.parent = Some(c);
        assert_eq!(store.add_task(data), Err(TaskError::MaxDepthExceeded));
    }

    #[test]
    fn test_update_with_no_change_is_not_recorded() {
        let mut store = TaskStore::new();
        let a = add(&mut store, "A", "01-01", "01-05");
        let recorded = store.history().undo_stack().len();
        store
            .update_task(
                &a,
                TaskUpdate {
                    name: Some("A".into()),
                    ..Default::default()
                },
            )
            .unwrap();
        assert_eq!(store.history().undo_stack().len(), recorded);
    }

    #[test]
    fn test_update_unknown_task_is_rejected() {
        let mut store = TaskStore::new();
        assert_eq!(
            store.update_task("nope", TaskUpdate::default()),
            Err(TaskError::NotFound("nope".into()))
        );
        assert!(!store.can_undo());
    }

    #[test]
    fn test_inverted_dates_rejected() {
        let mut store = TaskStore::new();
        let a = add(&mut store, "A", "01-05", "01-09");
        let err = store
            .update_task(
                &a,
                TaskUpdate {
                    end_date: Some(date("01-01")),
                    ..Default::default()
                },
            )
            .unwrap_err();
        assert!(matches!(err, TaskError::InvalidDateRange { .. }));
        assert_eq!(store.task(&a).unwrap().end_date, Some(date("01-09")));
    }

    #[test]
    fn test_duration_edit_moves_end() {
        let mut store = TaskStore::new();
        let a = add(&mut store, "A", "01-01", "01-05");
        store
            .update_task(
                &a,
                TaskUpdate {
                    duration: Some(10),
                    ..Default::default()
                },
            )
            .unwrap();
        assert_eq!(store.task(&a).unwrap().end_date, Some(date("01-10")));
    }

    #[test]
    fn test_milestone_with_children_conversion_rejected() {
        let mut store = TaskStore::new();
        let s = summary(&mut store, "S");
        add_child(&mut store, &s, "c", "01-01", "01-02");
        let before = store.tasks().clone();
        let err = store
            .update_task(
                &s,
                TaskUpdate {
                    kind: Some(TaskType::Milestone),
                    ..Default::default()
                },
            )
            .unwrap_err();
        assert_eq!(err, TaskError::MilestoneHasChildren(s));
        assert_eq!(store.tasks(), &before);
    }

    #[test]
    fn test_switching_to_summary_rederives_dates() {
        let mut store = TaskStore::new();
        let p = add(&mut store, "P", "03-01", "03-02");
        add_child(&mut store, &p, "c", "01-01", "01-09");
        store
            .update_task(
                &p,
                TaskUpdate {
                    kind: Some(TaskType::Summary),
                    ..Default::default()
                },
            )
            .unwrap();
        let task = store.task(&p).unwrap();
        assert_eq!(task.start_date, Some(date("01-01")));
        assert_eq!(task.end_date, Some(date("01-09")));
        assert_eq!(task.open, Some(true));

        store.undo();
        let task = store.task(&p).unwrap();
        assert_eq!(task.kind, TaskType::Task);
        assert_eq!(task.start_date, Some(date("03-01")));
    }

    #[test]
    fn test_multi_drag_cascades_once() {
        let mut store = TaskStore::new();
        let s = summary(&mut store, "S");
        let a = add_child(&mut store, &s, "a", "01-01", "01-03");
        let b = add_child(&mut store, &s, "b", "01-04", "01-06");
        let recorded = store.history().undo_stack().len();

        store
            .update_multiple_tasks(&[
                DateChange::new(&a, date("01-02"), date("01-04")),
                DateChange::new(&b, date("01-05"), date("01-08")),
            ])
            .unwrap();
        assert_eq!(store.history().undo_stack().len(), recorded + 1);
        let cmd = store.history().peek_last_undo().unwrap();
        assert_eq!(cmd.params.cascade().len(), 1);
        assert_eq!(store.task(&s).unwrap().start_date, Some(date("01-02")));
        assert_eq!(store.task(&s).unwrap().end_date, Some(date("01-08")));

        store.undo();
        assert_eq!(store.task(&s).unwrap().start_date, Some(date("01-01")));
        assert_eq!(store.task(&b).unwrap().end_date, Some(date("01-06")));
    }

    #[test]
    fn test_multi_drag_rejects_whole_batch() {
        let mut store = TaskStore::new();
        let a = add(&mut store, "a", "01-01", "01-03");
        let b = add(&mut store, "b", "01-04", "01-06");
        let before = store.tasks().clone();
        let result = store.update_multiple_tasks(&[
            DateChange::new(&a, date("01-02"), date("01-04")),
            DateChange::new(&b, date("01-09"), date("01-05")),
        ]);
        assert!(result.is_err());
        assert_eq!(store.tasks(), &before);
    }

    #[test]
    fn test_non_cascading_delete_promotes_children() {
        let mut store = TaskStore::new();
        let s = summary(&mut store, "S");
        let c1 = add_child(&mut store, &s, "c1", "01-01", "01-02");
        let c2 = add_child(&mut store, &s, "c2", "01-03", "01-04");
        let r = add(&mut store, "R", "01-05", "01-06");

        assert_eq!(store.delete_task(&s, false), Ok(1));
        assert_eq!(store.task(&c1).unwrap().parent, None);
        let order: Vec<String> = store
            .flattened_tasks()
            .iter()
            .map(|row| row.task.id.clone())
            .collect();
        assert_eq!(order, vec![c1.clone(), c2.clone(), r]);

        store.undo();
        assert_eq!(store.task(&c2).unwrap().parent.as_deref(), Some(s.as_str()));
    }

    #[test]
    fn test_delete_prunes_selection() {
        let mut store = TaskStore::new();
        let a = add(&mut store, "A", "01-01", "01-02");
        let b = add(&mut store, "B", "01-01", "01-02");
        store.set_selected_task_ids([a.clone(), b.clone()]);
        store.set_active_cell(&a, Column::Name).unwrap();
        store.delete_task(&a, true).unwrap();
        assert_eq!(store.selected_task_ids().len(), 1);
        assert!(store.is_selected(&b));
        assert!(store.active_cell().is_none());
    }

    #[test]
    fn test_delete_selected_includes_descendants() {
        let mut store = TaskStore::new();
        let s = summary(&mut store, "S");
        add_child(&mut store, &s, "c", "01-01", "01-02");
        add(&mut store, "keep", "01-01", "01-02");
        store.set_selected_task_ids([s]);
        assert_eq!(store.delete_selected_tasks(), Ok(2));
        assert_eq!(store.len(), 1);

        store.clear_selection();
        assert_eq!(store.delete_selected_tasks(), Err(TaskError::EmptySelection));
    }

    #[test]
    fn test_reorder_moves_within_siblings() {
        let mut store = TaskStore::new();
        let a = add(&mut store, "A", "01-01", "01-02");
        let b = add(&mut store, "B", "01-01", "01-02");
        let c = add(&mut store, "C", "01-01", "01-02");

        // A was above C, so it lands after C
        store.reorder_tasks(&a, &c).unwrap();
        let ids: Vec<String> = store.flattened_tasks().iter().map(|r| r.task.id.clone()).collect();
        assert_eq!(ids, vec![b.clone(), c.clone(), a.clone()]);

        // A is now below B, so it lands before B
        store.reorder_tasks(&a, &b).unwrap();
        let ids: Vec<String> = store.flattened_tasks().iter().map(|r| r.task.id.clone()).collect();
        assert_eq!(ids, vec![a, b, c]);
    }

    #[test]
    fn test_reorder_into_own_subtree_rejected() {
        let mut store = TaskStore::new();
        let s = summary(&mut store, "S");
        let c = add_child(&mut store, &s, "c", "01-01", "01-02");
        let g = add_child(&mut store, &c, "g", "01-01", "01-02");
        let recorded = store.history().undo_stack().len();
        assert!(matches!(
            store.reorder_tasks(&s, &g),
            Err(TaskError::CircularHierarchy { .. })
        ));
        assert_eq!(store.history().undo_stack().len(), recorded);
    }

    #[test]
    fn test_reorder_across_parents_cascades_both() {
        let mut store = TaskStore::new();
        let s1 = summary(&mut store, "S1");
        let a = add_child(&mut store, &s1, "a", "01-01", "01-02");
        add_child(&mut store, &s1, "b", "01-05", "01-06");
        let s2 = summary(&mut store, "S2");
        let c = add_child(&mut store, &s2, "c", "02-01", "02-02");

        store.reorder_tasks(&a, &c).unwrap();
        assert_eq!(store.task(&a).unwrap().parent.as_deref(), Some(s2.as_str()));
        assert_eq!(store.task(&s1).unwrap().start_date, Some(date("01-05")));
        assert_eq!(store.task(&s2).unwrap().start_date, Some(date("01-01")));
    }

    #[test]
    fn test_collapse_hides_descendants() {
        let mut store = TaskStore::new();
        let s = summary(&mut store, "S");
        add_child(&mut store, &s, "c", "01-01", "01-02");
        assert_eq!(store.visible_tasks().len(), 2);
        assert_eq!(store.toggle_collapse(&s), Ok(false));
        assert_eq!(store.visible_tasks().len(), 1);
        assert!(store.collapsed_ids().contains(&s));
        assert_eq!(store.flattened_tasks().len(), 2);
    }

    #[test]
    fn test_range_select_over_visible_rows() {
        let mut store = TaskStore::new();
        let a = add(&mut store, "A", "01-01", "01-02");
        let b = add(&mut store, "B", "01-01", "01-02");
        let c = add(&mut store, "C", "01-01", "01-02");
        store.select_range(&c, &a);
        assert_eq!(store.selected_task_ids().len(), 3);

        store.set_selected_task_ids([b.clone()]);
        store.select_range_to(&c);
        let picked: Vec<&String> = store.selected_task_ids().iter().collect();
        assert_eq!(picked, vec![&b, &c]);

        store.toggle_selection(&b);
        assert!(!store.is_selected(&b));
    }

    #[test]
    fn test_effective_selection_falls_back_to_active_cell() {
        let mut store = TaskStore::new();
        let a = add(&mut store, "A", "01-01", "01-02");
        assert!(store.effective_selection().is_empty());
        store.set_active_cell(&a, Column::StartDate).unwrap();
        assert_eq!(store.effective_selection(), vec![a]);
    }

    #[test]
    fn test_set_tasks_clears_history_and_selection() {
        let mut store = TaskStore::new();
        let a = add(&mut store, "A", "01-01", "01-02");
        store.set_selected_task_ids([a]);
        store.set_tasks(vec![
            Task::new("x", "X"),
            Task::new("y", "Y").with_parent("ghost"),
            Task::new("x", "X again"),
        ]);
        assert_eq!(store.len(), 2);
        assert_eq!(store.task("x").unwrap().name, "X again");
        assert!(!store.can_undo());
        assert!(store.selected_task_ids().is_empty());
    }

    #[test]
    fn test_add_after_loaded_extreme_order() {
        let mut store = TaskStore::new();
        store.set_tasks(vec![Task::new("x", "X").with_order(i64::MAX)]);
        let b = add(&mut store, "B", "01-01", "01-02");
        assert_eq!(store.task("x").unwrap().order, 0);
        assert_eq!(store.task(&b).unwrap().order, 1);
    }

    #[test]
    fn test_huge_duration_saturates_instead_of_panicking() {
        let mut store = TaskStore::new();
        let a = add(&mut store, "A", "01-01", "01-05");
        store
            .update_task(
                &a,
                TaskUpdate {
                    duration: Some(i64::MAX),
                    ..Default::default()
                },
            )
            .unwrap();
        let task = store.task(&a).unwrap();
        assert_eq!(task.start_date, Some(date("01-01")));
        assert_eq!(task.end_date, Some(NaiveDate::MAX));
        assert!(task.duration > 1);
    }

    #[test]
    fn test_undo_redo_descriptions() {
        let mut store = TaskStore::new();
        add(&mut store, "A", "01-01", "01-02");
        assert_eq!(store.undo_description(), Some("Add task \"A\""));
        assert_eq!(store.undo().as_deref(), Some("Add task \"A\""));
        assert!(store.is_empty());
        assert_eq!(store.redo_description(), Some("Add task \"A\""));
        store.redo();
        assert_eq!(store.len(), 1);
        assert!(store.redo().is_none());
    }
}
