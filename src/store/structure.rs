//! Selection-driven structural edits: indent, outdent, group, ungroup and
//! insert-relative.
//!
//! Each edit is planned against the collection as it stands before the
//! edit (eligibility, depth and cycle checks), then applied in one go and
//! recorded as a single command.

use std::cmp::Reverse;
use std::collections::{HashMap, HashSet};

use indexmap::IndexSet;

use super::{TaskStore, new_id, today};
use crate::model::command::{
    CommandParams, HierarchySnapshot, ParentChange, PlacedTask, UngroupedSummary,
};
use crate::model::task::{DateSpan, MAX_TASK_LEVEL, Task, TaskType, shift_date};
use crate::ops::hierarchy::{
    ancestor_ids, check_reparent, effective_parent, flattened_ids, has_children,
    normalize_task_order, recalculate_summary_ancestors, span_of, spread_task_order,
    subtree_height, task_children, task_descendants, task_level,
};
use crate::ops::rules::{TaskError, can_have_children};
use crate::store::collab::{DependencyStore, DirtyTracker};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Placement {
    Above,
    Below,
}

impl<D: DependencyStore, P: DirtyTracker> TaskStore<D, P> {
    // -----------------------------------------------------------------------
    // Indent / outdent
    // -----------------------------------------------------------------------

    pub fn can_indent_selection(&self) -> bool {
        self.plan_indent().is_ok()
    }

    pub fn can_outdent_selection(&self) -> bool {
        self.plan_outdent().is_ok()
    }

    /// Move each selected task under its nearest preceding sibling.
    /// Returns the number of tasks moved.
    pub fn indent_selected_tasks(&mut self) -> Result<usize, TaskError> {
        let changes = self.plan_indent()?;
        let before = HierarchySnapshot::capture(&self.tasks);
        normalize_task_order(&mut self.tasks);

        let mut working: IndexSet<String> = IndexSet::new();
        for change in &changes {
            if let Some(task) = self.tasks.get_mut(&change.task_id) {
                task.parent = change.new_parent.clone();
            }
            if let Some(parent) = change.new_parent.as_ref().and_then(|p| self.tasks.get_mut(p))
                && parent.open == Some(false)
            {
                parent.open = Some(true);
            }
            working.extend(change.old_parent.clone());
            working.extend(change.new_parent.clone());
        }
        normalize_task_order(&mut self.tasks);
        let cascade = recalculate_summary_ancestors(&mut self.tasks, working);
        tracing::debug!(count = changes.len(), "indented tasks");

        let count = changes.len();
        let description = self.describe("Indent", &changes);
        let params = CommandParams::IndentTasks {
            changes,
            cascade,
            before,
            after: HierarchySnapshot::capture(&self.tasks),
        };
        self.commit(description, params);
        Ok(count)
    }

    /// Move each selected task up to its grandparent, right after its
    /// former parent. Returns the number of tasks moved.
    pub fn outdent_selected_tasks(&mut self) -> Result<usize, TaskError> {
        let changes = self.plan_outdent()?;
        let before = HierarchySnapshot::capture(&self.tasks);
        spread_task_order(&mut self.tasks, changes.len());

        // slot n after a former parent gets key k(parent) + n
        let mut slots: HashMap<String, i64> = HashMap::new();
        let mut working: IndexSet<String> = IndexSet::new();
        for change in &changes {
            let Some(old_parent) = change.old_parent.clone() else {
                continue;
            };
            let base = self.tasks.get(&old_parent).map_or(0, |t| t.order);
            let slot = slots.entry(old_parent.clone()).or_insert(0);
            *slot += 1;
            let order = base + *slot;
            if let Some(task) = self.tasks.get_mut(&change.task_id) {
                task.parent = change.new_parent.clone();
                task.order = order;
            }
            working.insert(old_parent);
            working.extend(change.new_parent.clone());
        }
        normalize_task_order(&mut self.tasks);
        let cascade = recalculate_summary_ancestors(&mut self.tasks, working);
        tracing::debug!(count = changes.len(), "outdented tasks");

        let count = changes.len();
        let description = self.describe("Outdent", &changes);
        let params = CommandParams::OutdentTasks {
            changes,
            cascade,
            before,
            after: HierarchySnapshot::capture(&self.tasks),
        };
        self.commit(description, params);
        Ok(count)
    }

    fn plan_indent(&self) -> Result<Vec<ParentChange>, TaskError> {
        let selection = self.effective_selection();
        if selection.is_empty() {
            return Err(TaskError::EmptySelection);
        }
        let selected: HashSet<&str> = selection.iter().map(String::as_str).collect();

        let mut changes = Vec::new();
        let mut rejection = None;
        for id in self.selection_roots(&selected) {
            let Some(task) = self.tasks.get(&id) else {
                continue;
            };
            let siblings = task_children(&self.tasks, effective_parent(&self.tasks, task));
            let Some(position) = siblings.iter().position(|s| s.id == id) else {
                continue;
            };
            let Some(target) = siblings[..position]
                .iter()
                .rev()
                .find(|s| !selected.contains(s.id.as_str()) && can_have_children(s))
            else {
                continue;
            };
            match check_reparent(&self.tasks, &id, Some(target.id.as_str())) {
                Ok(()) => changes.push(ParentChange {
                    task_id: id.clone(),
                    old_parent: task.parent.clone(),
                    new_parent: Some(target.id.clone()),
                }),
                Err(err) => {
                    tracing::debug!(task = %id, %err, "cannot indent");
                    rejection = Some(err);
                }
            }
        }
        if changes.is_empty() {
            return Err(rejection.unwrap_or(TaskError::NothingToIndent));
        }
        Ok(changes)
    }

    fn plan_outdent(&self) -> Result<Vec<ParentChange>, TaskError> {
        let selection = self.effective_selection();
        if selection.is_empty() {
            return Err(TaskError::EmptySelection);
        }
        let selected: HashSet<&str> = selection.iter().map(String::as_str).collect();

        // every selected task moves, chains included; levels come from the
        // pre-operation tree
        let ordered: Vec<String> = flattened_ids(&self.tasks)
            .into_iter()
            .filter(|id| selected.contains(id.as_str()))
            .collect();
        let mut changes = Vec::new();
        let mut rejection = None;
        for id in ordered {
            let Some(task) = self.tasks.get(&id) else {
                continue;
            };
            let Some(parent) = effective_parent(&self.tasks, task) else {
                continue;
            };
            let grandparent = self
                .tasks
                .get(parent)
                .and_then(|p| effective_parent(&self.tasks, p));

            // exactly one level up, never a double hop
            let old_level = task_level(&self.tasks, &id);
            let new_level = grandparent.map_or(0, |g| task_level(&self.tasks, g) + 1);
            if new_level + 1 != old_level {
                continue;
            }
            match check_reparent(&self.tasks, &id, grandparent) {
                Ok(()) => changes.push(ParentChange {
                    task_id: id.clone(),
                    old_parent: Some(parent.to_string()),
                    new_parent: grandparent.map(str::to_string),
                }),
                Err(err) => {
                    tracing::debug!(task = %id, %err, "cannot outdent");
                    rejection = Some(err);
                }
            }
        }
        if changes.is_empty() {
            return Err(rejection.unwrap_or(TaskError::NothingToOutdent));
        }
        Ok(changes)
    }

    /// Selected ids without a selected ancestor, in visual order
    fn selection_roots(&self, selected: &HashSet<&str>) -> Vec<String> {
        flattened_ids(&self.tasks)
            .into_iter()
            .filter(|id| selected.contains(id.as_str()))
            .filter(|id| {
                !ancestor_ids(&self.tasks, id)
                    .iter()
                    .any(|a| selected.contains(a.as_str()))
            })
            .collect()
    }

    // -----------------------------------------------------------------------
    // Group / ungroup
    // -----------------------------------------------------------------------

    pub fn can_group_selection(&self) -> bool {
        self.plan_group().is_ok()
    }

    pub fn can_ungroup_selection(&self) -> bool {
        self.plan_ungroup().is_ok()
    }

    /// Wrap the selected tasks in a new summary placed where the first of
    /// them was. The new summary becomes the selection; its id is returned.
    pub fn group_selected_tasks(&mut self) -> Result<String, TaskError> {
        let (roots, parent) = self.plan_group()?;
        let Some(first) = roots.first().cloned() else {
            return Err(TaskError::EmptySelection);
        };
        let span = {
            let mut rows: Vec<&Task> = Vec::new();
            for root in &roots {
                if let Some(task) = self.tasks.get(root) {
                    rows.push(task);
                    rows.extend(task_descendants(&self.tasks, root));
                }
            }
            span_of(rows)
        };

        let before = HierarchySnapshot::capture(&self.tasks);
        spread_task_order(&mut self.tasks, 1);
        let index = self
            .tasks
            .get_index_of(&first)
            .unwrap_or(self.tasks.len());
        let order = self.tasks.get(&first).map_or(0, |t| t.order) - 1;

        let id = new_id();
        let mut group = Task::new(id.clone(), self.config.editor.new_group_name.clone());
        group.kind = TaskType::Summary;
        group.color = self.config.colors.summary.clone();
        group.open = Some(true);
        group.parent = parent.clone();
        group.order = order;
        if let Some(span) = span {
            group.set_span(span);
        }
        self.tasks.shift_insert(index, id.clone(), group.clone());

        let mut changes = Vec::with_capacity(roots.len());
        for root in &roots {
            if let Some(task) = self.tasks.get_mut(root) {
                changes.push(ParentChange {
                    task_id: root.clone(),
                    old_parent: task.parent.clone(),
                    new_parent: Some(id.clone()),
                });
                task.parent = Some(id.clone());
            }
        }
        normalize_task_order(&mut self.tasks);
        let cascade =
            recalculate_summary_ancestors(&mut self.tasks, std::iter::once(id.clone()).chain(parent));
        tracing::debug!(group = %id, count = roots.len(), "grouped tasks");

        self.selected = IndexSet::from([id.clone()]);
        self.anchor = Some(id.clone());

        let description = self.describe("Group", &changes);
        let params = CommandParams::GroupTasks {
            group: PlacedTask { index, task: group },
            changes,
            cascade,
            before,
            after: HierarchySnapshot::capture(&self.tasks),
        };
        self.commit(description, params);
        Ok(id)
    }

    /// Dissolve every selected summary that has children, deepest first:
    /// children move up to the summary's parent, the summary and the
    /// dependencies touching it are removed. The freed children become the
    /// selection and are returned.
    pub fn ungroup_selected_tasks(&mut self) -> Result<Vec<String>, TaskError> {
        let targets = self.plan_ungroup()?;
        let before = HierarchySnapshot::capture(&self.tasks);
        let room = self.tasks.len();
        spread_task_order(&mut self.tasks, room);

        let mut ungrouped = Vec::with_capacity(targets.len());
        let mut freed: IndexSet<String> = IndexSet::new();
        let mut working: IndexSet<String> = IndexSet::new();
        for summary_id in &targets {
            let Some(index) = self.tasks.get_index_of(summary_id) else {
                continue;
            };
            let Some(summary) = self.tasks.get(summary_id).cloned() else {
                continue;
            };
            let parent = effective_parent(&self.tasks, &summary).map(str::to_string);
            let children: Vec<String> = task_children(&self.tasks, Some(summary_id.as_str()))
                .iter()
                .map(|t| t.id.clone())
                .collect();

            let mut changes = Vec::with_capacity(children.len());
            for (offset, child_id) in children.iter().enumerate() {
                if let Some(child) = self.tasks.get_mut(child_id) {
                    changes.push(ParentChange {
                        task_id: child_id.clone(),
                        old_parent: child.parent.clone(),
                        new_parent: parent.clone(),
                    });
                    child.parent = parent.clone();
                    child.order = summary.order.saturating_add(1 + offset as i64);
                }
            }
            self.tasks.shift_remove(summary_id);
            let dependencies = self.dependencies.remove_dependencies_for_task(summary_id);
            tracing::debug!(
                summary = %summary_id,
                children = changes.len(),
                dependencies = dependencies.len(),
                "ungrouped summary"
            );

            freed.shift_remove(summary_id);
            freed.extend(children);
            working.extend(parent);
            ungrouped.push(UngroupedSummary {
                summary: PlacedTask {
                    index,
                    task: summary,
                },
                children: changes,
                dependencies,
            });
        }
        normalize_task_order(&mut self.tasks);
        let cascade = recalculate_summary_ancestors(&mut self.tasks, working);

        let freed: Vec<String> = freed
            .into_iter()
            .filter(|id| self.tasks.contains_key(id))
            .collect();
        self.selected = freed.iter().cloned().collect();
        self.anchor = freed.last().cloned();

        let description = match ungrouped.as_slice() {
            [single] => format!("Ungroup \"{}\"", single.summary.task.name),
            many => format!("Ungroup {} groups", many.len()),
        };
        let params = CommandParams::UngroupTasks {
            ungrouped,
            cascade,
            before,
            after: HierarchySnapshot::capture(&self.tasks),
        };
        self.commit(description, params);
        Ok(freed)
    }

    fn plan_group(&self) -> Result<(Vec<String>, Option<String>), TaskError> {
        let selection = self.effective_selection();
        if selection.is_empty() {
            return Err(TaskError::EmptySelection);
        }
        let selected: HashSet<&str> = selection.iter().map(String::as_str).collect();
        let roots = self.selection_roots(&selected);

        let parents: HashSet<Option<&str>> = roots
            .iter()
            .filter_map(|id| self.tasks.get(id))
            .map(|t| effective_parent(&self.tasks, t))
            .collect();
        if parents.len() > 1 {
            return Err(TaskError::MixedParents);
        }
        let parent = parents.into_iter().next().flatten().map(str::to_string);

        let group_level = match parent.as_deref() {
            Some(parent_id) => {
                if let Some(p) = self.tasks.get(parent_id)
                    && !can_have_children(p)
                {
                    return Err(TaskError::MilestoneCannotParent(parent_id.to_string()));
                }
                task_level(&self.tasks, parent_id) + 1
            }
            None => 0,
        };
        if roots
            .iter()
            .any(|root| group_level + 1 + subtree_height(&self.tasks, root) > MAX_TASK_LEVEL)
        {
            return Err(TaskError::MaxDepthExceeded);
        }
        Ok((roots, parent))
    }

    /// Selected summaries with children, deepest first
    fn plan_ungroup(&self) -> Result<Vec<String>, TaskError> {
        let selection = self.effective_selection();
        if selection.is_empty() {
            return Err(TaskError::EmptySelection);
        }
        let visual = flattened_ids(&self.tasks);
        let mut targets: Vec<(Reverse<usize>, usize, String)> = selection
            .into_iter()
            .filter(|id| {
                self.tasks
                    .get(id)
                    .is_some_and(|t| t.kind == TaskType::Summary)
                    && has_children(&self.tasks, id)
            })
            .map(|id| {
                let level = task_level(&self.tasks, &id);
                let position = visual.iter().position(|v| *v == id).unwrap_or(usize::MAX);
                (Reverse(level), position, id)
            })
            .collect();
        if targets.is_empty() {
            return Err(TaskError::NothingToUngroup);
        }
        targets.sort();
        Ok(targets.into_iter().map(|(_, _, id)| id).collect())
    }

    // -----------------------------------------------------------------------
    // Insert relative to a task
    // -----------------------------------------------------------------------

    /// New sibling directly above `reference_id`, ending the day before it starts
    pub fn insert_task_above(&mut self, reference_id: &str) -> Result<String, TaskError> {
        self.insert_relative(reference_id, Placement::Above, 1)?
            .into_iter()
            .next()
            .ok_or_else(|| TaskError::NotFound(reference_id.to_string()))
    }

    /// New sibling directly below `reference_id`, starting the day after it ends
    pub fn insert_task_below(&mut self, reference_id: &str) -> Result<String, TaskError> {
        self.insert_relative(reference_id, Placement::Below, 1)?
            .into_iter()
            .next()
            .ok_or_else(|| TaskError::NotFound(reference_id.to_string()))
    }

    /// `count` new siblings stacked above `reference_id`, top to bottom
    pub fn insert_multiple_tasks_above(
        &mut self,
        reference_id: &str,
        count: usize,
    ) -> Result<Vec<String>, TaskError> {
        self.insert_relative(reference_id, Placement::Above, count)
    }

    fn insert_relative(
        &mut self,
        reference_id: &str,
        placement: Placement,
        count: usize,
    ) -> Result<Vec<String>, TaskError> {
        let reference = self.require(reference_id)?.clone();
        if count == 0 {
            return Ok(Vec::new());
        }
        let parent = effective_parent(&self.tasks, &reference).map(str::to_string);
        let days = self.config.editor.default_duration_days;
        let span = match placement {
            Placement::Above => match reference.start_date {
                Some(start) => DateSpan::ending_at(shift_date(start, -1), days),
                None => DateSpan::starting_at(today(), days),
            },
            Placement::Below => match reference.end_date.or(reference.start_date) {
                Some(end) => DateSpan::starting_at(shift_date(end, 1), days),
                None => DateSpan::starting_at(today(), days),
            },
        };

        let before = HierarchySnapshot::capture(&self.tasks);
        spread_task_order(&mut self.tasks, count);
        let base_order = self.tasks.get(reference_id).map_or(0, |t| t.order);
        let base_index = self
            .tasks
            .get_index_of(reference_id)
            .unwrap_or(self.tasks.len());

        let mut added = Vec::with_capacity(count);
        let mut ids = Vec::with_capacity(count);
        for offset in 0..count {
            let (order, index) = match placement {
                Placement::Above => (
                    base_order - count as i64 + offset as i64,
                    base_index + offset,
                ),
                Placement::Below => (base_order + 1 + offset as i64, base_index + 1 + offset),
            };
            let id = new_id();
            let mut task = Task::new(id.clone(), self.config.editor.new_task_name.clone());
            task.color = self.config.colors.task.clone();
            task.parent = parent.clone();
            task.order = order;
            task.set_span(span);

            let index = index.min(self.tasks.len());
            self.tasks.shift_insert(index, id.clone(), task.clone());
            added.push(PlacedTask { index, task });
            ids.push(id);
        }
        normalize_task_order(&mut self.tasks);
        let cascade = recalculate_summary_ancestors(&mut self.tasks, parent);
        tracing::debug!(reference = %reference_id, count, ?placement, "inserted tasks");

        let side = match placement {
            Placement::Above => "above",
            Placement::Below => "below",
        };
        let description = if count == 1 {
            format!("Insert task {} \"{}\"", side, reference.name)
        } else {
            format!("Insert {} tasks {} \"{}\"", count, side, reference.name)
        };
        let params = CommandParams::AddTask {
            added,
            cascade,
            before,
            after: HierarchySnapshot::capture(&self.tasks),
        };
        self.commit(description, params);
        Ok(ids)
    }

    fn describe(&self, verb: &str, changes: &[ParentChange]) -> String {
        match changes {
            [single] => format!("{} task \"{}\"", verb, self.name_of(&single.task_id)),
            many => format!("{} {} tasks", verb, many.len()),
        }
    }
}
