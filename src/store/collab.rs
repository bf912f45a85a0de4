//! Ports to the stores the task store notifies but does not own.

use crate::model::dependency::Dependency;

/// Receives a fire-and-forget notice after every successful mutation.
pub trait DirtyTracker {
    fn mark_dirty(&mut self);
}

/// Task-to-task links. The task store only touches these when a summary
/// is ungrouped (and when that ungroup is undone or redone).
pub trait DependencyStore {
    /// Every link currently stored
    fn dependencies(&self) -> Vec<Dependency>;
    /// Remove every link that references `task_id`, returning the removed links
    fn remove_dependencies_for_task(&mut self, task_id: &str) -> Vec<Dependency>;
    /// Put previously removed links back
    fn restore_dependencies(&mut self, dependencies: &[Dependency]);
}

/// In-memory dirty flag
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DirtyFlag {
    dirty: bool,
}

impl DirtyFlag {
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Reset after the owner has persisted
    pub fn clear(&mut self) {
        self.dirty = false;
    }
}

impl DirtyTracker for DirtyFlag {
    fn mark_dirty(&mut self) {
        self.dirty = true;
    }
}

/// In-memory dependency list
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DependencyLinks {
    links: Vec<Dependency>,
}

impl DependencyLinks {
    pub fn new(links: Vec<Dependency>) -> Self {
        DependencyLinks { links }
    }

    pub fn add(&mut self, dependency: Dependency) {
        if !self.links.iter().any(|d| d.id == dependency.id) {
            self.links.push(dependency);
        }
    }

    /// Remove one link by id; returns whether it existed
    pub fn remove(&mut self, id: &str) -> bool {
        let before = self.links.len();
        self.links.retain(|d| d.id != id);
        self.links.len() != before
    }

    pub fn links(&self) -> &[Dependency] {
        &self.links
    }

    pub fn into_links(self) -> Vec<Dependency> {
        self.links
    }
}

impl DependencyStore for DependencyLinks {
    fn dependencies(&self) -> Vec<Dependency> {
        self.links.clone()
    }

    fn remove_dependencies_for_task(&mut self, task_id: &str) -> Vec<Dependency> {
        let (removed, kept): (Vec<_>, Vec<_>) = std::mem::take(&mut self.links)
            .into_iter()
            .partition(|d| d.references(task_id));
        self.links = kept;
        removed
    }

    fn restore_dependencies(&mut self, dependencies: &[Dependency]) {
        for dependency in dependencies {
            self.add(dependency.clone());
        }
    }
}
