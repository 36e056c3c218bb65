//! Resource graph index
//!
//! Built once per run from the full resource set: an arena of resources in
//! declaration order plus a parent → children lookup. Never mutated afterwards.

use crate::resource::{Resource, ResourceId};
use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::sync::Arc;

#[derive(Debug, Default)]
pub struct ResourceGraph {
    resources: Vec<Arc<Resource>>,
    by_id: HashMap<ResourceId, usize>,
    children: HashMap<ResourceId, Vec<usize>>,
}

impl ResourceGraph {
    /// Index `resources`; children whose parent is not in the set are not indexed
    pub fn build(resources: impl IntoIterator<Item = Arc<Resource>>) -> Self {
        let mut arena: Vec<Arc<Resource>> = Vec::new();
        let mut by_id = HashMap::new();
        for resource in resources {
            match by_id.entry(resource.id().clone()) {
                Entry::Vacant(entry) => {
                    entry.insert(arena.len());
                    arena.push(resource);
                }
                Entry::Occupied(_) => {
                    tracing::warn!(resource = %resource.id(), "Duplicate resource id, keeping the first declaration");
                }
            }
        }
        let resources = arena;

        let mut children: HashMap<ResourceId, Vec<usize>> = HashMap::new();
        for (index, resource) in resources.iter().enumerate() {
            let Some(parent) = resource.parent() else {
                continue;
            };
            if !by_id.contains_key(parent) {
                tracing::debug!(
                    resource = %resource.id(),
                    parent = %parent,
                    "Parent is not part of this run, not indexing"
                );
                continue;
            }
            children.entry(parent.clone()).or_default().push(index);
        }

        Self {
            resources,
            by_id,
            children,
        }
    }

    pub fn get(&self, id: &ResourceId) -> Option<&Arc<Resource>> {
        self.by_id.get(id).map(|&index| &self.resources[index])
    }

    /// Direct children in declaration order; empty when none
    pub fn children_of(&self, parent: &ResourceId) -> impl Iterator<Item = &Arc<Resource>> {
        self.children
            .get(parent)
            .into_iter()
            .flatten()
            .map(|&index| &self.resources[index])
    }

    /// Resources a run provisions directly, in declaration order
    pub fn roots(&self) -> impl Iterator<Item = &Arc<Resource>> {
        self.resources.iter().filter(|r| r.requires_provisioning())
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<Resource>> {
        self.resources.iter()
    }

    pub fn len(&self) -> usize {
        self.resources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resource::ResourceKind;

    fn ids<'a>(resources: impl Iterator<Item = &'a Arc<Resource>>) -> Vec<&'a str> {
        resources.map(|r| r.id().as_str()).collect()
    }

    #[test]
    fn test_children_keep_declaration_order() {
        let graph = ResourceGraph::build([
            Arc::new(Resource::new("Stack", ResourceKind::TemplateStack)),
            Arc::new(Resource::new("Table", ResourceKind::Construct).with_parent("Stack")),
            Arc::new(Resource::new("Queue", ResourceKind::Construct).with_parent("Stack")),
            Arc::new(Resource::new("Bucket", ResourceKind::Construct).with_parent("Stack")),
        ]);

        assert_eq!(
            ids(graph.children_of(&"Stack".into())),
            vec!["Table", "Queue", "Bucket"]
        );
        assert_eq!(ids(graph.roots()), vec!["Stack"]);
    }

    #[test]
    fn test_no_children_is_empty() {
        let graph = ResourceGraph::build([Arc::new(Resource::new(
            "Legacy",
            ResourceKind::StackReference,
        ))]);
        assert_eq!(graph.children_of(&"Legacy".into()).count(), 0);
        assert_eq!(graph.children_of(&"Missing".into()).count(), 0);
    }

    #[test]
    fn test_parent_outside_the_set_is_not_indexed() {
        let graph = ResourceGraph::build([Arc::new(
            Resource::new("Orphan", ResourceKind::Construct).with_parent("Elsewhere"),
        )]);

        assert_eq!(graph.children_of(&"Elsewhere".into()).count(), 0);
        assert!(graph.get(&"Orphan".into()).is_some());
        // A resource with a declared parent is never a root, even when the parent is absent
        assert_eq!(graph.roots().count(), 0);
    }

    #[test]
    fn test_nested_children_are_indexed_per_level() {
        let graph = ResourceGraph::build([
            Arc::new(Resource::new("Web", ResourceKind::App)),
            Arc::new(Resource::new("WebStack", ResourceKind::AppStack).with_parent("Web")),
            Arc::new(Resource::new("Table", ResourceKind::Construct).with_parent("WebStack")),
        ]);

        assert_eq!(ids(graph.children_of(&"Web".into())), vec!["WebStack"]);
        assert_eq!(ids(graph.children_of(&"WebStack".into())), vec!["Table"]);
    }
}
