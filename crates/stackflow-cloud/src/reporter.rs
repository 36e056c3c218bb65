//! State publication and fan-out
//!
//! Every state change of a provisioned resource goes through here: the
//! resource's status is updated, the transition is published to the sink, and
//! the same label is fanned out to everything indexed below the resource.

use crate::graph::ResourceGraph;
use crate::resource::Resource;
use crate::signal::Outcome;
use crate::state::{NotificationSink, ResourceSnapshot, StateTransition};
use std::sync::Arc;

#[derive(Clone)]
pub struct StateReporter {
    sink: Arc<dyn NotificationSink>,
    graph: Arc<ResourceGraph>,
}

impl StateReporter {
    pub fn new(sink: Arc<dyn NotificationSink>, graph: Arc<ResourceGraph>) -> Self {
        Self { sink, graph }
    }

    pub fn graph(&self) -> &ResourceGraph {
        &self.graph
    }

    /// Arm completion signals and publish "Starting" to `resource` and everything under it
    pub async fn mark_starting(&self, resource: &Resource) {
        let descendants = self.descendants(resource, |_| true);
        for target in std::iter::once(resource).chain(descendants.iter().map(|d| d.as_ref())) {
            target.arm_completion();
            let transition =
                StateTransition::starting().with_resource_type(target.kind().as_str());
            self.publish(target, &transition).await;
        }
    }

    /// Update the resource's status and publish the transition
    pub async fn publish(&self, resource: &Resource, transition: &StateTransition) -> ResourceSnapshot {
        resource.set_status(transition.status);
        let transition = transition.clone();
        self.sink
            .publish_update(resource.id(), Box::new(move |snapshot| transition.apply(snapshot)))
            .await
    }

    /// Publish a terminal transition and settle the completion signals
    ///
    /// Descendants receive the same label and outcome before the resource
    /// itself is settled, deepest first, so anyone woken by a signal already
    /// sees everything below it in a terminal state. A descendant whose signal
    /// was settled earlier (e.g. an app stack finished by its own deployment)
    /// is left alone together with its subtree.
    pub async fn complete(&self, resource: &Resource, transition: StateTransition, outcome: Outcome) {
        self.publish(resource, &transition).await;

        let for_child = transition.for_child();
        let pending = self.descendants(resource, |r| !r.arm_completion().is_settled());
        for child in pending.iter().rev() {
            self.publish(child, &for_child).await;
            child.arm_completion().settle(outcome.clone());
        }

        if !resource.arm_completion().settle(outcome) {
            tracing::debug!(resource = %resource.id(), "Completion signal was already settled");
        }
    }

    /// Descendants of `resource` in pre-order, pruning subtrees rejected by `keep`
    fn descendants(&self, resource: &Resource, keep: impl Fn(&Resource) -> bool) -> Vec<Arc<Resource>> {
        let mut found = Vec::new();
        let mut frontier: Vec<&Arc<Resource>> = self.graph.children_of(resource.id()).collect();
        frontier.reverse();
        while let Some(next) = frontier.pop() {
            if !keep(next.as_ref()) {
                continue;
            }
            let start = frontier.len();
            frontier.extend(self.graph.children_of(next.id()));
            frontier[start..].reverse();
            found.push(next.clone());
        }
        found
    }
}
