//! Provisioner registry
//!
//! Maps a resource kind to the provisioner that handles it. A kind without a
//! provisioner of its own can declare a fallback kind; resolution walks the
//! fallback chain until a provisioner is found or the chain ends.

use crate::assembly::Synthesizer;
use crate::config::ExecutorConfig;
use crate::provisioner::{
    AppProvisioner, ExistingStackProvisioner, Provisioner, StackDeployer, StackPublisher,
    TemplateStackProvisioner,
};
use crate::resource::ResourceKind;
use crate::stack::ClientFactory;
use crate::template::TemplateProvider;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

#[derive(Default)]
pub struct ProvisionerRegistry {
    provisioners: HashMap<ResourceKind, Arc<dyn Provisioner>>,
    fallbacks: HashMap<ResourceKind, ResourceKind>,
}

impl ProvisionerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Standard set: existing stacks, template stacks and apps; app stacks
    /// fall back to the template stack provisioner
    pub fn with_defaults(
        clients: Arc<dyn ClientFactory>,
        templates: Arc<dyn TemplateProvider>,
        synthesizer: Arc<dyn Synthesizer>,
        config: ExecutorConfig,
        namespace: impl Into<String>,
    ) -> Self {
        let publisher = StackPublisher::new(namespace);
        let deployer = StackDeployer::new(clients.clone(), config, publisher.clone());

        let mut registry = Self::new();
        registry
            .register(
                ResourceKind::StackReference,
                Arc::new(ExistingStackProvisioner::new(clients, publisher)),
            )
            .register(
                ResourceKind::TemplateStack,
                Arc::new(TemplateStackProvisioner::new(deployer.clone(), templates)),
            )
            .register(
                ResourceKind::App,
                Arc::new(AppProvisioner::new(deployer, synthesizer)),
            )
            .fallback(ResourceKind::AppStack, ResourceKind::TemplateStack);
        registry
    }

    /// Register the provisioner for `kind`, replacing any previous one
    pub fn register(&mut self, kind: ResourceKind, provisioner: Arc<dyn Provisioner>) -> &mut Self {
        self.provisioners.insert(kind, provisioner);
        self
    }

    /// Declare `ancestor` as the kind to try when `kind` has no provisioner
    pub fn fallback(&mut self, kind: ResourceKind, ancestor: ResourceKind) -> &mut Self {
        self.fallbacks.insert(kind, ancestor);
        self
    }

    /// Provisioner for `kind`: an exact registration wins, then the fallback chain
    pub fn resolve(&self, kind: ResourceKind) -> Option<Arc<dyn Provisioner>> {
        let mut visited = HashSet::new();
        let mut current = kind;
        loop {
            if let Some(provisioner) = self.provisioners.get(&current) {
                return Some(provisioner.clone());
            }
            if !visited.insert(current) {
                tracing::warn!(kind = %kind, "Fallback chain loops back on itself");
                return None;
            }
            current = *self.fallbacks.get(&current)?;
        }
    }

    pub fn len(&self) -> usize {
        self.provisioners.len()
    }

    pub fn is_empty(&self) -> bool {
        self.provisioners.is_empty()
    }
}
