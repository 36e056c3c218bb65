//! Provisioning orchestrator
//!
//! One run takes the full resource set, marks every top-level resource (and
//! its children) as starting, then provisions the top-level resources one at
//! a time in declaration order on a single background task. A failure is
//! recorded on that resource, its children and its completion signal; the run
//! moves on to the next resource.

use crate::error::{CloudError, Result};
use crate::graph::ResourceGraph;
use crate::provisioner::ProvisionContext;
use crate::registry::ProvisionerRegistry;
use crate::report::RunReport;
use crate::reporter::StateReporter;
use crate::resource::Resource;
use crate::state::{NotificationSink, StateTransition};
use std::sync::Arc;
use std::time::Instant;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

pub struct Orchestrator {
    registry: Arc<ProvisionerRegistry>,
    sink: Arc<dyn NotificationSink>,
}

impl Orchestrator {
    pub fn new(registry: Arc<ProvisionerRegistry>, sink: Arc<dyn NotificationSink>) -> Self {
        Self { registry, sink }
    }

    /// Start a run over `resources`
    ///
    /// Every top-level resource has its completion signal armed and a
    /// "Starting" state published before this returns, so callers can wait on
    /// any of them right away. A set without top-level resources yields a
    /// handle that joins to an empty report.
    pub async fn start(
        &self,
        resources: impl IntoIterator<Item = Arc<Resource>>,
        cancel: CancellationToken,
    ) -> OrchestrationHandle {
        let graph = Arc::new(ResourceGraph::build(resources));
        let roots: Vec<Arc<Resource>> = graph.roots().cloned().collect();
        if roots.is_empty() {
            info!(resources = graph.len(), "No resources require provisioning");
            return OrchestrationHandle { task: None, cancel };
        }

        let reporter = StateReporter::new(self.sink.clone(), graph);
        for resource in &roots {
            reporter.mark_starting(resource).await;
        }

        let ctx = ProvisionContext {
            reporter,
            cancel: cancel.clone(),
        };
        let registry = self.registry.clone();
        let task = tokio::spawn(async move { run(registry, ctx, roots).await });

        OrchestrationHandle {
            task: Some(task),
            cancel,
        }
    }
}

async fn run(
    registry: Arc<ProvisionerRegistry>,
    ctx: ProvisionContext,
    roots: Vec<Arc<Resource>>,
) -> RunReport {
    let started = Instant::now();
    let mut report = RunReport::new();
    info!(resources = roots.len(), "Provisioning run started");

    for resource in roots {
        let id = resource.id().clone();

        if ctx.cancel.is_cancelled() {
            let error = Arc::new(CloudError::Cancelled(format!(
                "run cancelled before {} was provisioned",
                id
            )));
            ctx.reporter
                .complete(&resource, StateTransition::failed(), Err(error.clone()))
                .await;
            report.add_failure(id, error);
            continue;
        }

        let Some(provisioner) = registry.resolve(resource.kind()) else {
            warn!(resource = %id, kind = %resource.kind(), "No provisioner found for {}, skipping", resource.kind());
            ctx.reporter
                .complete(&resource, StateTransition::no_action(), Ok(()))
                .await;
            report.add_skipped(id);
            continue;
        };

        info!(resource = %id, provisioner = provisioner.name(), "Provisioning {}...", id);
        match provisioner.provision(&resource, &ctx).await {
            Ok(outcome) => {
                ctx.reporter
                    .complete(&resource, outcome.into_transition(), Ok(()))
                    .await;
                report.add_success(id);
            }
            Err(e) => {
                error!(resource = %id, error = %e, "Error provisioning {}", id);
                let error = Arc::new(e);
                ctx.reporter
                    .complete(&resource, StateTransition::failed(), Err(error.clone()))
                    .await;
                report.add_failure(id, error);
            }
        }
    }

    report.duration_ms = started.elapsed().as_millis() as u64;
    info!(
        provisioned = report.provisioned.len(),
        skipped = report.skipped.len(),
        failed = report.failed.len(),
        "Provisioning run finished in {}ms",
        report.duration_ms
    );
    report
}

/// Owned handle to a running orchestration
pub struct OrchestrationHandle {
    task: Option<JoinHandle<RunReport>>,
    cancel: CancellationToken,
}

impl OrchestrationHandle {
    /// Stop the run; the resource in flight and all remaining ones fail with `Cancelled`
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn cancellation_token(&self) -> &CancellationToken {
        &self.cancel
    }

    pub fn is_finished(&self) -> bool {
        self.task.as_ref().is_none_or(|task| task.is_finished())
    }

    /// Wait for the run to finish
    pub async fn join(self) -> Result<RunReport> {
        match self.task {
            None => Ok(RunReport::new()),
            Some(task) => task
                .await
                .map_err(|e| CloudError::TaskFailed(e.to_string())),
        }
    }
}
