//! Stack executor
//!
//! Drives one remote stack to a terminal state through the change set
//! protocol:
//!
//! 1. describe the stack (waiting out a running operation, replacing a stack
//!    stuck in `ROLLBACK_COMPLETE`)
//! 2. create a change set, `Create` for a new stack and `Update` otherwise
//! 3. poll the change set; an empty diff short-circuits to `Unchanged`
//! 4. execute it and poll the stack until a terminal status
//!
//! Every wait shares the poll interval, the cancellation token and the
//! deployment deadline. Cancellation stops polling and leaves the remote stack
//! as the control plane reports it.

use crate::config::ExecutorConfig;
use crate::error::{CloudError, Result};
use crate::resource::ResourceId;
use crate::stack::{
    ChangeSetDescription, ChangeSetRequest, ChangeSetStatus, ChangeSetType, ControlPlane,
    StackDescription, StackStatus,
};
use crate::template::TemplateRef;
use chrono::{DateTime, TimeDelta, Utc};
use std::collections::BTreeMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Tolerated drift between the local clock and event timestamps
const EVENT_CLOCK_SKEW_SECS: i64 = 30;

/// What to deploy
#[derive(Debug, Clone)]
pub struct StackDeploymentRequest {
    pub resource: ResourceId,
    pub stack_name: String,
    pub template: TemplateRef,
    pub parameters: BTreeMap<String, String>,
}

/// Why a deployment ended in a failed terminal state
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StackFailure {
    pub stack_name: String,
    pub stack_id: Option<String>,
    /// Terminal stack status; `None` when the change set itself was rejected
    pub status: Option<StackStatus>,
    pub reason: String,
}

impl From<StackFailure> for CloudError {
    fn from(failure: StackFailure) -> Self {
        CloudError::ApplyFailed {
            stack_name: failure.stack_name,
            status: failure
                .status
                .map(|s| s.to_string())
                .unwrap_or_else(|| "CHANGE_SET_FAILED".to_string()),
            reason: failure.reason,
        }
    }
}

/// Terminal result of a deployment
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StackDeployment {
    /// The stack already matched the template; nothing was executed
    Unchanged(StackDescription),
    /// A change set was executed and the stack converged
    Applied(StackDescription),
    /// The control plane rejected the template or rolled the stack back
    Failed(StackFailure),
}

impl StackDeployment {
    pub fn is_success(&self) -> bool {
        !matches!(self, StackDeployment::Failed(_))
    }

    pub fn snapshot(&self) -> Option<&StackDescription> {
        match self {
            StackDeployment::Unchanged(stack) | StackDeployment::Applied(stack) => Some(stack),
            StackDeployment::Failed(_) => None,
        }
    }

    /// Terminal snapshot, or `ApplyFailed` carrying the failure reason
    pub fn into_snapshot(self) -> Result<StackDescription> {
        match self {
            StackDeployment::Unchanged(stack) | StackDeployment::Applied(stack) => Ok(stack),
            StackDeployment::Failed(failure) => Err(failure.into()),
        }
    }
}

pub struct StackExecutor {
    client: Arc<dyn ControlPlane>,
    config: ExecutorConfig,
}

impl StackExecutor {
    pub fn new(client: Arc<dyn ControlPlane>, config: ExecutorConfig) -> Self {
        Self { client, config }
    }

    /// Deploy `request`
    ///
    /// `Ok(StackDeployment::Failed)` means the control plane reported a failed
    /// deployment. `Err` is reserved for configuration problems, API faults,
    /// timeouts and cancellation.
    pub async fn execute(
        &self,
        request: &StackDeploymentRequest,
        cancel: &CancellationToken,
    ) -> Result<StackDeployment> {
        let stack_name = request.stack_name.as_str();
        // A template that cannot be read fails before any API call
        let template_body = request.template.load().await?;
        let deadline = self
            .config
            .timeout
            .and_then(|timeout| Instant::now().checked_add(timeout));

        info!(resource = %request.resource, stack = %stack_name, template = %request.template, "Deploying stack");

        let mut existing = self
            .call("describe-stack", cancel, || self.client.describe_stack(stack_name))
            .await?;

        if let Some(stack) = existing.as_ref().filter(|s| s.status.is_in_progress()) {
            info!(stack = %stack_name, status = %stack.status, "Stack has an operation in progress, waiting for it to finish");
            existing = Some(self.wait_for_stack(stack_name, false, cancel, deadline).await?);
        }

        if let Some(stack) = existing.as_ref().filter(|s| s.status.needs_replacement()) {
            warn!(stack = %stack_name, status = %stack.status, "Stack failed its first creation, deleting it before recreating");
            self.call("delete-stack", cancel, || self.client.delete_stack(stack_name))
                .await?;
            self.wait_for_deletion(stack_name, cancel, deadline).await?;
            existing = None;
        }

        // A stack left in REVIEW_IN_PROGRESS by an abandoned change set was never created
        let change_set_type = match &existing {
            Some(stack) if stack.status != StackStatus::ReviewInProgress => ChangeSetType::Update,
            _ => ChangeSetType::Create,
        };

        let change_set = ChangeSetRequest {
            stack_name: stack_name.to_string(),
            change_set_name: self.change_set_name(),
            change_set_type,
            template_body,
            parameters: request.parameters.clone(),
            capabilities: self.config.capabilities.clone(),
        };
        debug!(stack = %stack_name, change_set = %change_set.change_set_name, kind = %change_set_type, "Creating change set");
        let change_set_id = self
            .call("create-change-set", cancel, || {
                self.client.create_change_set(&change_set)
            })
            .await?;

        let diff = self
            .wait_for_change_set(stack_name, &change_set_id, cancel, deadline)
            .await?;

        if diff.is_no_op() {
            info!(stack = %stack_name, "No changes detected, stack is up to date");
            if let Err(e) = self
                .call("delete-change-set", cancel, || {
                    self.client.delete_change_set(stack_name, &change_set_id)
                })
                .await
            {
                warn!(stack = %stack_name, error = %e, "Failed to delete empty change set");
            }
            return Ok(match existing {
                Some(stack) => StackDeployment::Unchanged(stack),
                None => StackDeployment::Failed(StackFailure {
                    stack_name: stack_name.to_string(),
                    stack_id: None,
                    status: None,
                    reason: "change set for a new stack contained no resources".to_string(),
                }),
            });
        }

        if diff.status != ChangeSetStatus::CreateComplete {
            let reason = diff
                .status_reason
                .unwrap_or_else(|| "change set creation failed".to_string());
            error!(stack = %stack_name, reason = %reason, "Change set was rejected");
            return Ok(StackDeployment::Failed(StackFailure {
                stack_name: stack_name.to_string(),
                stack_id: existing.map(|s| s.stack_id),
                status: None,
                reason,
            }));
        }

        info!(stack = %stack_name, changes = diff.change_count, "Executing change set");
        let executed_at = Utc::now();
        self.call("execute-change-set", cancel, || {
            self.client.execute_change_set(stack_name, &change_set_id)
        })
        .await?;

        let stack = self.wait_for_stack(stack_name, true, cancel, deadline).await?;
        if stack.status.is_success() {
            info!(stack = %stack_name, status = %stack.status, "Stack deployed");
            return Ok(StackDeployment::Applied(stack));
        }

        let reason = self.failure_reason(&stack, executed_at, cancel).await;
        error!(stack = %stack_name, status = %stack.status, reason = %reason, "Stack deployment failed");
        Ok(StackDeployment::Failed(StackFailure {
            stack_name: stack_name.to_string(),
            stack_id: Some(stack.stack_id),
            status: Some(stack.status),
            reason,
        }))
    }

    fn change_set_name(&self) -> String {
        format!(
            "{}-{}",
            self.config.change_set_prefix,
            Utc::now().format("%Y%m%d%H%M%S")
        )
    }

    /// Poll until the change set leaves its pending states
    async fn wait_for_change_set(
        &self,
        stack_name: &str,
        change_set_id: &str,
        cancel: &CancellationToken,
        deadline: Option<Instant>,
    ) -> Result<ChangeSetDescription> {
        loop {
            let description = self
                .call("describe-change-set", cancel, || {
                    self.client.describe_change_set(stack_name, change_set_id)
                })
                .await?;
            if !description.is_pending() {
                return Ok(description);
            }
            self.pause(stack_name, cancel, deadline).await?;
        }
    }

    /// Poll until the stack reaches a terminal status
    ///
    /// Once a change set was `executed`, `REVIEW_IN_PROGRESS` only means the
    /// control plane has not picked the execution up yet.
    async fn wait_for_stack(
        &self,
        stack_name: &str,
        executed: bool,
        cancel: &CancellationToken,
        deadline: Option<Instant>,
    ) -> Result<StackDescription> {
        loop {
            let stack = self
                .call("describe-stack", cancel, || self.client.describe_stack(stack_name))
                .await?
                .ok_or_else(|| CloudError::StackNotFound(stack_name.to_string()))?;
            let awaiting_execution = executed && stack.status == StackStatus::ReviewInProgress;
            if stack.status.is_terminal() && !awaiting_execution {
                return Ok(stack);
            }
            debug!(stack = %stack_name, status = %stack.status, "Waiting for stack");
            self.pause(stack_name, cancel, deadline).await?;
        }
    }

    /// Poll until the stack is gone
    async fn wait_for_deletion(
        &self,
        stack_name: &str,
        cancel: &CancellationToken,
        deadline: Option<Instant>,
    ) -> Result<()> {
        loop {
            let stack = self
                .call("describe-stack", cancel, || self.client.describe_stack(stack_name))
                .await?;
            match stack {
                None => return Ok(()),
                Some(stack) if stack.status == StackStatus::DeleteComplete => return Ok(()),
                Some(stack) if stack.status == StackStatus::DeleteFailed => {
                    return Err(CloudError::ApiError(format!(
                        "could not delete stack {} before recreating it: {}",
                        stack_name,
                        stack.status_reason.unwrap_or_default()
                    )));
                }
                Some(_) => self.pause(stack_name, cancel, deadline).await?,
            }
        }
    }

    /// Most recent failed event of this deployment, falling back to the
    /// stack's own status reason
    async fn failure_reason(
        &self,
        stack: &StackDescription,
        executed_at: DateTime<Utc>,
        cancel: &CancellationToken,
    ) -> String {
        let since = executed_at - TimeDelta::seconds(EVENT_CLOCK_SKEW_SECS);
        let fallback = || {
            stack
                .status_reason
                .clone()
                .unwrap_or_else(|| format!("stack ended in {}", stack.status))
        };

        match self
            .call("describe-stack-events", cancel, || {
                self.client.describe_stack_events(&stack.stack_name)
            })
            .await
        {
            Ok(events) => events
                .iter()
                .filter(|e| e.timestamp.is_none_or(|t| t >= since))
                .find(|e| e.is_failure() && e.resource_status_reason.is_some())
                .map(|e| {
                    format!(
                        "{} {}: {}",
                        e.logical_resource_id,
                        e.resource_status,
                        e.resource_status_reason.as_deref().unwrap_or_default()
                    )
                })
                .unwrap_or_else(fallback),
            Err(e) => {
                warn!(stack = %stack.stack_name, error = %e, "Failed to read stack events");
                fallback()
            }
        }
    }

    /// Sleep one poll interval, unless cancelled or past the deadline
    async fn pause(
        &self,
        stack_name: &str,
        cancel: &CancellationToken,
        deadline: Option<Instant>,
    ) -> Result<()> {
        let mut delay = self.config.poll_interval;
        if let Some(deadline) = deadline {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Err(CloudError::Timeout(format!(
                    "stack {} did not reach a terminal state in {:?}",
                    stack_name,
                    self.config.timeout.unwrap_or_default()
                )));
            }
            delay = delay.min(remaining);
        }
        sleep_or_cancel(delay, cancel, stack_name).await
    }

    /// Run one API call, retrying transient errors with backoff
    async fn call<T, F, Fut>(
        &self,
        operation: &'static str,
        cancel: &CancellationToken,
        mut f: F,
    ) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut attempt = 0;
        loop {
            if cancel.is_cancelled() {
                return Err(CloudError::Cancelled(format!("{} was not issued", operation)));
            }
            match f().await {
                Err(e) if e.is_transient() && attempt + 1 < self.config.retry.max_attempts => {
                    let delay = self.config.retry.delay_for_attempt(attempt);
                    warn!(
                        operation,
                        attempt = attempt + 1,
                        max_attempts = self.config.retry.max_attempts,
                        error = %e,
                        "Transient API error, retrying in {:?}",
                        delay
                    );
                    sleep_or_cancel(delay, cancel, operation).await?;
                    attempt += 1;
                }
                other => return other,
            }
        }
    }
}

async fn sleep_or_cancel(delay: Duration, cancel: &CancellationToken, what: &str) -> Result<()> {
    tokio::select! {
        _ = cancel.cancelled() => Err(CloudError::Cancelled(format!("stopped waiting on {}", what))),
        _ = tokio::time::sleep(delay) => Ok(()),
    }
}
