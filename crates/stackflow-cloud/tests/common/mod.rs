#![allow(dead_code)]

use async_trait::async_trait;
use stackflow_cloud::{
    AssetSummary, ChangeSetDescription, ChangeSetRequest, ChangeSetStatus, ChangeSetType,
    ClientFactory, CloudAssembly, CloudError, ControlPlane, DeclaredTemplateProvider,
    ExecutorConfig, NotificationSink, ProvisionerRegistry, Resource, ResourceId, ResourceKind,
    ResourceSnapshot, ResourceSpec, Result, SnapshotStore, SnapshotTransform, StackDescription,
    StackEvent, StackOutput, StackStatus, SynthesizedStack, Synthesizer, TemplateRef,
};
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Arc, Mutex};

pub const NAMESPACE: &str = "aws.cloudformation";

pub fn stack_arn(name: &str) -> String {
    format!(
        "arn:aws:cloudformation:us-east-1:123456789012:stack/{}/6d5f0e20-1c2b-11ef-8a3e-0e5c7a9b1d2f",
        name
    )
}

/// Control plane call as recorded by the fake
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    DescribeStack(String),
    CreateChangeSet(String, ChangeSetType),
    DescribeChangeSet(String),
    ExecuteChangeSet(String),
    DeleteChangeSet(String),
    DeleteStack(String),
    DescribeStackEvents(String),
}

impl Call {
    pub fn stack(&self) -> &str {
        match self {
            Call::DescribeStack(s)
            | Call::CreateChangeSet(s, _)
            | Call::DescribeChangeSet(s)
            | Call::ExecuteChangeSet(s)
            | Call::DeleteChangeSet(s)
            | Call::DeleteStack(s)
            | Call::DescribeStackEvents(s) => s,
        }
    }
}

/// Scripted behaviour of one remote stack
///
/// `describe_stack` returns the current state and then advances to the next
/// queued step; `None` as a step means the stack is gone.
#[derive(Debug, Clone)]
pub struct FakeStack {
    current: Option<StackDescription>,
    steps: VecDeque<Option<StackStatus>>,
    change_set: ChangeSetDescription,
    apply: Vec<StackStatus>,
    outputs: Vec<StackOutput>,
    events: Vec<StackEvent>,
    throttles: u32,
}

impl FakeStack {
    /// No stack yet; creating it succeeds
    pub fn absent() -> Self {
        Self {
            current: None,
            steps: VecDeque::new(),
            change_set: ChangeSetDescription {
                status: ChangeSetStatus::CreateComplete,
                status_reason: None,
                change_count: 3,
            },
            apply: vec![StackStatus::CreateInProgress, StackStatus::CreateComplete],
            outputs: Vec::new(),
            events: Vec::new(),
            throttles: 0,
        }
    }

    /// A deployed stack in `status`; updating it succeeds
    pub fn existing(name: &str, status: StackStatus) -> Self {
        Self {
            current: Some(StackDescription {
                stack_id: stack_arn(name),
                stack_name: name.to_string(),
                status,
                status_reason: None,
                outputs: Vec::new(),
            }),
            apply: vec![StackStatus::UpdateInProgress, StackStatus::UpdateComplete],
            ..Self::absent()
        }
    }

    pub fn with_outputs(mut self, outputs: &[(&str, &str)]) -> Self {
        self.outputs = outputs.iter().map(|(k, v)| StackOutput::new(*k, *v)).collect();
        if let Some(current) = &mut self.current {
            current.outputs = self.outputs.clone();
        }
        self
    }

    /// Diff against the template is empty
    pub fn no_changes(mut self) -> Self {
        self.change_set = ChangeSetDescription {
            status: ChangeSetStatus::Failed,
            status_reason: Some(
                "The submitted information didn't contain changes. Submit different information to create a change set."
                    .to_string(),
            ),
            change_count: 0,
        };
        self
    }

    /// The change set is rejected, e.g. for a malformed template
    pub fn rejected(mut self, reason: &str) -> Self {
        self.change_set = ChangeSetDescription {
            status: ChangeSetStatus::Failed,
            status_reason: Some(reason.to_string()),
            change_count: 0,
        };
        self
    }

    /// Statuses the stack goes through once the change set is executed
    pub fn applying(mut self, statuses: Vec<StackStatus>) -> Self {
        self.apply = statuses;
        self
    }

    /// Statuses the existing stack moves through on its own
    pub fn then(mut self, statuses: Vec<StackStatus>) -> Self {
        self.steps.extend(statuses.into_iter().map(Some));
        self
    }

    pub fn with_events(mut self, events: Vec<StackEvent>) -> Self {
        self.events = events;
        self
    }

    /// The first `count` API calls against this stack are throttled
    pub fn throttled(mut self, count: u32) -> Self {
        self.throttles = count;
        self
    }

    fn advance(&mut self) {
        match self.steps.pop_front() {
            Some(Some(status)) => {
                if let Some(current) = &mut self.current {
                    current.status = status;
                }
            }
            Some(None) => self.current = None,
            None => {}
        }
    }
}

pub fn failed_event(logical_id: &str, status: &str, reason: &str) -> StackEvent {
    StackEvent {
        logical_resource_id: logical_id.to_string(),
        resource_type: Some("AWS::SQS::Queue".to_string()),
        resource_status: status.to_string(),
        resource_status_reason: Some(reason.to_string()),
        timestamp: None,
    }
}

/// In-memory control plane that records every call
pub struct FakeControlPlane {
    public: bool,
    stacks: Mutex<HashMap<String, FakeStack>>,
    calls: Mutex<Vec<Call>>,
}

impl Default for FakeControlPlane {
    fn default() -> Self {
        Self::new()
    }
}

impl FakeControlPlane {
    pub fn new() -> Self {
        Self {
            public: true,
            stacks: Mutex::new(HashMap::new()),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Behave like a local emulator endpoint
    pub fn custom_endpoint(mut self) -> Self {
        self.public = false;
        self
    }

    pub fn with_stack(self, name: &str, stack: FakeStack) -> Self {
        self.stacks.lock().unwrap().insert(name.to_string(), stack);
        self
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn calls_for(&self, stack: &str) -> Vec<Call> {
        self.calls()
            .into_iter()
            .filter(|c| c.stack() == stack)
            .collect()
    }

    pub fn executed(&self, stack: &str) -> bool {
        self.calls_for(stack)
            .iter()
            .any(|c| matches!(c, Call::ExecuteChangeSet(_)))
    }

    fn record(&self, call: Call) -> Result<()> {
        let stack = call.stack().to_string();
        self.calls.lock().unwrap().push(call);
        let mut stacks = self.stacks.lock().unwrap();
        let entry = stacks.entry(stack.clone()).or_insert_with(FakeStack::absent);
        if entry.throttles > 0 {
            entry.throttles -= 1;
            return Err(CloudError::Throttled(format!("Rate exceeded for {}", stack)));
        }
        Ok(())
    }

    fn with<T>(&self, stack: &str, f: impl FnOnce(&mut FakeStack) -> T) -> T {
        let mut stacks = self.stacks.lock().unwrap();
        f(stacks.entry(stack.to_string()).or_insert_with(FakeStack::absent))
    }
}

#[async_trait]
impl ControlPlane for FakeControlPlane {
    fn is_public_endpoint(&self) -> bool {
        self.public
    }

    async fn describe_stack(&self, stack_name: &str) -> Result<Option<StackDescription>> {
        self.record(Call::DescribeStack(stack_name.to_string()))?;
        Ok(self.with(stack_name, |stack| {
            let current = stack.current.clone();
            stack.advance();
            current
        }))
    }

    async fn create_change_set(&self, request: &ChangeSetRequest) -> Result<String> {
        self.record(Call::CreateChangeSet(
            request.stack_name.clone(),
            request.change_set_type,
        ))?;
        Ok(format!(
            "arn:aws:cloudformation:us-east-1:123456789012:changeSet/{}/{}",
            request.change_set_name, request.stack_name
        ))
    }

    async fn describe_change_set(
        &self,
        stack_name: &str,
        _change_set_id: &str,
    ) -> Result<ChangeSetDescription> {
        self.record(Call::DescribeChangeSet(stack_name.to_string()))?;
        Ok(self.with(stack_name, |stack| stack.change_set.clone()))
    }

    async fn execute_change_set(&self, stack_name: &str, _change_set_id: &str) -> Result<()> {
        self.record(Call::ExecuteChangeSet(stack_name.to_string()))?;
        self.with(stack_name, |stack| {
            let mut statuses = stack.apply.clone().into_iter();
            let first = statuses.next().unwrap_or(StackStatus::CreateComplete);
            stack.current = Some(StackDescription {
                stack_id: stack_arn(stack_name),
                stack_name: stack_name.to_string(),
                status: first,
                status_reason: None,
                outputs: stack.outputs.clone(),
            });
            stack.steps = statuses.map(Some).collect();
        });
        Ok(())
    }

    async fn delete_change_set(&self, stack_name: &str, _change_set_id: &str) -> Result<()> {
        self.record(Call::DeleteChangeSet(stack_name.to_string()))
    }

    async fn delete_stack(&self, stack_name: &str) -> Result<()> {
        self.record(Call::DeleteStack(stack_name.to_string()))?;
        self.with(stack_name, |stack| {
            if let Some(current) = &mut stack.current {
                current.status = StackStatus::DeleteInProgress;
            }
            stack.steps = VecDeque::from([None]);
        });
        Ok(())
    }

    async fn describe_stack_events(&self, stack_name: &str) -> Result<Vec<StackEvent>> {
        self.record(Call::DescribeStackEvents(stack_name.to_string()))?;
        Ok(self.with(stack_name, |stack| stack.events.clone()))
    }
}

/// Hands out the same fake client; resources listed in `unauthorized` get no client
pub struct FakeFactory {
    client: Arc<FakeControlPlane>,
    unauthorized: HashSet<String>,
}

impl FakeFactory {
    pub fn new(client: Arc<FakeControlPlane>) -> Self {
        Self {
            client,
            unauthorized: HashSet::new(),
        }
    }

    pub fn deny(mut self, resource: &str) -> Self {
        self.unauthorized.insert(resource.to_string());
        self
    }
}

#[async_trait]
impl ClientFactory for FakeFactory {
    async fn client_for(&self, resource: &Resource) -> Result<Arc<dyn ControlPlane>> {
        if self.unauthorized.contains(resource.id().as_str()) {
            return Err(CloudError::AuthenticationFailed(format!(
                "no credentials for {}",
                resource.id()
            )));
        }
        Ok(self.client.clone() as Arc<dyn ControlPlane>)
    }
}

/// Returns a fixed assembly for every app
pub struct FakeSynthesizer {
    assembly: CloudAssembly,
}

impl FakeSynthesizer {
    pub fn new(stacks: &[&str]) -> Self {
        Self {
            assembly: CloudAssembly {
                stacks: stacks
                    .iter()
                    .map(|name| SynthesizedStack {
                        stack_name: name.to_string(),
                        template: TemplateRef::Inline(template_body(name)),
                        assets: vec![AssetSummary {
                            files: 1,
                            docker_images: 0,
                        }],
                    })
                    .collect(),
            },
        }
    }

    pub fn with_docker_image(mut self, stack: &str) -> Self {
        for s in &mut self.assembly.stacks {
            if s.stack_name == stack {
                s.assets.push(AssetSummary {
                    files: 0,
                    docker_images: 1,
                });
            }
        }
        self
    }
}

#[async_trait]
impl Synthesizer for FakeSynthesizer {
    async fn synthesize(&self, _app: &Resource) -> Result<CloudAssembly> {
        Ok(self.assembly.clone())
    }
}

/// Snapshot store that also keeps every published label in order
#[derive(Default)]
pub struct RecordingSink {
    store: SnapshotStore,
    history: Mutex<Vec<(ResourceId, Option<String>)>>,
}

impl RecordingSink {
    pub fn snapshot(&self, id: &str) -> Option<ResourceSnapshot> {
        self.store.snapshot(&id.into())
    }

    pub fn label(&self, id: &str) -> Option<String> {
        self.snapshot(id).and_then(|s| s.label().map(str::to_string))
    }

    pub fn labels(&self, id: &str) -> Vec<String> {
        self.history
            .lock()
            .unwrap()
            .iter()
            .filter(|(r, _)| r.as_str() == id)
            .filter_map(|(_, label)| label.clone())
            .collect()
    }
}

#[async_trait]
impl NotificationSink for RecordingSink {
    async fn publish_update(
        &self,
        resource: &ResourceId,
        transform: SnapshotTransform,
    ) -> ResourceSnapshot {
        let snapshot = self.store.publish_update(resource, transform).await;
        self.history
            .lock()
            .unwrap()
            .push((resource.clone(), snapshot.label().map(str::to_string)));
        snapshot
    }
}

pub fn template_body(name: &str) -> String {
    format!(
        r#"{{"Resources":{{"{}Queue":{{"Type":"AWS::SQS::Queue"}}}}}}"#,
        name
    )
}

pub fn template_stack(name: &str) -> Resource {
    Resource::new(name, ResourceKind::TemplateStack).with_spec(ResourceSpec {
        template_body: Some(template_body(name)),
        ..Default::default()
    })
}

pub fn executor_config() -> ExecutorConfig {
    ExecutorConfig::default()
}

pub fn registry(
    client: Arc<FakeControlPlane>,
    synthesizer: FakeSynthesizer,
) -> ProvisionerRegistry {
    registry_with(FakeFactory::new(client), synthesizer)
}

pub fn registry_with(factory: FakeFactory, synthesizer: FakeSynthesizer) -> ProvisionerRegistry {
    ProvisionerRegistry::with_defaults(
        Arc::new(factory),
        Arc::new(DeclaredTemplateProvider),
        Arc::new(synthesizer),
        executor_config(),
        NAMESPACE,
    )
}
