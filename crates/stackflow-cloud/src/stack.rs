//! Control plane abstraction
//!
//! The stack deployment API (describe / change set / execute / events) and the
//! factory that hands out authenticated clients for it. The CloudFormation
//! implementation lives in `stackflow-cloud-aws`; tests use a scripted one.

use crate::error::Result;
use crate::resource::Resource;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Stack deployment control plane
#[async_trait]
pub trait ControlPlane: Send + Sync {
    /// Whether requests go to the public cloud endpoint (console links only make sense there)
    fn is_public_endpoint(&self) -> bool;

    /// Describe a stack; `Ok(None)` when it does not exist
    async fn describe_stack(&self, stack_name: &str) -> Result<Option<StackDescription>>;

    /// Submit a diff against the stack (or a creation request when it is new)
    async fn create_change_set(&self, request: &ChangeSetRequest) -> Result<String>;

    async fn describe_change_set(
        &self,
        stack_name: &str,
        change_set_id: &str,
    ) -> Result<ChangeSetDescription>;

    async fn execute_change_set(&self, stack_name: &str, change_set_id: &str) -> Result<()>;

    async fn delete_change_set(&self, stack_name: &str, change_set_id: &str) -> Result<()>;

    async fn delete_stack(&self, stack_name: &str) -> Result<()>;

    /// Most recent events first
    async fn describe_stack_events(&self, stack_name: &str) -> Result<Vec<StackEvent>>;
}

/// Builds an authenticated control plane client for a resource
#[async_trait]
pub trait ClientFactory: Send + Sync {
    /// Fails with `AuthenticationFailed`/`InvalidConfig` when no client can be established
    async fn client_for(&self, resource: &Resource) -> Result<Arc<dyn ControlPlane>>;
}

/// Status of a remote stack
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "String", from = "String")]
pub enum StackStatus {
    CreateInProgress,
    CreateFailed,
    CreateComplete,
    RollbackInProgress,
    RollbackFailed,
    RollbackComplete,
    DeleteInProgress,
    DeleteFailed,
    DeleteComplete,
    UpdateInProgress,
    UpdateCompleteCleanupInProgress,
    UpdateComplete,
    UpdateFailed,
    UpdateRollbackInProgress,
    UpdateRollbackFailed,
    UpdateRollbackCompleteCleanupInProgress,
    UpdateRollbackComplete,
    ReviewInProgress,
    ImportInProgress,
    ImportComplete,
    ImportRollbackInProgress,
    ImportRollbackFailed,
    ImportRollbackComplete,
    Unknown(String),
}

impl StackStatus {
    pub fn as_str(&self) -> &str {
        match self {
            StackStatus::CreateInProgress => "CREATE_IN_PROGRESS",
            StackStatus::CreateFailed => "CREATE_FAILED",
            StackStatus::CreateComplete => "CREATE_COMPLETE",
            StackStatus::RollbackInProgress => "ROLLBACK_IN_PROGRESS",
            StackStatus::RollbackFailed => "ROLLBACK_FAILED",
            StackStatus::RollbackComplete => "ROLLBACK_COMPLETE",
            StackStatus::DeleteInProgress => "DELETE_IN_PROGRESS",
            StackStatus::DeleteFailed => "DELETE_FAILED",
            StackStatus::DeleteComplete => "DELETE_COMPLETE",
            StackStatus::UpdateInProgress => "UPDATE_IN_PROGRESS",
            StackStatus::UpdateCompleteCleanupInProgress => "UPDATE_COMPLETE_CLEANUP_IN_PROGRESS",
            StackStatus::UpdateComplete => "UPDATE_COMPLETE",
            StackStatus::UpdateFailed => "UPDATE_FAILED",
            StackStatus::UpdateRollbackInProgress => "UPDATE_ROLLBACK_IN_PROGRESS",
            StackStatus::UpdateRollbackFailed => "UPDATE_ROLLBACK_FAILED",
            StackStatus::UpdateRollbackCompleteCleanupInProgress => {
                "UPDATE_ROLLBACK_COMPLETE_CLEANUP_IN_PROGRESS"
            }
            StackStatus::UpdateRollbackComplete => "UPDATE_ROLLBACK_COMPLETE",
            StackStatus::ReviewInProgress => "REVIEW_IN_PROGRESS",
            StackStatus::ImportInProgress => "IMPORT_IN_PROGRESS",
            StackStatus::ImportComplete => "IMPORT_COMPLETE",
            StackStatus::ImportRollbackInProgress => "IMPORT_ROLLBACK_IN_PROGRESS",
            StackStatus::ImportRollbackFailed => "IMPORT_ROLLBACK_FAILED",
            StackStatus::ImportRollbackComplete => "IMPORT_ROLLBACK_COMPLETE",
            StackStatus::Unknown(s) => s,
        }
    }

    /// An operation is still running against the stack
    pub fn is_in_progress(&self) -> bool {
        self.as_str().ends_with("_IN_PROGRESS") && *self != StackStatus::ReviewInProgress
    }

    /// The last operation converged
    pub fn is_success(&self) -> bool {
        matches!(
            self,
            StackStatus::CreateComplete | StackStatus::UpdateComplete | StackStatus::ImportComplete
        )
    }

    /// No further transition will happen without a new request
    pub fn is_terminal(&self) -> bool {
        !self.is_in_progress()
    }

    /// A first creation failed and rolled back; the stack cannot be updated, only replaced
    pub fn needs_replacement(&self) -> bool {
        matches!(self, StackStatus::RollbackComplete)
    }
}

impl From<&str> for StackStatus {
    fn from(s: &str) -> Self {
        match s {
            "CREATE_IN_PROGRESS" => StackStatus::CreateInProgress,
            "CREATE_FAILED" => StackStatus::CreateFailed,
            "CREATE_COMPLETE" => StackStatus::CreateComplete,
            "ROLLBACK_IN_PROGRESS" => StackStatus::RollbackInProgress,
            "ROLLBACK_FAILED" => StackStatus::RollbackFailed,
            "ROLLBACK_COMPLETE" => StackStatus::RollbackComplete,
            "DELETE_IN_PROGRESS" => StackStatus::DeleteInProgress,
            "DELETE_FAILED" => StackStatus::DeleteFailed,
            "DELETE_COMPLETE" => StackStatus::DeleteComplete,
            "UPDATE_IN_PROGRESS" => StackStatus::UpdateInProgress,
            "UPDATE_COMPLETE_CLEANUP_IN_PROGRESS" => StackStatus::UpdateCompleteCleanupInProgress,
            "UPDATE_COMPLETE" => StackStatus::UpdateComplete,
            "UPDATE_FAILED" => StackStatus::UpdateFailed,
            "UPDATE_ROLLBACK_IN_PROGRESS" => StackStatus::UpdateRollbackInProgress,
            "UPDATE_ROLLBACK_FAILED" => StackStatus::UpdateRollbackFailed,
            "UPDATE_ROLLBACK_COMPLETE_CLEANUP_IN_PROGRESS" => {
                StackStatus::UpdateRollbackCompleteCleanupInProgress
            }
            "UPDATE_ROLLBACK_COMPLETE" => StackStatus::UpdateRollbackComplete,
            "REVIEW_IN_PROGRESS" => StackStatus::ReviewInProgress,
            "IMPORT_IN_PROGRESS" => StackStatus::ImportInProgress,
            "IMPORT_COMPLETE" => StackStatus::ImportComplete,
            "IMPORT_ROLLBACK_IN_PROGRESS" => StackStatus::ImportRollbackInProgress,
            "IMPORT_ROLLBACK_FAILED" => StackStatus::ImportRollbackFailed,
            "IMPORT_ROLLBACK_COMPLETE" => StackStatus::ImportRollbackComplete,
            other => StackStatus::Unknown(other.to_string()),
        }
    }
}

impl From<String> for StackStatus {
    fn from(s: String) -> Self {
        StackStatus::from(s.as_str())
    }
}

impl From<StackStatus> for String {
    fn from(status: StackStatus) -> Self {
        status.as_str().to_string()
    }
}

impl std::fmt::Display for StackStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One stack output value
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StackOutput {
    pub key: String,
    pub value: String,
    pub description: Option<String>,
}

impl StackOutput {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
            description: None,
        }
    }
}

/// Snapshot of a remote stack
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StackDescription {
    pub stack_id: String,
    pub stack_name: String,
    pub status: StackStatus,
    pub status_reason: Option<String>,
    /// Outputs in the order the control plane reports them
    pub outputs: Vec<StackOutput>,
}

/// Whether a change set creates a stack or updates it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeSetType {
    Create,
    Update,
}

impl std::fmt::Display for ChangeSetType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ChangeSetType::Create => write!(f, "create"),
            ChangeSetType::Update => write!(f, "update"),
        }
    }
}

/// Diff submission for one stack
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeSetRequest {
    pub stack_name: String,
    pub change_set_name: String,
    pub change_set_type: ChangeSetType,
    pub template_body: String,
    pub parameters: BTreeMap<String, String>,
    pub capabilities: Vec<String>,
}

/// Status of a change set while it is being computed
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChangeSetStatus {
    CreatePending,
    CreateInProgress,
    CreateComplete,
    Failed,
    Other(String),
}

impl From<&str> for ChangeSetStatus {
    fn from(s: &str) -> Self {
        match s {
            "CREATE_PENDING" => ChangeSetStatus::CreatePending,
            "CREATE_IN_PROGRESS" => ChangeSetStatus::CreateInProgress,
            "CREATE_COMPLETE" => ChangeSetStatus::CreateComplete,
            "FAILED" => ChangeSetStatus::Failed,
            other => ChangeSetStatus::Other(other.to_string()),
        }
    }
}

/// Computed diff
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeSetDescription {
    pub status: ChangeSetStatus,
    pub status_reason: Option<String>,
    /// Number of resource changes the diff would apply
    pub change_count: usize,
}

impl ChangeSetDescription {
    pub fn is_pending(&self) -> bool {
        matches!(
            self.status,
            ChangeSetStatus::CreatePending | ChangeSetStatus::CreateInProgress
        )
    }

    /// The diff failed only because there is nothing to change
    pub fn is_no_op(&self) -> bool {
        if self.status == ChangeSetStatus::CreateComplete {
            return self.change_count == 0;
        }
        self.status == ChangeSetStatus::Failed
            && self.status_reason.as_deref().is_some_and(|reason| {
                reason.contains("didn't contain changes")
                    || reason.contains("No updates are to be performed")
            })
    }
}

/// One stack event, used for failure diagnostics
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StackEvent {
    pub logical_resource_id: String,
    pub resource_type: Option<String>,
    pub resource_status: String,
    pub resource_status_reason: Option<String>,
    pub timestamp: Option<DateTime<Utc>>,
}

impl StackEvent {
    pub fn is_failure(&self) -> bool {
        self.resource_status.ends_with("_FAILED")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stack_status_classification() {
        assert!(StackStatus::CreateInProgress.is_in_progress());
        assert!(StackStatus::UpdateRollbackCompleteCleanupInProgress.is_in_progress());
        assert!(!StackStatus::ReviewInProgress.is_in_progress());

        assert!(StackStatus::UpdateComplete.is_success());
        assert!(StackStatus::UpdateRollbackComplete.is_terminal());
        assert!(!StackStatus::UpdateRollbackComplete.is_success());
        assert!(StackStatus::RollbackComplete.needs_replacement());
    }

    #[test]
    fn test_stack_status_parses_unknown_values() {
        assert_eq!(StackStatus::from("CREATE_COMPLETE"), StackStatus::CreateComplete);
        let odd = StackStatus::from("SOMETHING_NEW");
        assert_eq!(odd.as_str(), "SOMETHING_NEW");
    }

    #[test]
    fn test_change_set_no_op_detection() {
        let empty = ChangeSetDescription {
            status: ChangeSetStatus::Failed,
            status_reason: Some(
                "The submitted information didn't contain changes. Submit different information to create a change set."
                    .to_string(),
            ),
            change_count: 0,
        };
        assert!(empty.is_no_op());

        let rejected = ChangeSetDescription {
            status: ChangeSetStatus::Failed,
            status_reason: Some("Template format error: unsupported structure".to_string()),
            change_count: 0,
        };
        assert!(!rejected.is_no_op());

        let ready = ChangeSetDescription {
            status: ChangeSetStatus::CreateComplete,
            status_reason: None,
            change_count: 2,
        };
        assert!(!ready.is_no_op());
        assert!(!ready.is_pending());
    }
}
