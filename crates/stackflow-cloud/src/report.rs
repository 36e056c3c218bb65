//! Run summary

use crate::error::CloudError;
use crate::resource::ResourceId;
use std::sync::Arc;

/// A resource that ended in a failure
#[derive(Debug, Clone)]
pub struct FailedResource {
    pub resource: ResourceId,
    pub error: Arc<CloudError>,
}

/// Result of one orchestration run
#[derive(Debug, Clone, Default)]
pub struct RunReport {
    /// Provisioned successfully
    pub provisioned: Vec<ResourceId>,

    /// No provisioner was found; completed with no action
    pub skipped: Vec<ResourceId>,

    /// Failed or cancelled
    pub failed: Vec<FailedResource>,

    /// Total execution time in milliseconds
    pub duration_ms: u64,
}

impl RunReport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }

    pub fn add_success(&mut self, resource: ResourceId) {
        self.provisioned.push(resource);
    }

    pub fn add_skipped(&mut self, resource: ResourceId) {
        self.skipped.push(resource);
    }

    pub fn add_failure(&mut self, resource: ResourceId, error: Arc<CloudError>) {
        self.failed.push(FailedResource { resource, error });
    }

    pub fn total(&self) -> usize {
        self.provisioned.len() + self.skipped.len() + self.failed.len()
    }
}

impl std::fmt::Display for RunReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} provisioned, {} skipped, {} failed in {}ms",
            self.provisioned.len(),
            self.skipped.len(),
            self.failed.len(),
            self.duration_ms
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_report_summary() {
        let mut report = RunReport::new();
        report.add_success("Orders".into());
        report.add_skipped("SpecialStack".into());
        assert!(report.is_success());

        report.add_failure(
            "Billing".into(),
            Arc::new(CloudError::StackNotFound("Billing".into())),
        );
        report.duration_ms = 1250;

        assert!(!report.is_success());
        assert_eq!(report.total(), 3);
        assert_eq!(report.to_string(), "1 provisioned, 1 skipped, 1 failed in 1250ms");
    }
}
