//! Single-assignment completion signal
//!
//! Written at most once by the provisioning pipeline, read by any number of
//! dependents. A second `settle` is a no-op that reports `false`.

use crate::error::CloudError;
use std::sync::Arc;
use tokio::sync::watch;

/// Terminal outcome of provisioning one resource
pub type Outcome = std::result::Result<(), Arc<CloudError>>;

/// Result-or-error cell resolved exactly once
#[derive(Debug, Clone)]
pub struct CompletionSignal {
    tx: Arc<watch::Sender<Option<Outcome>>>,
}

impl Default for CompletionSignal {
    fn default() -> Self {
        Self::new()
    }
}

impl CompletionSignal {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(None);
        Self { tx: Arc::new(tx) }
    }

    /// Resolve the signal; returns `false` when it was already settled
    pub fn settle(&self, outcome: Outcome) -> bool {
        let mut outcome = Some(outcome);
        self.tx.send_if_modified(|slot| {
            if slot.is_some() {
                return false;
            }
            *slot = outcome.take();
            true
        })
    }

    pub fn is_settled(&self) -> bool {
        self.tx.borrow().is_some()
    }

    /// Outcome if already settled
    pub fn outcome(&self) -> Option<Outcome> {
        self.tx.borrow().clone()
    }

    /// Wait until the signal is settled
    pub async fn wait(&self) -> Outcome {
        let mut rx = self.tx.subscribe();
        match rx.wait_for(|slot| slot.is_some()).await {
            Ok(slot) => slot.clone().unwrap_or(Ok(())),
            // The sender lives as long as `self`, so the channel never closes here
            Err(_) => Err(Arc::new(CloudError::Cancelled(
                "completion signal dropped".to_string(),
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_second_settle_is_ignored() {
        let signal = CompletionSignal::new();
        assert!(!signal.is_settled());

        assert!(signal.settle(Ok(())));
        assert!(!signal.settle(Err(Arc::new(CloudError::ApiError("late".into())))));

        assert!(signal.wait().await.is_ok());
        assert!(matches!(signal.outcome(), Some(Ok(()))));
    }

    #[tokio::test]
    async fn test_observers_share_the_failure() {
        let signal = CompletionSignal::new();
        let waiters: Vec<_> = (0..4)
            .map(|_| {
                let signal = signal.clone();
                tokio::spawn(async move { signal.wait().await })
            })
            .collect();

        tokio::task::yield_now().await;
        let error = Arc::new(CloudError::StackNotFound("Orders".into()));
        assert!(signal.settle(Err(error.clone())));

        for waiter in waiters {
            let outcome = waiter.await.unwrap();
            let seen = outcome.unwrap_err();
            assert!(Arc::ptr_eq(&seen, &error));
        }
    }

    #[test]
    fn test_wait_stays_pending_until_settled() {
        let signal = CompletionSignal::new();
        let mut waiter = tokio_test::task::spawn(signal.wait());
        tokio_test::assert_pending!(waiter.poll());

        signal.settle(Ok(()));
        assert!(waiter.is_woken());
        let outcome = tokio_test::assert_ready!(waiter.poll());
        assert!(outcome.is_ok());
    }

    #[tokio::test]
    async fn test_wait_after_settle_returns_immediately() {
        let signal = CompletionSignal::new();
        signal.settle(Ok(()));
        assert!(signal.wait().await.is_ok());
    }
}
