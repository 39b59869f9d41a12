use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

use log::{error, warn};
use mongodb::bson::oid::ObjectId;
use tokio::sync::Notify;

use crate::database::ForumStore;
use crate::utils::retry::retry_once;

#[derive(Debug, Clone, Copy)]
enum Counter {
    CommentCount,
    MemberCount,
}

/// The only writer of `comment_count` and `member_count`.
///
/// Callers hand it a delta only after their conditional write reported a real
/// state change, so each delta lands exactly once. A delta that still fails
/// after one retry is logged and counted; reaching the failure threshold wakes
/// the reconciler instead of failing the request that caused it.
pub struct CounterProjector {
    store: Arc<dyn ForumStore>,
    failures: AtomicU32,
    threshold: u32,
    signal: Arc<Notify>,
}

impl CounterProjector {
    pub fn new(store: Arc<dyn ForumStore>, threshold: u32) -> Self {
        CounterProjector {
            store,
            failures: AtomicU32::new(0),
            threshold: threshold.max(1),
            signal: Arc::new(Notify::new()),
        }
    }

    /// Notified whenever enough projector writes failed to warrant a pass.
    pub fn reconcile_signal(&self) -> Arc<Notify> {
        self.signal.clone()
    }

    /// Failures seen since the last reconciliation request.
    pub fn pending_failures(&self) -> u32 {
        self.failures.load(Ordering::SeqCst)
    }

    pub async fn comment_added(&self, post_id: &ObjectId) {
        self.apply(Counter::CommentCount, post_id, 1).await;
    }

    pub async fn comment_removed(&self, post_id: &ObjectId) {
        self.apply(Counter::CommentCount, post_id, -1).await;
    }

    pub async fn member_joined(&self, community_id: &ObjectId) {
        self.apply(Counter::MemberCount, community_id, 1).await;
    }

    pub async fn member_left(&self, community_id: &ObjectId) {
        self.apply(Counter::MemberCount, community_id, -1).await;
    }

    async fn apply(&self, counter: Counter, id: &ObjectId, delta: i64) {
        let store = &self.store;
        let result = retry_once("counter update", || async move {
            match counter {
                Counter::CommentCount => store.increment_comment_count(id, delta).await,
                Counter::MemberCount => store.increment_member_count(id, delta).await,
            }
        })
        .await;

        if let Err(err) = result {
            error!("Failed to apply {:?} delta {} to {}: {}", counter, delta, id, err);
            self.record_failure();
        }
    }

    fn record_failure(&self) {
        let failures = self.failures.fetch_add(1, Ordering::SeqCst) + 1;
        if failures >= self.threshold {
            self.failures.store(0, Ordering::SeqCst);
            warn!(
                "{} counter updates failed, requesting reconciliation",
                failures
            );
            self.signal.notify_one();
        }
    }
}
