use std::sync::Arc;
use std::time::Duration;

use log::{debug, error, info, warn};
use mongodb::bson::oid::ObjectId;
use serde::Serialize;
use tokio::sync::Notify;

use crate::database::ForumStore;
use crate::utils::error::ForumError;

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReconcileReport {
    pub posts_checked: u64,
    pub posts_corrected: u64,
    pub communities_checked: u64,
    pub communities_corrected: u64,
}

/// Recount attempts per entity before leaving it to the next pass.
const REPAIR_ATTEMPTS: usize = 3;

/// Recounts derived counters from their source rows and overwrites stale
/// values.
///
/// A repair only lands if the counter still holds the value read before the
/// recount, so a projector delta applied in between is never overwritten.
pub struct Reconciler {
    store: Arc<dyn ForumStore>,
}

impl Reconciler {
    pub fn new(store: Arc<dyn ForumStore>) -> Self {
        Reconciler { store }
    }

    /// Returns whether `comment_count` had drifted and was repaired.
    pub async fn reconcile_post(&self, post_id: &ObjectId) -> Result<bool, ForumError> {
        for _ in 0..REPAIR_ATTEMPTS {
            let Some(post) = self.store.find_post(post_id).await? else {
                return Ok(false);
            };
            let actual = self.store.count_live_comments(post_id).await? as i64;
            if post.comment_count == actual {
                return Ok(false);
            }

            if self
                .store
                .set_comment_count(post_id, post.comment_count, actual)
                .await?
            {
                warn!(
                    "comment_count drift on post {}: stored {}, actual {}",
                    post_id, post.comment_count, actual
                );
                return Ok(true);
            }
            debug!("comment_count of post {} moved during recount, retrying", post_id);
        }

        warn!("Gave up repairing comment_count of post {} for this pass", post_id);
        Ok(false)
    }

    /// Returns whether `member_count` had drifted and was repaired.
    pub async fn reconcile_community(&self, community_id: &ObjectId) -> Result<bool, ForumError> {
        for _ in 0..REPAIR_ATTEMPTS {
            let Some(community) = self.store.find_community(community_id).await? else {
                return Ok(false);
            };
            let actual = self.store.count_members(community_id).await? as i64;
            if community.member_count == actual {
                return Ok(false);
            }

            if self
                .store
                .set_member_count(community_id, community.member_count, actual)
                .await?
            {
                warn!(
                    "member_count drift on community {}: stored {}, actual {}",
                    community_id, community.member_count, actual
                );
                return Ok(true);
            }
            debug!(
                "member_count of community {} moved during recount, retrying",
                community_id
            );
        }

        warn!(
            "Gave up repairing member_count of community {} for this pass",
            community_id
        );
        Ok(false)
    }

    pub async fn run_pass(&self) -> Result<ReconcileReport, ForumError> {
        let mut report = ReconcileReport::default();

        for post_id in self.store.post_ids().await? {
            report.posts_checked += 1;
            if self.reconcile_post(&post_id).await? {
                report.posts_corrected += 1;
            }
        }

        for community_id in self.store.community_ids().await? {
            report.communities_checked += 1;
            if self.reconcile_community(&community_id).await? {
                report.communities_corrected += 1;
            }
        }

        Ok(report)
    }
}

/// Runs a reconciliation pass every `interval`, and early whenever `signal`
/// fires.
pub fn spawn_reconciler(
    reconciler: Arc<Reconciler>,
    interval: Duration,
    signal: Arc<Notify>,
) -> tokio::task::JoinHandle<()> {
    actix_web::rt::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        loop {
            tokio::select! {
                _ = ticker.tick() => {}
                _ = signal.notified() => {
                    info!("Counter failures crossed the threshold, reconciling now");
                }
            }

            match reconciler.run_pass().await {
                Ok(report) if report.posts_corrected + report.communities_corrected > 0 => {
                    info!("Reconciliation corrected counters: {:?}", report);
                }
                Ok(_) => {}
                Err(err) => error!("Reconciliation pass failed: {}", err),
            }
        }
    })
}
