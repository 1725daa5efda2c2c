//! Confirms that a deleted cluster is really gone.

use std::future::Future;
use tokio::time::{sleep, Duration, Instant};
use tracing::{debug, info, warn};

use crate::cluster::types::Topology;
use crate::ocm::api::ClusterManager;
use crate::util::errors::Result;

pub const DEFAULT_DESTROY_TIMEOUT_MINUTES: i64 = 60;
pub const HOSTED_DESTROY_TIMEOUT_MINUTES: i64 = 20;
/// Longer requested timeouts are capped to one week.
pub const MAX_DESTROY_TIMEOUT_MINUTES: i64 = 7 * 24 * 60;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DeletionOutcome {
    Confirmed,
    /// The delete request went through but the cluster was still there when the timeout expired.
    TimedOut,
}

/// How long to wait when the resource does not say.
pub fn default_destroy_timeout(topology: Topology) -> i64 {
    match topology {
        Topology::Classic => DEFAULT_DESTROY_TIMEOUT_MINUTES,
        Topology::HostedControlPlane => HOSTED_DESTROY_TIMEOUT_MINUTES,
    }
}

/// Converts a requested timeout in minutes, replacing non-positive values with the default and
/// capping large ones at [`MAX_DESTROY_TIMEOUT_MINUTES`].
pub fn destroy_timeout(cluster_id: &str, timeout_minutes: i64) -> Duration {
    let minutes = if timeout_minutes <= 0 {
        warn!(
            cluster_id,
            timeout_minutes,
            "Can't poll cluster state with a non-positive timeout, using {DEFAULT_DESTROY_TIMEOUT_MINUTES} minutes"
        );
        DEFAULT_DESTROY_TIMEOUT_MINUTES
    } else if timeout_minutes > MAX_DESTROY_TIMEOUT_MINUTES {
        warn!(
            cluster_id,
            timeout_minutes,
            "Destroy timeout is too long, using {MAX_DESTROY_TIMEOUT_MINUTES} minutes"
        );
        MAX_DESTROY_TIMEOUT_MINUTES
    } else {
        timeout_minutes
    };
    // Bounded above, so the conversion and the multiplication cannot overflow
    Duration::from_secs(minutes.unsigned_abs() * 60)
}

#[derive(Clone, Copy, Debug)]
pub struct DeletionPoller {
    pub interval: Duration,
    pub attempts: u32,
    pub initial_delay: Duration,
}

impl Default for DeletionPoller {
    fn default() -> Self {
        DeletionPoller {
            interval: Duration::from_secs(2 * 60),
            attempts: 3,
            initial_delay: Duration::from_secs(60),
        }
    }
}

/// Runs `operation` up to `attempts` times, sleeping `initial_delay` after the first failure and
/// twice as long after each further one. The last error is returned.
pub async fn retry_with_backoff<T, F, Fut>(attempts: u32, initial_delay: Duration, mut operation: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut remaining = attempts.max(1);
    let mut delay = initial_delay;
    loop {
        match operation().await {
            Ok(value) => return Ok(value),
            Err(e) => {
                remaining -= 1;
                if remaining == 0 {
                    return Err(e);
                }
                warn!(error = %e, retry_in = ?delay, remaining, "Operation failed, retrying");
                sleep(delay).await;
                delay *= 2;
            }
        }
    }
}

/// Polls the cluster every `interval` until the API reports it as not found or `timeout` expires.
pub async fn wait_for_disappearance(
    api: &dyn ClusterManager,
    cluster_id: &str,
    interval: Duration,
    timeout: Duration,
) -> Result<DeletionOutcome> {
    // No deadline when it lies beyond what the clock can represent
    let deadline = Instant::now().checked_add(timeout);
    loop {
        match api.get_cluster(cluster_id).await {
            Ok(cluster) => debug!(cluster_id, state = ?cluster.state, "Cluster still present"),
            Err(e) if e.is_not_found() => return Ok(DeletionOutcome::Confirmed),
            Err(e) => return Err(e),
        }
        let pause = match deadline {
            Some(deadline) => {
                let now = Instant::now();
                if now >= deadline {
                    return Ok(DeletionOutcome::TimedOut);
                }
                interval.min(deadline - now)
            }
            None => interval,
        };
        sleep(pause).await;
    }
}

impl DeletionPoller {
    pub async fn await_deletion(
        &self,
        api: &dyn ClusterManager,
        cluster_id: &str,
        timeout_minutes: i64,
    ) -> Result<DeletionOutcome> {
        let timeout = destroy_timeout(cluster_id, timeout_minutes);

        let outcome = retry_with_backoff(self.attempts, self.initial_delay, || {
            wait_for_disappearance(api, cluster_id, self.interval, timeout)
        })
        .await
        .map_err(|e| e.context(format!("Can't poll state of cluster with identifier '{cluster_id}'")))?;

        match outcome {
            DeletionOutcome::Confirmed => info!(cluster_id, "Cluster deleted"),
            DeletionOutcome::TimedOut => warn!(
                cluster_id,
                "The cluster with identifier '{cluster_id}' is not deleted yet, but the polling finished due to a timeout"
            ),
        }
        Ok(outcome)
    }
}

/// Waits with the default poll interval and backoff.
pub async fn await_deletion(
    api: &dyn ClusterManager,
    cluster_id: &str,
    timeout_minutes: i64,
) -> Result<DeletionOutcome> {
    DeletionPoller::default()
        .await_deletion(api, cluster_id, timeout_minutes)
        .await
}
