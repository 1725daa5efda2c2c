use chrono::{DateTime, Utc};
use futures::StreamExt;
use k8s_openapi::api::core::v1::Secret;
use kube::{
    api::{Api, ListParams, ResourceExt},
    client::Client,
    runtime::{
        controller::{Action, Controller},
        events::{Event, EventType, Recorder, Reporter},
        finalizer::{finalizer, Event as Finalizer},
        watcher::{self, Config},
    },
    Resource,
};
use serde::Serialize;
use std::future::Future;
use std::sync::Arc;
use tokio::{sync::RwLock, time::Duration};
use tracing::*;

use crate::api::v1::rosacluster::{RosaCluster, ROSA_CLUSTER_FINALIZER};
use crate::cluster::builder::{build_cluster_spec, BuilderConfig};
use crate::cluster::desired::DesiredState;
use crate::cluster::patch::{build_cluster_patch, validate_update};
use crate::controllers::secrets;
use crate::deletion::{await_deletion, default_destroy_timeout, DeletionOutcome};
use crate::ocm::api::ClusterManager;
use crate::cluster::types::ClusterSpec;
use crate::ocm::types::{Cluster, ClusterState};
use crate::upgrade::{reconcile_upgrade, UpgradeRequest};
use crate::util::cluster_status::{self, ClusterPhase, ClusterStatusManager};
use crate::util::config::OperatorConfig;
use crate::util::errors::{self, Error, Result};
use crate::util::metrics;

pub const FIELD_MANAGER: &str = "rosa-cluster-controller";
const RESYNC_INTERVAL: Duration = Duration::from_secs(5 * 60);

/// Returns the remote cluster for `name`, creating it from `build` only when the management API
/// has none. A create whose status write was lost is picked up on the next reconcile instead of
/// being sent again. The flag tells whether this call created the cluster.
pub async fn find_or_create_cluster<F, Fut>(api: &dyn ClusterManager, name: &str, build: F) -> Result<(Cluster, bool)>
where
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<ClusterSpec>>,
{
    if let Some(existing) = api.find_cluster_by_name(name).await? {
        info!(cluster_id = %existing.id, "Found existing cluster {name}, not creating it again");
        return Ok((existing, false));
    }
    let spec = build().await?;
    let remote = api.create_cluster(&spec).await?;
    info!(cluster_id = %remote.id, "Created cluster {name}");
    Ok((remote, true))
}

impl RosaCluster {
    // Reconcile (for non-finalizer related changes)
    pub async fn reconcile(&self, ctx: Arc<Context>) -> Result<Action> {
        let status_manager = ClusterStatusManager::new(&ctx.client, self);

        let outcome = match self.cluster_id() {
            None => self.create(&ctx, &status_manager).await,
            Some(cluster_id) => self.sync(&ctx, &status_manager, cluster_id).await,
        };

        match outcome {
            Ok(action) => Ok(action),
            // Waiting will not help, the resource has to change first
            Err(e) if e.is_terminal() => {
                warn!("reconcile of {} stopped: {}", self.name_any(), e);
                ctx.metrics.reconcile_failure(self, &e);
                status_manager
                    .update(|status, generation| {
                        cluster_status::record_failure(status, &e, generation);
                        Ok(())
                    })
                    .await?;
                self.publish(&ctx, EventType::Warning, "ReconcileFailed", e.to_string())
                    .await?;
                Ok(Action::await_change())
            }
            Err(Error::ErrorWithRequeue(error)) => Ok(Action::requeue(error.duration)),
            Err(e) => Err(e),
        }
    }

    async fn create(&self, ctx: &Context, status_manager: &ClusterStatusManager<'_>) -> Result<Action> {
        let (remote, created) =
            find_or_create_cluster(ctx.ocm.as_ref(), &self.spec.name, || self.build_for_create(ctx)).await?;

        status_manager
            .update(|status, generation| {
                cluster_status::observe_remote(status, &remote, generation);
                cluster_status::record_applied(status, &self.spec, generation)
            })
            .await?;
        if created {
            self.publish(ctx, EventType::Normal, "Created", format!("Created cluster `{}`", remote.id))
                .await?;
        }
        Ok(Action::requeue(ctx.not_ready_requeue()))
    }

    async fn build_for_create(&self, ctx: &Context) -> Result<ClusterSpec> {
        let desired = DesiredState::from_spec(&self.spec, &ctx.config.default_channel_group)?;

        let stored = match desired.admin {
            Some(_) => secrets::load_admin_credentials(&ctx.client, self).await?,
            None => None,
        };
        let desired = desired.with_admin_password(stored.as_ref().map(|c| c.password.clone()));

        let built = build_cluster_spec(ctx.ocm.as_ref(), &desired, &ctx.builder).await?;
        if let (Some(credentials), None) = (&built.admin, &stored) {
            secrets::store_admin_credentials(&ctx.client, self, credentials).await?;
        }
        debug!(
            version = built.resolved_version.as_deref().unwrap_or_default(),
            "Built cluster {}",
            self.spec.name
        );
        Ok(built.spec)
    }

    async fn sync(&self, ctx: &Context, status_manager: &ClusterStatusManager<'_>, cluster_id: &str) -> Result<Action> {
        let remote = ctx.ocm.get_cluster(cluster_id).await?;
        status_manager
            .update(|status, generation| {
                cluster_status::observe_remote(status, &remote, generation);
                Ok(())
            })
            .await?;

        if remote.state != ClusterState::Ready {
            debug!(cluster_id, state = ?remote.state, "Cluster not ready, waiting");
            return Ok(Action::requeue(ctx.not_ready_requeue()));
        }

        let previous = self.last_applied_spec().unwrap_or_else(|| self.spec.clone());
        if previous == self.spec {
            return Ok(Action::requeue(RESYNC_INTERVAL));
        }

        let default_group = ctx.config.default_channel_group.as_str();
        validate_update(&previous, &self.spec, default_group)?;
        status_manager.update_phase(ClusterPhase::Updating).await?;

        let channel_group = remote
            .version
            .as_ref()
            .map(|v| v.channel_group.as_str())
            .filter(|g| !g.is_empty())
            .or(previous.channel_group.as_deref())
            .unwrap_or(default_group);
        let decision = reconcile_upgrade(
            ctx.ocm.as_ref(),
            &UpgradeRequest {
                topology: self.spec.topology,
                cluster_id,
                current_version: remote.current_version(),
                channel_group,
                desired_version: self.spec.version.as_deref(),
                previous_desired_version: previous.version.as_deref(),
                acknowledgements_for: self.spec.upgrade_acknowledgements_for.as_deref(),
            },
        )
        .await
        .map_err(|e| e.context(format!("Can't upgrade cluster version with identifier: `{cluster_id}`")))?;
        ctx.metrics.upgrade_decision(decision);

        let patch = build_cluster_patch(
            ctx.ocm.as_ref(),
            &previous,
            &self.spec,
            remote.current_version(),
            &ctx.builder,
            default_group,
        )
        .await?;
        if !patch.is_empty() {
            ctx.ocm.update_cluster(cluster_id, &patch).await?;
        }

        status_manager
            .update(|status, generation| {
                status.phase = Some(ClusterPhase::Ready.to_string());
                cluster_status::record_applied(status, &self.spec, generation)
            })
            .await?;
        self.publish(
            ctx,
            EventType::Normal,
            "Updated",
            format!("Applied spec to `{cluster_id}`, upgrade: {}", decision.as_str()),
        )
        .await?;
        Ok(Action::requeue(RESYNC_INTERVAL))
    }

    // Finalizer cleanup (the object was deleted, ensure nothing is orphaned)
    async fn cleanup(&self, ctx: Arc<Context>) -> Result<Action> {
        self.publish(&ctx, EventType::Normal, "DeleteRequested", format!("Delete `{}`", self.name_any()))
            .await?;
        let Some(cluster_id) = self.cluster_id() else {
            return Ok(Action::await_change());
        };
        ClusterStatusManager::new(&ctx.client, self)
            .update_phase(ClusterPhase::Terminating)
            .await?;

        match ctx.ocm.delete_cluster(cluster_id).await {
            Ok(()) => info!(cluster_id, "Delete requested"),
            Err(e) if e.is_not_found() => {
                info!(cluster_id, "Cluster already gone");
                return Ok(Action::await_change());
            }
            Err(e) => return Err(e),
        }

        if self.spec.disable_waiting_in_destroy {
            info!(cluster_id, "Waiting for destroy to be completed, is disabled");
            return Ok(Action::await_change());
        }
        let timeout = self
            .spec
            .destroy_timeout
            .unwrap_or_else(|| default_destroy_timeout(self.spec.topology));
        if await_deletion(ctx.ocm.as_ref(), cluster_id, timeout).await? == DeletionOutcome::TimedOut {
            self.publish(
                &ctx,
                EventType::Warning,
                "DeletionTimedOut",
                format!(
                    "The cluster with identifier '{cluster_id}' is not deleted yet, but the polling finished due to a timeout"
                ),
            )
            .await?;
        }
        Ok(Action::await_change())
    }

    async fn publish(&self, ctx: &Context, type_: EventType, reason: &str, note: String) -> Result<()> {
        let recorder = ctx.diagnostics.read().await.recorder(ctx.client.clone());
        recorder
            .publish(
                &Event {
                    type_,
                    reason: reason.into(),
                    note: Some(note),
                    action: "Reconciling".into(),
                    secondary: None,
                },
                &self.object_ref(&()),
            )
            .await
            .map_err(Error::kube)
    }
}

/// State shared between the controller and the web server
#[derive(Clone, Default)]
pub struct State {
    /// Diagnostics populated by the reconciler
    diagnostics: Arc<RwLock<Diagnostics>>,
    /// Metrics registry
    registry: prometheus::Registry,
}

/// State wrapper around the controller outputs for the web server
impl State {
    /// Metrics getter
    pub fn metrics(&self) -> Vec<prometheus::proto::MetricFamily> {
        self.registry.gather()
    }

    /// State getter
    pub async fn diagnostics(&self) -> Diagnostics {
        self.diagnostics.read().await.clone()
    }

    // Create a Controller Context that can update State
    pub fn to_context(
        &self,
        client: Client,
        ocm: Arc<dyn ClusterManager>,
        config: OperatorConfig,
    ) -> Result<Arc<Context>, prometheus::Error> {
        Ok(Arc::new(Context {
            client,
            ocm,
            config,
            builder: BuilderConfig::default(),
            metrics: metrics::Metrics::default().register(&self.registry)?,
            diagnostics: self.diagnostics.clone(),
        }))
    }
}

// Context for our reconciler
#[derive(Clone)]
pub struct Context {
    /// Kubernetes client
    pub client: Client,
    /// Cluster management API
    pub ocm: Arc<dyn ClusterManager>,
    pub config: OperatorConfig,
    pub builder: BuilderConfig,
    /// Diagnostics read by the web server
    pub diagnostics: Arc<RwLock<Diagnostics>>,
    /// Prometheus metrics
    pub metrics: metrics::Metrics,
}

impl Context {
    fn not_ready_requeue(&self) -> Duration {
        Duration::from_secs(self.config.not_ready_requeue_seconds)
    }
}

pub async fn reconcile(rosa_cluster: Arc<RosaCluster>, ctx: Arc<Context>) -> Result<Action> {
    let _timer = ctx.metrics.count_and_measure("rosa_cluster");
    ctx.diagnostics.write().await.last_event = Utc::now();

    let ns = rosa_cluster
        .namespace()
        .ok_or_else(|| Error::StdError(errors::StdError::MetadataMissing("namespace".to_string())))?;
    let rosa_clusters: Api<RosaCluster> = Api::namespaced(ctx.client.clone(), &ns);

    info!("Reconciling RosaCluster \"{}\" in {}", rosa_cluster.name_any(), ns);
    finalizer(&rosa_clusters, ROSA_CLUSTER_FINALIZER, rosa_cluster, |event| async {
        match event {
            Finalizer::Apply(rosa_cluster) => rosa_cluster.reconcile(ctx.clone()).await,
            Finalizer::Cleanup(rosa_cluster) => rosa_cluster.cleanup(ctx.clone()).await,
        }
    })
    .await
    .map_err(|e| Error::StdError(errors::StdError::FinalizerError(Box::new(e))))
}

/// Diagnostics to be exposed by the web server
#[derive(Clone, Serialize)]
pub struct Diagnostics {
    pub last_event: DateTime<Utc>,
    #[serde(skip)]
    pub reporter: Reporter,
}
impl Default for Diagnostics {
    fn default() -> Self {
        Self {
            last_event: Utc::now(),
            reporter: FIELD_MANAGER.into(),
        }
    }
}
impl Diagnostics {
    fn recorder(&self, client: Client) -> Recorder {
        Recorder::new(client, self.reporter.clone())
    }
}

fn error_policy(rosa_cluster: Arc<RosaCluster>, error: &Error, ctx: Arc<Context>) -> Action {
    warn!("reconcile failed: {:?}", error);
    ctx.metrics.reconcile_failure(&rosa_cluster, error);
    Action::requeue(RESYNC_INTERVAL)
}

/// Initialize the controller and shared state (given the crd is installed)
pub async fn run(state: State, ocm: Arc<dyn ClusterManager>, config: OperatorConfig) -> Result<()> {
    let client = Client::try_default().await.map_err(Error::kube)?;

    let rosa_clusters = Api::<RosaCluster>::all(client.clone());
    if let Err(e) = rosa_clusters.list(&ListParams::default().limit(1)).await {
        error!("CRD is not queryable; {e:?}. Is the CRD installed?");
        info!("Installation: cargo run --bin crdgen | kubectl apply -f -");
        return Err(Error::kube(e));
    }

    let ctx = state
        .to_context(client.clone(), ocm, config)
        .map_err(|e| Error::StdError(errors::StdError::Metrics(e)))?;

    Controller::new(rosa_clusters, Config::default().any_semantic())
        .owns(
            Api::<Secret>::all(client.clone()),
            watcher::Config::default().labels("app.kubernetes.io/component=admin-credentials"),
        )
        .run(reconcile, error_policy, ctx)
        .filter_map(|x| async move { std::result::Result::ok(x) })
        .for_each(|_| futures::future::ready(()))
        .await;
    Ok(())
}
