use crate::api::v1::rosacluster::RosaCluster;
use crate::upgrade::UpgradeDecision;
use crate::util::errors::Error;
use kube::ResourceExt;
use prometheus::{histogram_opts, opts, HistogramVec, IntCounter, IntCounterVec, Registry};
use tokio::time::Instant;
use tracing::debug;

#[derive(Clone)]
pub struct Metrics {
    pub reconciliations: IntCounter,
    pub failures: IntCounterVec,
    pub reconcile_duration: HistogramVec,
    pub upgrade_decisions: IntCounterVec,
}

impl Default for Metrics {
    fn default() -> Self {
        let reconcile_duration = HistogramVec::new(
            histogram_opts!(
                "rosa_reconcile_duration_seconds",
                "The duration of reconcile to complete in seconds",
            )
            .buckets(vec![0.01, 0.1, 0.25, 0.5, 1., 5., 15., 60.]),
            &["instance"],
        )
        .expect("valid histogram definition");
        let failures = IntCounterVec::new(
            opts!("rosa_reconciliation_errors_total", "reconciliation errors",),
            &["instance", "error"],
        )
        .expect("valid counter definition");
        let reconciliations =
            IntCounter::new("rosa_reconciliations_total", "reconciliations").expect("valid counter definition");
        let upgrade_decisions = IntCounterVec::new(
            opts!("rosa_upgrade_decisions_total", "upgrade decisions by outcome"),
            &["decision"],
        )
        .expect("valid counter definition");
        Metrics {
            reconciliations,
            failures,
            reconcile_duration,
            upgrade_decisions,
        }
    }
}

impl Metrics {
    /// Register API metrics to start tracking them.
    pub fn register(self, registry: &Registry) -> Result<Self, prometheus::Error> {
        registry.register(Box::new(self.reconcile_duration.clone()))?;
        registry.register(Box::new(self.failures.clone()))?;
        registry.register(Box::new(self.reconciliations.clone()))?;
        registry.register(Box::new(self.upgrade_decisions.clone()))?;
        Ok(self)
    }

    pub fn reconcile_failure(&self, cluster: &RosaCluster, e: &Error) {
        debug!(cluster = %cluster.name_any(), error = %e.metric_label(), "counting reconcile failure");
        self.failures
            .with_label_values(&[cluster.name_any().as_ref(), e.metric_label().as_ref()])
            .inc()
    }

    pub fn upgrade_decision(&self, decision: UpgradeDecision) {
        self.upgrade_decisions.with_label_values(&[decision.as_str()]).inc()
    }

    pub fn count_and_measure(&self, controller: &str) -> ReconcileMeasurer {
        self.reconciliations.inc();
        ReconcileMeasurer {
            start: Instant::now(),
            metric: self.reconcile_duration.clone(),
            instance: controller.to_string(),
        }
    }
}

/// Smart function duration measurer
///
/// Relies on Drop to calculate duration and register the observation in the histogram
pub struct ReconcileMeasurer {
    start: Instant,
    metric: HistogramVec,
    instance: String,
}

impl Drop for ReconcileMeasurer {
    fn drop(&mut self) {
        #[allow(clippy::cast_precision_loss)]
        let duration = self.start.elapsed().as_millis() as f64 / 1000.0;
        self.metric
            .with_label_values(&[self.instance.as_str()])
            .observe(duration);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registers_and_counts_decisions() {
        let registry = Registry::new();
        let metrics = Metrics::default().register(&registry).unwrap();
        metrics.upgrade_decision(UpgradeDecision::ScheduleNew);
        metrics.upgrade_decision(UpgradeDecision::ScheduleNew);
        metrics.upgrade_decision(UpgradeDecision::NoOp);

        assert_eq!(
            metrics
                .upgrade_decisions
                .with_label_values(&["schedule_new"])
                .get(),
            2
        );
        let names: Vec<String> = registry.gather().iter().map(|f| f.get_name().to_string()).collect();
        assert!(names.contains(&"rosa_upgrade_decisions_total".to_string()));
    }
}
