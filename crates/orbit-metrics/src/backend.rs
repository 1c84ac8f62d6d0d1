use prometheus::{
    HistogramOpts, HistogramVec, IntCounterVec, Opts, Registry, proto::MetricFamily,
};

use orbit_model::{PipelineResult, PipelineStatus, RateLimitDecision, TaskOutcome};

/// Prometheus registry plus the collectors the coordination core feeds.
///
/// Cheap to clone; all clones share the same registry.
#[derive(Clone)]
pub struct CoordinationMetrics {
    registry: Registry,
    cycles_total: IntCounterVec,
    stage_duration_seconds: HistogramVec,
    rate_limit_decisions_total: IntCounterVec,
    task_outcomes_total: IntCounterVec,
}

impl CoordinationMetrics {
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let cycles_total = IntCounterVec::new(
            Opts::new("orbit_cycles_total", "Refresh cycles by terminal status"),
            &["status"],
        )?;
        let stage_duration_seconds = HistogramVec::new(
            HistogramOpts::new(
                "orbit_stage_duration_seconds",
                "Wall-clock duration of each pipeline stage",
            ),
            &["stage"],
        )?;
        let rate_limit_decisions_total = IntCounterVec::new(
            Opts::new(
                "orbit_rate_limit_decisions_total",
                "Rate limit checks by outcome",
            ),
            &["outcome"],
        )?;
        let task_outcomes_total = IntCounterVec::new(
            Opts::new("orbit_task_outcomes_total", "Terminal task outcomes"),
            &["outcome"],
        )?;

        registry.register(Box::new(cycles_total.clone()))?;
        registry.register(Box::new(stage_duration_seconds.clone()))?;
        registry.register(Box::new(rate_limit_decisions_total.clone()))?;
        registry.register(Box::new(task_outcomes_total.clone()))?;

        Ok(Self {
            registry,
            cycles_total,
            stage_duration_seconds,
            rate_limit_decisions_total,
            task_outcomes_total,
        })
    }

    /// Record one finished cycle with its per-stage timings.
    pub fn observe_cycle(&self, result: &PipelineResult) {
        self.cycles_total
            .with_label_values(&[status_label(result.status)])
            .inc();

        if let Some(fetch) = &result.fetch {
            self.stage_duration_seconds
                .with_label_values(&["fetch"])
                .observe(fetch.duration_secs);
        }
        if let Some(transform) = &result.transform {
            self.stage_duration_seconds
                .with_label_values(&["transform"])
                .observe(transform.duration_secs);
        }
        if let Some(persist) = &result.persist {
            self.stage_duration_seconds
                .with_label_values(&["persist"])
                .observe(persist.duration_secs);
        }
    }

    /// Record one rate-limit check.
    pub fn observe_rate_limit(&self, decision: &RateLimitDecision) {
        let outcome = if decision.degraded {
            "degraded"
        } else if decision.allowed {
            "allowed"
        } else {
            "denied"
        };
        self.rate_limit_decisions_total
            .with_label_values(&[outcome])
            .inc();
    }

    /// Record one terminal task outcome.
    pub fn observe_task_outcome(&self, outcome: TaskOutcome) {
        self.task_outcomes_total
            .with_label_values(&[outcome.as_str()])
            .inc();
    }

    /// Snapshot all metric families for encoding.
    pub fn gather(&self) -> Vec<MetricFamily> {
        self.registry.gather()
    }
}

fn status_label(status: PipelineStatus) -> &'static str {
    match status {
        PipelineStatus::Success => "success",
        PipelineStatus::Skipped => "skipped",
        PipelineStatus::NoData => "no_data",
        PipelineStatus::ProcessingFailed => "processing_failed",
        PipelineStatus::Failed => "failed",
    }
}
