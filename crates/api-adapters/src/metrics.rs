//! Prometheus counters of pipeline outcomes, labelled by entity, action
//! and outcome.

use prometheus_client::encoding::text::encode;
use prometheus_client::encoding::{EncodeLabelSet, EncodeLabelValue};
use prometheus_client::metrics::counter::Counter;
use prometheus_client::metrics::family::Family;
use prometheus_client::registry::Registry;

use domains::AppError;

#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq, EncodeLabelValue)]
pub enum Outcome {
    Success,
    Rejected,
    Failed,
}

impl Outcome {
    /// Client mistakes count as `Rejected`, infrastructure faults as `Failed`.
    pub fn of<T>(result: &Result<T, AppError>) -> Self {
        match result {
            Ok(_) => Outcome::Success,
            Err(AppError::Infrastructure(_)) => Outcome::Failed,
            Err(_) => Outcome::Rejected,
        }
    }
}

#[derive(Debug, Clone, Hash, PartialEq, Eq, EncodeLabelSet)]
struct PipelineLabels {
    entity: String,
    action: String,
    outcome: Outcome,
}

pub struct Metrics {
    registry: Registry,
    pipeline: Family<PipelineLabels, Counter>,
}

impl Metrics {
    pub fn new() -> Self {
        let mut registry = Registry::with_prefix("blog");
        let pipeline = Family::<PipelineLabels, Counter>::default();
        registry.register(
            "pipeline_requests",
            "Pipeline invocations by entity, action and outcome",
            pipeline.clone(),
        );
        Self { registry, pipeline }
    }

    pub fn observe(&self, entity: &str, action: &str, outcome: Outcome) {
        self.pipeline
            .get_or_create(&PipelineLabels {
                entity: entity.to_string(),
                action: action.to_string(),
                outcome,
            })
            .inc();
    }

    /// OpenMetrics text exposition.
    pub fn render(&self) -> Result<String, std::fmt::Error> {
        let mut buffer = String::new();
        encode(&mut buffer, &self.registry)?;
        Ok(buffer)
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}
