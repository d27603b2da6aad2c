//! Application State
//!
//! Shared state across all handlers.

use std::sync::Arc;

use metrics_exporter_prometheus::PrometheusHandle;

use expense_agent_config::Settings;
use expense_agent_llm::LlmBackend;
use expense_agent_pipeline::ExpensePipeline;

/// Application state
#[derive(Clone)]
pub struct AppState {
    /// Configuration loaded at startup
    pub config: Arc<Settings>,
    /// Pipeline shared by every request
    pub pipeline: Arc<ExpensePipeline>,
    /// Prometheus render handle, absent when metrics are disabled
    pub metrics: Option<PrometheusHandle>,
}

impl AppState {
    /// Build state around an already selected backend
    pub fn new(config: Settings, backend: Arc<dyn LlmBackend>) -> Self {
        let pipeline = ExpensePipeline::new(backend, config.pipeline.clone());
        Self {
            config: Arc::new(config),
            pipeline: Arc::new(pipeline),
            metrics: None,
        }
    }

    pub fn with_metrics(mut self, handle: PrometheusHandle) -> Self {
        self.metrics = Some(handle);
        self
    }

    pub fn get_config(&self) -> &Settings {
        &self.config
    }
}
