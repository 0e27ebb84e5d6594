use serde::Deserialize;

use super::exporters::ExportersConfig;

/// Trace-specific telemetry configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TracingConfig {
    /// Fraction of requests sampled, between 0.0 and 1.0.
    pub sampling: f64,

    /// Always sample when the incoming request carries a sampled parent span.
    pub parent_based_sampler: bool,

    /// Limits on how much data a single span may accumulate.
    pub collect: CollectConfig,

    /// Which trace context propagation formats to read and write.
    pub propagation: PropagationConfig,

    /// Exporters to use for traces. Falls back to the global exporters when unset.
    exporters: Option<ExportersConfig>,
}

impl Default for TracingConfig {
    fn default() -> Self {
        Self {
            sampling: 0.15,
            parent_based_sampler: false,
            collect: CollectConfig::default(),
            propagation: PropagationConfig::default(),
            exporters: None,
        }
    }
}

impl TracingConfig {
    /// Exporters explicitly configured for traces, if any.
    pub fn exporters(&self) -> Option<&ExportersConfig> {
        self.exporters.as_ref()
    }
}

/// Caps on span data collection, mirroring the OpenTelemetry SDK's own span limits.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CollectConfig {
    /// Maximum events recorded per span.
    pub max_events_per_span: u32,
    /// Maximum attributes recorded per span.
    pub max_attributes_per_span: u32,
    /// Maximum links recorded per span.
    pub max_links_per_span: u32,
    /// Maximum attributes recorded per event.
    pub max_attributes_per_event: u32,
    /// Maximum attributes recorded per link.
    pub max_attributes_per_link: u32,
}

impl Default for CollectConfig {
    fn default() -> Self {
        Self {
            max_events_per_span: 128,
            max_attributes_per_span: 128,
            max_links_per_span: 128,
            max_attributes_per_event: 128,
            max_attributes_per_link: 128,
        }
    }
}

/// Which W3C/vendor trace context propagation formats are active.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default, deny_unknown_fields)]
pub struct PropagationConfig {
    /// W3C `traceparent`/`tracestate` headers.
    pub trace_context: bool,
    /// AWS X-Ray's `X-Amzn-Trace-Id` header.
    pub aws_xray: bool,
}
