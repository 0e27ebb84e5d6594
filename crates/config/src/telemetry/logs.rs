use serde::Deserialize;

use super::exporters::ExportersConfig;

/// Log-specific telemetry configuration.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default, deny_unknown_fields)]
pub struct LogsConfig {
    /// Exporters to use for logs. Falls back to the global exporters when unset.
    exporters: Option<ExportersConfig>,
}

impl LogsConfig {
    /// Exporters explicitly configured for logs, if any.
    pub fn exporters(&self) -> Option<&ExportersConfig> {
        self.exporters.as_ref()
    }
}
