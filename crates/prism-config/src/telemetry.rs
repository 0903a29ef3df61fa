use serde::Deserialize;

/// Telemetry configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TelemetryConfig {
    /// Log filter directive (e.g. "info", "prism_llm=debug,info")
    #[serde(default = "default_filter")]
    pub log_filter: String,
    /// Emit logs as JSON lines instead of human-readable text
    #[serde(default)]
    pub json: bool,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            log_filter: default_filter(),
            json: false,
        }
    }
}

fn default_filter() -> String {
    "info".to_owned()
}
