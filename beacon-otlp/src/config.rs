//! Exporter configuration read from the `OTEL_EXPORTER_OTLP_*` environment.
//!
//! Values set through the `with_*` methods override the environment.
use beacon_sdk::metrics::process::DEFAULT_SAMPLE_INTERVAL;
use beacon_sdk::{beacon_warn, Resource};
use std::env;
use std::time::Duration;

/// Target to which the exporters send spans and metrics, as `host:port` or a
/// URL. Defaults to `localhost:4317`.
pub const OTEL_EXPORTER_OTLP_ENDPOINT: &str = "OTEL_EXPORTER_OTLP_ENDPOINT";
/// Default collector endpoint.
pub const OTEL_EXPORTER_OTLP_ENDPOINT_DEFAULT: &str = "localhost:4317";
/// `true` to talk plain HTTP/2 to the collector, `false` to use TLS.
pub const OTEL_EXPORTER_OTLP_INSECURE: &str = "OTEL_EXPORTER_OTLP_INSECURE";
/// Max waiting time for the collector to process each batch, in milliseconds.
pub const OTEL_EXPORTER_OTLP_TIMEOUT: &str = "OTEL_EXPORTER_OTLP_TIMEOUT";
/// Default max waiting time for the collector to process each batch.
pub const OTEL_EXPORTER_OTLP_TIMEOUT_DEFAULT: Duration = Duration::from_millis(10_000);

/// How the channel to the collector is secured.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum TransportSecurity {
    /// Plain text HTTP/2.
    #[default]
    Insecure,
    /// TLS with the operating system trust roots. Requires the `tls` feature.
    Tls,
}

impl TransportSecurity {
    fn scheme(self) -> &'static str {
        match self {
            TransportSecurity::Insecure => "http",
            TransportSecurity::Tls => "https",
        }
    }
}

/// Configuration of the OTLP pipelines installed by [`install`].
///
/// ```
/// use beacon_otlp::{OtlpConfig, TransportSecurity};
/// use std::time::Duration;
///
/// let config = OtlpConfig::from_env()
///     .with_endpoint("collector:4317")
///     .with_export_interval(Duration::from_secs(3));
/// assert_eq!(config.endpoint_uri(), "http://collector:4317");
/// assert_eq!(config.security(), TransportSecurity::Insecure);
/// ```
///
/// [`install`]: crate::install
#[derive(Clone, Debug)]
pub struct OtlpConfig {
    endpoint: String,
    security: TransportSecurity,
    timeout: Duration,
    export_interval: Option<Duration>,
    memory_sample_interval: Option<Duration>,
    resource: Option<Resource>,
}

impl Default for OtlpConfig {
    fn default() -> Self {
        OtlpConfig {
            endpoint: OTEL_EXPORTER_OTLP_ENDPOINT_DEFAULT.to_string(),
            security: TransportSecurity::default(),
            timeout: OTEL_EXPORTER_OTLP_TIMEOUT_DEFAULT,
            export_interval: None,
            memory_sample_interval: Some(DEFAULT_SAMPLE_INTERVAL),
            resource: None,
        }
    }
}

impl OtlpConfig {
    /// Reads the configuration from the environment, falling back to the
    /// defaults for unset or unparsable values.
    pub fn from_env() -> Self {
        let mut config = OtlpConfig::default();

        if let Some(endpoint) = env::var(OTEL_EXPORTER_OTLP_ENDPOINT)
            .ok()
            .filter(|endpoint| !endpoint.trim().is_empty())
        {
            config.endpoint = endpoint.trim().to_string();
        }

        if let Ok(insecure) = env::var(OTEL_EXPORTER_OTLP_INSECURE) {
            match insecure.trim().to_ascii_lowercase().as_str() {
                "true" => config.security = TransportSecurity::Insecure,
                "false" => config.security = TransportSecurity::Tls,
                _ => beacon_warn!(
                    name: "OtlpConfig.InvalidInsecureFlag",
                    value = insecure.clone()
                ),
            }
        }

        if let Ok(timeout) = env::var(OTEL_EXPORTER_OTLP_TIMEOUT) {
            match timeout.trim().parse::<u64>() {
                Ok(millis) if millis > 0 => config.timeout = Duration::from_millis(millis),
                _ => beacon_warn!(name: "OtlpConfig.InvalidTimeout", value = timeout.clone()),
            }
        }

        config
    }

    /// Sets the collector endpoint, as `host:port` or a URL.
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    /// Sets the transport security.
    pub fn with_security(mut self, security: TransportSecurity) -> Self {
        self.security = security;
        self
    }

    /// Sets the per-request export timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Sets the metric export interval. When unset the periodic reader reads
    /// `OTEL_METRIC_EXPORT_INTERVAL` or uses its 60 second default.
    pub fn with_export_interval(mut self, interval: Duration) -> Self {
        self.export_interval = Some(interval);
        self
    }

    /// Sets how often the process memory is sampled. Defaults to 5 seconds.
    pub fn with_memory_sample_interval(mut self, interval: Duration) -> Self {
        self.memory_sample_interval = Some(interval);
        self
    }

    /// Disables the process memory gauge.
    pub fn without_memory_sampler(mut self) -> Self {
        self.memory_sample_interval = None;
        self
    }

    /// Sets the resource attached to every span and metric. When unset, the
    /// SDK default resource is built from the environment.
    pub fn with_resource(mut self, resource: Resource) -> Self {
        self.resource = Some(resource);
        self
    }

    /// The endpoint as configured.
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// The endpoint as a URI, with a scheme derived from the transport
    /// security when none was given.
    pub fn endpoint_uri(&self) -> String {
        if self.endpoint.contains("://") {
            self.endpoint.clone()
        } else {
            format!("{}://{}", self.security.scheme(), self.endpoint)
        }
    }

    /// The transport security.
    pub fn security(&self) -> TransportSecurity {
        self.security
    }

    /// The per-request export timeout.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// The metric export interval, if set.
    pub fn export_interval(&self) -> Option<Duration> {
        self.export_interval
    }

    /// The memory sampling interval, `None` when disabled.
    pub fn memory_sample_interval(&self) -> Option<Duration> {
        self.memory_sample_interval
    }

    pub(crate) fn take_resource(&mut self) -> Option<Resource> {
        self.resource.take()
    }
}
