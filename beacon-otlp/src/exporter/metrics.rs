use crate::config::OtlpConfig;
use crate::exporter::build_channel;
use crate::transform::metrics::resource_metrics_to_export_request;
use crate::Error;
use beacon_sdk::metrics::data::ResourceMetrics;
use beacon_sdk::metrics::PushMetricExporter;
use beacon_sdk::{beacon_debug, SdkError, SdkResult};
use opentelemetry_proto::tonic::collector::metrics::v1::metrics_service_client::MetricsServiceClient;
use std::fmt;
use std::sync::Mutex;
use std::time::Duration;
use tokio::runtime::Handle;
use tonic::transport::Channel;
use tonic::Request;

/// Sends metric snapshots to the collector `MetricsService`.
pub struct OtlpMetricExporter {
    inner: Mutex<Option<ClientInner>>,
}

struct ClientInner {
    client: MetricsServiceClient<Channel>,
    runtime: Handle,
}

impl fmt::Debug for OtlpMetricExporter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("OtlpMetricExporter")
    }
}

impl OtlpMetricExporter {
    /// Creates an exporter on an existing channel. Requests run on `runtime`.
    pub fn new(channel: Channel, runtime: Handle) -> Self {
        beacon_debug!(name: "OtlpMetricExporter.Built");
        OtlpMetricExporter {
            inner: Mutex::new(Some(ClientInner {
                client: MetricsServiceClient::new(channel),
                runtime,
            })),
        }
    }

    /// Creates an exporter with its own channel. See [`build_channel`].
    pub fn from_config(config: &OtlpConfig) -> Result<Self, Error> {
        let (channel, runtime) = build_channel(config)?;
        Ok(OtlpMetricExporter::new(channel, runtime))
    }
}

impl PushMetricExporter for OtlpMetricExporter {
    async fn export(&self, metrics: &ResourceMetrics) -> SdkResult<()> {
        let (mut client, runtime) = self
            .inner
            .lock()
            .map_err(|e| SdkError::InternalFailure(format!("failed to acquire lock: {e:?}")))
            .and_then(|inner| match &*inner {
                Some(inner) => Ok((inner.client.clone(), inner.runtime.clone())),
                None => Err(SdkError::AlreadyShutdown),
            })?;
        let request = resource_metrics_to_export_request(metrics);

        beacon_debug!(name: "OtlpMetricExporter.ExportStarted");
        let result = runtime
            .spawn(async move { client.export(Request::new(request)).await })
            .await
            .map_err(|err| SdkError::InternalFailure(format!("export task failed: {err}")))?;

        match result {
            Ok(_) => {
                beacon_debug!(name: "OtlpMetricExporter.ExportSucceeded");
                Ok(())
            }
            Err(status) => {
                beacon_debug!(name: "OtlpMetricExporter.ExportFailed", error = format!("{status:?}"));
                Err(SdkError::ExportFailure(status.to_string()))
            }
        }
    }

    fn shutdown_with_timeout(&self, _timeout: Duration) -> SdkResult<()> {
        self.inner
            .lock()
            .map_err(|e| SdkError::InternalFailure(format!("failed to acquire lock: {e}")))?
            .take();
        Ok(())
    }
}
