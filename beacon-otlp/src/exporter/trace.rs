use crate::config::OtlpConfig;
use crate::exporter::build_channel;
use crate::transform::trace::group_spans_by_scope;
use crate::Error;
use beacon_sdk::trace::{SpanData, SpanExporter};
use beacon_sdk::{beacon_debug, Resource, SdkError, SdkResult};
use opentelemetry_proto::tonic::collector::trace::v1::trace_service_client::TraceServiceClient;
use std::fmt;
use tokio::runtime::Handle;
use tonic::transport::Channel;
use tonic::Request;

/// Sends span batches to the collector `TraceService`.
pub struct OtlpSpanExporter {
    inner: Option<ClientInner>,
    resource: Resource,
}

struct ClientInner {
    client: TraceServiceClient<Channel>,
    runtime: Handle,
}

impl fmt::Debug for OtlpSpanExporter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("OtlpSpanExporter")
    }
}

impl OtlpSpanExporter {
    /// Creates an exporter on an existing channel. Requests run on `runtime`.
    pub fn new(channel: Channel, runtime: Handle) -> Self {
        beacon_debug!(name: "OtlpSpanExporter.Built");
        OtlpSpanExporter {
            inner: Some(ClientInner {
                client: TraceServiceClient::new(channel),
                runtime,
            }),
            resource: Resource::empty(),
        }
    }

    /// Creates an exporter with its own channel. See [`build_channel`].
    pub fn from_config(config: &OtlpConfig) -> Result<Self, Error> {
        let (channel, runtime) = build_channel(config)?;
        Ok(OtlpSpanExporter::new(channel, runtime))
    }
}

impl SpanExporter for OtlpSpanExporter {
    async fn export(&self, batch: &[SpanData]) -> SdkResult<()> {
        let (mut client, runtime) = match &self.inner {
            Some(inner) => (inner.client.clone(), inner.runtime.clone()),
            None => return Err(SdkError::AlreadyShutdown),
        };
        let request = group_spans_by_scope(&self.resource, batch);

        beacon_debug!(name: "OtlpSpanExporter.ExportStarted", span_count = batch.len());
        let result = runtime
            .spawn(async move { client.export(Request::new(request)).await })
            .await
            .map_err(|err| SdkError::InternalFailure(format!("export task failed: {err}")))?;

        match result {
            Ok(_) => {
                beacon_debug!(name: "OtlpSpanExporter.ExportSucceeded");
                Ok(())
            }
            Err(status) => {
                beacon_debug!(name: "OtlpSpanExporter.ExportFailed", error = format!("{status:?}"));
                Err(SdkError::ExportFailure(status.to_string()))
            }
        }
    }

    fn shutdown(&mut self) -> SdkResult<()> {
        match self.inner.take() {
            Some(_) => Ok(()),
            None => Err(SdkError::AlreadyShutdown),
        }
    }

    fn set_resource(&mut self, resource: &Resource) {
        self.resource = resource.clone();
    }
}
