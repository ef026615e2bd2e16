use beacon_otlp::{build_channel, Error, OtlpConfig, OtlpMetricExporter, OtlpSpanExporter};
use beacon_sdk::metrics::data::ResourceMetrics;
use beacon_sdk::metrics::PushMetricExporter;
use beacon_sdk::trace::{SpanExporter, SpanKind};
use beacon_sdk::{Context, KeyValue, Resource, SdkError};
use opentelemetry_proto::tonic::collector::metrics::v1::{
    metrics_service_server::{MetricsService, MetricsServiceServer},
    ExportMetricsServiceRequest, ExportMetricsServiceResponse,
};
use opentelemetry_proto::tonic::collector::trace::v1::{
    trace_service_server::{TraceService, TraceServiceServer},
    ExportTraceServiceRequest, ExportTraceServiceResponse,
};
use opentelemetry_proto::tonic::common::v1::{any_value, KeyValue as TonicKeyValue};
use opentelemetry_proto::tonic::metrics::v1::{metric, number_data_point};
use std::net::SocketAddr;
use std::sync::Mutex;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_stream::wrappers::TcpListenerStream;

struct MockTraceService {
    tx: Mutex<mpsc::Sender<ExportTraceServiceRequest>>,
}

#[tonic::async_trait]
impl TraceService for MockTraceService {
    async fn export(
        &self,
        request: tonic::Request<ExportTraceServiceRequest>,
    ) -> Result<tonic::Response<ExportTraceServiceResponse>, tonic::Status> {
        self.tx
            .lock()
            .unwrap()
            .try_send(request.into_inner())
            .expect("Channel full");
        Ok(tonic::Response::new(ExportTraceServiceResponse {
            partial_success: None,
        }))
    }
}

struct MockMetricsService {
    tx: Mutex<mpsc::Sender<ExportMetricsServiceRequest>>,
}

#[tonic::async_trait]
impl MetricsService for MockMetricsService {
    async fn export(
        &self,
        request: tonic::Request<ExportMetricsServiceRequest>,
    ) -> Result<tonic::Response<ExportMetricsServiceResponse>, tonic::Status> {
        self.tx
            .lock()
            .unwrap()
            .try_send(request.into_inner())
            .expect("Channel full");
        Ok(tonic::Response::new(ExportMetricsServiceResponse {
            partial_success: None,
        }))
    }
}

struct MockCollector {
    addr: SocketAddr,
    traces: mpsc::Receiver<ExportTraceServiceRequest>,
    metrics: mpsc::Receiver<ExportMetricsServiceRequest>,
}

async fn start_collector() -> MockCollector {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("failed to bind");
    let addr = listener.local_addr().unwrap();
    let stream = TcpListenerStream::new(listener);

    let (trace_tx, traces) = mpsc::channel(10);
    let (metric_tx, metrics) = mpsc::channel(10);
    tokio::task::spawn(async move {
        tonic::transport::Server::builder()
            .add_service(TraceServiceServer::new(MockTraceService {
                tx: Mutex::new(trace_tx),
            }))
            .add_service(MetricsServiceServer::new(MockMetricsService {
                tx: Mutex::new(metric_tx),
            }))
            .serve_with_incoming(stream)
            .await
            .expect("Server failed")
    });
    MockCollector {
        addr,
        traces,
        metrics,
    }
}

async fn recv<T>(rx: &mut mpsc::Receiver<T>) -> T {
    tokio::time::timeout(Duration::from_secs(10), rx.recv())
        .await
        .expect("timed out waiting for an export")
        .expect("missing export request")
}

fn string_attribute<'a>(attributes: &'a [TonicKeyValue], key: &str) -> Option<&'a str> {
    attributes
        .iter()
        .find(|kv| kv.key == key)
        .and_then(|kv| kv.value.as_ref())
        .and_then(|value| match &value.value {
            Some(any_value::Value::StringValue(s)) => Some(s.as_str()),
            _ => None,
        })
}

fn test_resource() -> Resource {
    Resource::builder_empty()
        .with_service_name("collector-test")
        .with_attribute(KeyValue::new("library.language", "rust"))
        .build()
        .unwrap()
}

#[tokio::test(flavor = "multi_thread")]
async fn installed_pipelines_reach_the_collector() {
    let mut collector = start_collector().await;

    let telemetry = beacon_otlp::install(
        OtlpConfig::default()
            .with_endpoint(format!("http://{}", collector.addr))
            .without_memory_sampler()
            .with_resource(test_resource()),
    )
    .unwrap();

    let tracer = telemetry.tracer_provider().tracer("cart");
    let (_, mut span) = tracer
        .span_builder("cartAddHandler")
        .with_kind(SpanKind::Server)
        .with_attributes(vec![KeyValue::new("cartAddHandler.cartCount", 1_i64)])
        .start(&Context::new());
    span.end();

    let counter = telemetry
        .meter_provider()
        .meter("cart")
        .i64_counter("api.request.error_counter")
        .with_unit("{call}")
        .build()
        .unwrap();
    counter.add(3, &[KeyValue::new("route", "/")]).unwrap();

    tokio::task::spawn_blocking(move || telemetry.shutdown(Duration::from_secs(5)))
        .await
        .unwrap()
        .unwrap();

    let request = recv(&mut collector.traces).await;
    let resource_spans = &request.resource_spans[0];
    let resource = resource_spans.resource.as_ref().unwrap();
    assert_eq!(
        string_attribute(&resource.attributes, "service.name"),
        Some("collector-test")
    );
    let scope_spans = &resource_spans.scope_spans[0];
    assert_eq!(scope_spans.scope.as_ref().unwrap().name, "cart");
    let span = &scope_spans.spans[0];
    assert_eq!(span.name, "cartAddHandler");
    assert_eq!(span.trace_id.len(), 16);
    assert!(span.parent_span_id.is_empty());
    assert_eq!(span.attributes[0].key, "cartAddHandler.cartCount");
    assert_eq!(
        span.attributes[0].value.as_ref().unwrap().value,
        Some(any_value::Value::IntValue(1))
    );

    let request = recv(&mut collector.metrics).await;
    let resource_metrics = &request.resource_metrics[0];
    assert_eq!(
        string_attribute(
            &resource_metrics.resource.as_ref().unwrap().attributes,
            "library.language"
        ),
        Some("rust")
    );
    let scope_metrics = &resource_metrics.scope_metrics[0];
    assert_eq!(scope_metrics.scope.as_ref().unwrap().name, "cart");
    let metric = &scope_metrics.metrics[0];
    assert_eq!(metric.name, "api.request.error_counter");
    assert_eq!(metric.unit, "{call}");
    let Some(metric::Data::Sum(sum)) = &metric.data else {
        panic!("expected a sum, got {:?}", metric.data);
    };
    assert!(sum.is_monotonic);
    assert_eq!(
        sum.data_points[0].value,
        Some(number_data_point::Value::AsInt(3))
    );
    assert_eq!(string_attribute(&sum.data_points[0].attributes, "route"), Some("/"));
}

#[tokio::test(flavor = "multi_thread")]
async fn exporters_fail_after_shutdown() {
    let config = OtlpConfig::default().with_endpoint("http://127.0.0.1:4317");

    let mut span_exporter = OtlpSpanExporter::from_config(&config).unwrap();
    span_exporter.shutdown().unwrap();
    assert_eq!(span_exporter.export(&[]).await, Err(SdkError::AlreadyShutdown));
    assert_eq!(span_exporter.shutdown(), Err(SdkError::AlreadyShutdown));

    let metric_exporter = OtlpMetricExporter::from_config(&config).unwrap();
    metric_exporter.shutdown().unwrap();
    assert_eq!(
        metric_exporter.export(&ResourceMetrics::default()).await,
        Err(SdkError::AlreadyShutdown)
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn unreachable_collector_is_an_export_failure() {
    // bind then release a port so nothing listens on it
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let exporter = OtlpMetricExporter::from_config(
        &OtlpConfig::default()
            .with_endpoint(format!("http://{addr}"))
            .with_timeout(Duration::from_secs(2)),
    )
    .unwrap();
    let result = exporter.export(&ResourceMetrics::default()).await;
    assert!(
        matches!(result, Err(SdkError::ExportFailure(_))),
        "unexpected result {result:?}"
    );
}

#[test]
fn channel_needs_a_runtime() {
    let result = build_channel(&OtlpConfig::default());
    assert!(matches!(result, Err(Error::NoRuntime(_))));

    let result = beacon_otlp::install(OtlpConfig::default().without_memory_sampler());
    assert!(matches!(result, Err(SdkError::Configuration(_))));
}

#[tokio::test]
async fn invalid_endpoint_is_rejected() {
    let result = build_channel(&OtlpConfig::default().with_endpoint("http://bad host:4317"));
    assert!(matches!(result, Err(Error::InvalidUri(..))));
}

#[cfg(not(feature = "tls"))]
#[tokio::test]
async fn tls_requires_the_feature() {
    let result = build_channel(
        &OtlpConfig::default().with_security(beacon_otlp::TransportSecurity::Tls),
    );
    assert!(matches!(result, Err(Error::FeatureRequired("tls", _))));
}
