use beacon_sdk::propagation::{
    BaggagePropagator, TextMapCompositePropagator, TextMapPropagator, TraceContextPropagator,
};
use beacon_sdk::trace::{
    BatchConfigBuilder, BatchSpanProcessor, InMemorySpanExporter, SpanData, SpanExporter, SpanId,
    SpanKind, TracerProvider,
};
use beacon_sdk::{Baggage, Context, KeyValue, SdkResult};
use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

fn batch_provider() -> (TracerProvider, InMemorySpanExporter) {
    let exporter = InMemorySpanExporter::default();
    let processor = BatchSpanProcessor::builder(exporter.clone())
        .with_batch_config(
            BatchConfigBuilder::default()
                .with_scheduled_delay(Duration::from_secs(3600))
                .build(),
        )
        .build();
    let provider = TracerProvider::builder()
        .with_span_processor(processor)
        .build();
    (provider, exporter)
}

fn finished_spans(provider: &TracerProvider, exporter: &InMemorySpanExporter) -> Vec<SpanData> {
    provider.force_flush().unwrap();
    exporter.get_finished_spans().unwrap()
}

#[test]
fn drained_batch_holds_the_timed_operation() {
    let (provider, exporter) = batch_provider();
    let tracer = provider.tracer("integration");

    let (_, mut span) = tracer.start("op", &Context::new());
    span.set_attribute(KeyValue::new("status", "ok"));
    thread::sleep(Duration::from_millis(10));
    span.end();

    let spans = finished_spans(&provider, &exporter);
    assert_eq!(spans.len(), 1);
    let op = &spans[0];
    assert_eq!(op.name, "op");
    assert_eq!(op.attributes, vec![KeyValue::new("status", "ok")]);

    let duration = op.end_time.duration_since(op.start_time).unwrap();
    assert!(duration >= Duration::from_millis(10), "{duration:?}");
    assert!(duration < Duration::from_secs(1), "{duration:?}");
}

#[test]
fn nested_spans_form_one_tree_per_trace() {
    let (provider, exporter) = batch_provider();
    let tracer = provider.tracer("integration");

    for _ in 0..3 {
        let (root_cx, mut root) = tracer
            .span_builder("router")
            .with_kind(SpanKind::Server)
            .start(&Context::new());
        let (child_cx, mut child) = tracer.start("handler", &root_cx);
        let (_, mut leaf) = tracer.start("cart", &child_cx);
        let (_, mut sibling) = tracer.start("render", &root_cx);
        leaf.end();
        child.end();
        sibling.end();
        root.end();
    }

    let spans = finished_spans(&provider, &exporter);
    assert_eq!(spans.len(), 12);

    let mut by_trace: HashMap<_, Vec<&SpanData>> = HashMap::new();
    for span in &spans {
        assert!(span.end_time >= span.start_time);
        by_trace
            .entry(span.span_context.trace_id())
            .or_default()
            .push(span);
    }
    assert_eq!(by_trace.len(), 3);

    for trace in by_trace.values() {
        let ids: HashSet<SpanId> = trace.iter().map(|s| s.span_context.span_id()).collect();
        let roots: Vec<_> = trace
            .iter()
            .filter(|s| s.parent_span_id == SpanId::INVALID)
            .collect();
        assert_eq!(roots.len(), 1);
        assert_eq!(roots[0].name, "router");
        assert_eq!(roots[0].span_kind, SpanKind::Server);
        for span in trace.iter().filter(|s| s.parent_span_id != SpanId::INVALID) {
            assert!(ids.contains(&span.parent_span_id));
        }
    }
}

#[test]
fn spans_started_on_other_threads_join_the_trace() {
    let (provider, exporter) = batch_provider();
    let tracer = provider.tracer("integration");
    let (root_cx, mut root) = tracer.start("fan-out", &Context::new());

    let handles: Vec<_> = (0..4)
        .map(|i| {
            let tracer = tracer.clone();
            let cx = root_cx.clone();
            thread::spawn(move || {
                let (_, mut span) = tracer.start(format!("worker-{i}"), &cx);
                span.set_attribute(KeyValue::new("worker", i as i64));
                span.end();
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }
    root.end();

    let spans = finished_spans(&provider, &exporter);
    let root_id = root.span_context().span_id();
    let workers: Vec<_> = spans.iter().filter(|s| s.name.starts_with("worker-")).collect();
    assert_eq!(workers.len(), 4);
    for worker in workers {
        assert_eq!(worker.parent_span_id, root_id);
        assert_eq!(
            worker.span_context.trace_id(),
            root.span_context().trace_id()
        );
    }
}

#[test]
fn remote_parent_continues_the_caller_trace() {
    let propagator = TextMapCompositePropagator::new(vec![
        Box::new(TraceContextPropagator::new()),
        Box::new(BaggagePropagator::new()),
    ]);

    let (client_provider, _) = batch_provider();
    let (client_cx, _client_span) = client_provider
        .tracer("client")
        .span_builder("GET /cart/add")
        .with_kind(SpanKind::Client)
        .start(&Context::new());
    let client_cx = client_cx.with_baggage(Baggage::from_iter([("user.tier", "gold")]));
    let mut headers = HashMap::new();
    propagator.inject_context(&client_cx, &mut headers);

    let (server_provider, exporter) = batch_provider();
    let parent_cx = propagator.extract(&headers);
    assert_eq!(parent_cx.baggage().get("user.tier"), Some("gold"));
    let (_, mut server_span) = server_provider
        .tracer("server")
        .span_builder("router")
        .with_kind(SpanKind::Server)
        .start(&parent_cx);
    server_span.end();

    let spans = finished_spans(&server_provider, &exporter);
    let client_context = client_cx.span_context().unwrap();
    assert_eq!(spans[0].span_context.trace_id(), client_context.trace_id());
    assert_eq!(spans[0].parent_span_id, client_context.span_id());
    assert!(spans[0].parent_span_is_remote);
}

#[derive(Debug, Default, Clone)]
struct CountingExporter {
    exports: Arc<AtomicUsize>,
    spans: Arc<AtomicUsize>,
}

impl SpanExporter for CountingExporter {
    fn export(&self, batch: &[SpanData]) -> impl Future<Output = SdkResult<()>> + Send {
        self.exports.fetch_add(1, Ordering::SeqCst);
        self.spans.fetch_add(batch.len(), Ordering::SeqCst);
        std::future::ready(Ok(()))
    }
}

#[test]
fn shutdown_drains_pending_spans_once() {
    let exporter = CountingExporter::default();
    let processor = BatchSpanProcessor::builder(exporter.clone())
        .with_batch_config(
            BatchConfigBuilder::default()
                .with_scheduled_delay(Duration::from_secs(3600))
                .build(),
        )
        .build();
    let provider = TracerProvider::builder()
        .with_span_processor(processor)
        .build();

    let tracer = provider.tracer("integration");
    for _ in 0..10 {
        tracer.start("pending", &Context::new()).1.end();
    }
    assert_eq!(exporter.spans.load(Ordering::SeqCst), 0);

    assert!(provider.shutdown().is_ok());
    assert_eq!(exporter.spans.load(Ordering::SeqCst), 10);
    let exports = exporter.exports.load(Ordering::SeqCst);

    assert!(provider.shutdown().is_ok());
    assert!(provider.is_shutdown());
    assert_eq!(exporter.exports.load(Ordering::SeqCst), exports);

    let (_, span) = tracer.start("late", &Context::new());
    assert!(!span.is_recording());
}
