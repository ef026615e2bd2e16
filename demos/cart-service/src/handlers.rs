//! HTTP routes of the cart service.
//!
//! Every request opens a `router` server span continuing the caller's trace,
//! and each route opens its own child span.
use crate::cart::Cart;
use crate::headers::HeaderExtractor;
use beacon_sdk::metrics::{Counter, Histogram, Meter};
use beacon_sdk::propagation::TextMapPropagator;
use beacon_sdk::trace::{SpanKind, Tracer};
use beacon_sdk::{Context, KeyValue, SdkResult};
use http_body_util::Full;
use hyper::body::Bytes;
use hyper::{Method, Request, Response, StatusCode};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, warn};

/// Everything the handlers need, shared by all connections.
#[derive(Debug)]
pub(crate) struct AppState {
    tracer: Tracer,
    propagator: Arc<dyn TextMapPropagator>,
    error_counter: Counter<i64>,
    latency: Histogram,
    cart: Cart,
    /// Probability of the simulated `GET /` failure.
    failure_rate: f64,
}

impl AppState {
    /// Registers the service instruments on `meter`.
    pub(crate) fn new(
        tracer: Tracer,
        meter: &Meter,
        propagator: Arc<dyn TextMapPropagator>,
    ) -> SdkResult<Self> {
        let error_counter = meter
            .i64_counter("api.request.error_counter")
            .with_unit("{call}")
            .with_description("Number of erroneous API calls.")
            .build()?;
        let latency = meter
            .f64_histogram("api.request.latency_seconds")
            .with_unit("{s}")
            .with_description("Records the latency of requests in seconds")
            .build()?;
        let cart_items = meter
            .i64_gauge("api.cart.items")
            .with_unit("{item}")
            .with_description("Tracks the number of items in a user's cart")
            .build()?;

        Ok(AppState {
            tracer,
            propagator,
            error_counter,
            latency,
            cart: Cart::new(cart_items),
            failure_rate: 0.5,
        })
    }
}

type Body = Full<Bytes>;

fn text(status: StatusCode, body: impl Into<Bytes>) -> Response<Body> {
    let mut response = Response::new(Full::new(body.into()));
    *response.status_mut() = status;
    response
}

/// Dispatches one request.
pub(crate) fn route<B>(state: &AppState, req: &Request<B>) -> Response<Body> {
    let parent_cx = state.propagator.extract(&HeaderExtractor(req.headers()));
    let (cx, mut span) = state
        .tracer
        .span_builder("router")
        .with_kind(SpanKind::Server)
        .start(&parent_cx);
    debug!(
        name: "router",
        method = %req.method(),
        path = req.uri().path(),
        remote_parent = parent_cx.has_remote_parent()
    );

    let response = match (req.method(), req.uri().path()) {
        (&Method::GET, "/") => hello_world(state, &cx),
        (&Method::GET, "/cart/add") => cart_add(state, &cx),
        (&Method::GET, "/cart/remove") => cart_remove(state, &cx),
        _ => text(StatusCode::NOT_FOUND, "Not Found"),
    };
    span.set_attribute(KeyValue::new(
        "http.status",
        i64::from(response.status().as_u16()),
    ));
    span.end();
    response
}

fn hello_world(state: &AppState, cx: &Context) -> Response<Body> {
    let started = Instant::now();
    let (_, mut span) = state.tracer.start("helloWorldHandler", cx);

    let failed = rand::random_bool(state.failure_rate);
    let status = if failed {
        if let Err(err) = state.error_counter.add(1, &[]) {
            warn!(name: "ErrorCounter.AddFailed", error = %err);
        }
        StatusCode::INTERNAL_SERVER_ERROR
    } else {
        StatusCode::OK
    };
    span.set_attributes([
        KeyValue::new("helloWorldHandler.error", failed),
        KeyValue::new("http.status", i64::from(status.as_u16())),
    ]);

    let response = if failed {
        text(status, "Internal Server Error")
    } else {
        text(status, "Hello, World!")
    };
    if let Err(err) = state.latency.record(started.elapsed().as_secs_f64(), &[]) {
        warn!(name: "LatencyHistogram.RecordFailed", error = %err);
    }
    response
}

fn cart_add(state: &AppState, cx: &Context) -> Response<Body> {
    let count = state.cart.add();
    let (_, mut span) = state.tracer.start("cartAddHandler", cx);
    span.set_attribute(KeyValue::new("cartAddHandler.cartCount", count));

    text(
        StatusCode::OK,
        format!("Item added to cart. Number of items in cart: {count}."),
    )
}

fn cart_remove(state: &AppState, cx: &Context) -> Response<Body> {
    let count = state.cart.remove();
    let (_, mut span) = state.tracer.start("cartRemoveHandler", cx);
    span.set_attribute(KeyValue::new("cartRemoveHandler.cartCount", count));

    text(
        StatusCode::OK,
        format!("Item removed from cart. Number of items in cart: {count}."),
    )
}
