//! A small HTTP service instrumented with the beacon SDK.
//!
//! Routes:
//!
//! * `GET /` answers "Hello, World!" and fails half of the time,
//! * `GET /cart/add` and `GET /cart/remove` update a shared cart.
//!
//! Spans and metrics are exported to the OTLP collector configured through the
//! `OTEL_EXPORTER_OTLP_*` variables; `RUST_LOG` filters the service logs.
mod cart;
mod config;
mod handlers;
mod headers;

use beacon_otlp::OtlpConfig;
use beacon_sdk::{KeyValue, Resource};
use config::ServiceConfig;
use handlers::AppState;
use hyper::body::Incoming;
use hyper::service::service_fn;
use hyper::Request;
use hyper_util::rt::{TokioExecutor, TokioIo};
use hyper_util::server::conn::auto::Builder;
use std::convert::Infallible;
use std::error::Error;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tracing::{debug, error, info, warn};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

const TELEMETRY_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error + Send + Sync + 'static>> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = ServiceConfig::from_env()?;
    let resource = Resource::builder()
        .with_service_name(config.service_name.clone())
        .with_attribute(KeyValue::new("library.language", "rust"))
        .build()?;
    let mut otlp = OtlpConfig::from_env().with_resource(resource);
    if let Some(interval) = config.metric_export_interval {
        otlp = otlp.with_export_interval(interval);
    }
    let telemetry = beacon_otlp::install(otlp)?;

    let state = Arc::new(AppState::new(
        telemetry.tracer_provider().tracer(config.service_name.clone()),
        &telemetry.meter_provider().meter(config.service_name.clone()),
        telemetry.propagator(),
    )?);

    let listener = TcpListener::bind(config.addr).await?;
    info!(name: "ServerStarted", addr = %config.addr, service = config.service_name.as_str());

    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);
    loop {
        tokio::select! {
            accepted = listener.accept() => {
                let stream = match accepted {
                    Ok((stream, _)) => stream,
                    Err(err) => {
                        warn!(name: "AcceptFailed", error = %err);
                        continue;
                    }
                };
                let state = state.clone();
                tokio::spawn(async move {
                    let service = service_fn(move |req: Request<Incoming>| {
                        let response = handlers::route(&state, &req);
                        async move { Ok::<_, Infallible>(response) }
                    });
                    if let Err(err) = Builder::new(TokioExecutor::new())
                        .serve_connection(TokioIo::new(stream), service)
                        .await
                    {
                        debug!(name: "ConnectionClosed", error = %err);
                    }
                });
            }
            _ = &mut shutdown => {
                info!(name: "ShutdownSignalReceived", name = "ShutdownSignalReceived");
                break;
            }
        }
    }

    // exporting the last batches blocks, keep it off the runtime workers
    let result =
        tokio::task::spawn_blocking(move || telemetry.shutdown(TELEMETRY_SHUTDOWN_TIMEOUT)).await?;
    match result {
        Ok(()) => info!(name: "TelemetryShutdown", name = "TelemetryShutdown"),
        Err(err) => error!(name: "TelemetryShutdownFailed", error = %err),
    }
    Ok(())
}
