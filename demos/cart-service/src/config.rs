use std::env;
use std::net::SocketAddr;
use std::time::Duration;

/// Listen address of the HTTP server.
pub(crate) const CART_SERVICE_ADDR: &str = "CART_SERVICE_ADDR";
const CART_SERVICE_ADDR_DEFAULT: &str = "0.0.0.0:8080";

const OTEL_SERVICE_NAME: &str = "OTEL_SERVICE_NAME";
const SERVICE_NAME_DEFAULT: &str = "cart-service";

const OTEL_METRIC_EXPORT_INTERVAL: &str = "OTEL_METRIC_EXPORT_INTERVAL";
const METRIC_EXPORT_INTERVAL_DEFAULT: Duration = Duration::from_secs(3);

/// Settings of the demo binary. Collector settings are read by
/// [`beacon_otlp::OtlpConfig::from_env`].
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct ServiceConfig {
    pub(crate) addr: SocketAddr,
    pub(crate) service_name: String,
    /// `None` lets the periodic reader read `OTEL_METRIC_EXPORT_INTERVAL`.
    pub(crate) metric_export_interval: Option<Duration>,
}

impl ServiceConfig {
    pub(crate) fn from_env() -> Result<Self, String> {
        let addr = env::var(CART_SERVICE_ADDR).unwrap_or_else(|_| CART_SERVICE_ADDR_DEFAULT.into());
        let addr = addr
            .parse()
            .map_err(|err| format!("invalid {CART_SERVICE_ADDR} {addr:?}: {err}"))?;

        let service_name = env::var(OTEL_SERVICE_NAME)
            .ok()
            .filter(|name| !name.is_empty())
            .unwrap_or_else(|| SERVICE_NAME_DEFAULT.into());

        // the service exports every 3s unless told otherwise
        let metric_export_interval = match env::var(OTEL_METRIC_EXPORT_INTERVAL) {
            Ok(_) => None,
            Err(_) => Some(METRIC_EXPORT_INTERVAL_DEFAULT),
        };

        Ok(ServiceConfig {
            addr,
            service_name,
            metric_export_interval,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        temp_env::with_vars_unset(
            [CART_SERVICE_ADDR, OTEL_SERVICE_NAME, OTEL_METRIC_EXPORT_INTERVAL],
            || {
                let config = ServiceConfig::from_env().unwrap();
                assert_eq!(config.addr, "0.0.0.0:8080".parse().unwrap());
                assert_eq!(config.service_name, "cart-service");
                assert_eq!(config.metric_export_interval, Some(Duration::from_secs(3)));
            },
        );
    }

    #[test]
    fn reads_env() {
        temp_env::with_vars(
            [
                (CART_SERVICE_ADDR, Some("127.0.0.1:9000")),
                (OTEL_SERVICE_NAME, Some("checkout")),
                (OTEL_METRIC_EXPORT_INTERVAL, Some("1000")),
            ],
            || {
                let config = ServiceConfig::from_env().unwrap();
                assert_eq!(config.addr, "127.0.0.1:9000".parse().unwrap());
                assert_eq!(config.service_name, "checkout");
                assert_eq!(config.metric_export_interval, None);
            },
        );
    }

    #[test]
    fn invalid_addr_is_an_error() {
        temp_env::with_var(CART_SERVICE_ADDR, Some("not an address"), || {
            assert!(ServiceConfig::from_env().is_err());
        });
    }
}
