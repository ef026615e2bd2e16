//! gRPC clients for the collector trace and metrics services.
use crate::config::{OtlpConfig, TransportSecurity};
use crate::Error;
use beacon_sdk::beacon_debug;
use tokio::runtime::Handle;
#[cfg(feature = "tls")]
use tonic::transport::ClientTlsConfig;
use tonic::transport::Channel;

pub(crate) mod metrics;
pub(crate) mod trace;

/// Builds a lazily connected channel to the collector configured in `config`.
///
/// Must be called from within a tokio runtime. The runtime is captured and
/// every export is driven on it, so the exporters can be called from the
/// SDK's background threads.
pub fn build_channel(config: &OtlpConfig) -> Result<(Channel, Handle), Error> {
    let runtime = Handle::try_current().map_err(|err| Error::NoRuntime(err.to_string()))?;

    let endpoint_uri = config.endpoint_uri();
    let endpoint = Channel::from_shared(endpoint_uri.clone()).map_err(Error::from)?;

    let endpoint = match config.security() {
        TransportSecurity::Insecure => endpoint,
        #[cfg(feature = "tls")]
        TransportSecurity::Tls => endpoint.tls_config(ClientTlsConfig::new().with_native_roots())?,
        #[cfg(not(feature = "tls"))]
        TransportSecurity::Tls => {
            return Err(Error::FeatureRequired("tls", "transport security `tls`"))
        }
    };
    let channel = endpoint.timeout(config.timeout()).connect_lazy();

    beacon_debug!(
        name: "TonicChannelBuilt",
        endpoint = endpoint_uri,
        timeout_in_millisecs = config.timeout().as_millis() as u64
    );
    Ok((channel, runtime))
}
