#![allow(unused_macros)]
//! Diagnostics emitted by the SDK itself.
//!
//! **Note**: These macros (`beacon_info!`, `beacon_warn!`, `beacon_debug!` and
//! `beacon_error!`) are meant for the SDK, its exporters and other plugins. They
//! are not a general purpose application logging facility.
//!
//! Every event carries a stable `name` identifying the operation, and the
//! emitting crate as its target, so subscribers can filter on either.
//!
//! ```rust
//! use beacon_sdk::beacon_info;
//! beacon_info!(name: "SdkStart", version = "1.0.0");
//! ```

/// Log an informational event.
#[macro_export]
macro_rules! beacon_info {
    (name: $name:expr $(,)?) => {
        $crate::_private::info!(name: $name, target: env!("CARGO_PKG_NAME"), name = $name)
    };
    (name: $name:expr, $($key:ident = $value:expr),+ $(,)?) => {
        $crate::_private::info!(name: $name, target: env!("CARGO_PKG_NAME"), name = $name, $($key = $value),+)
    };
}

/// Log a warning event.
///
/// ```rust
/// use beacon_sdk::beacon_warn;
/// beacon_warn!(name: "ExportWarning", error_code = 404);
/// ```
#[macro_export]
macro_rules! beacon_warn {
    (name: $name:expr $(,)?) => {
        $crate::_private::warn!(name: $name, target: env!("CARGO_PKG_NAME"), name = $name)
    };
    (name: $name:expr, $($key:ident = $value:expr),+ $(,)?) => {
        $crate::_private::warn!(name: $name, target: env!("CARGO_PKG_NAME"), name = $name, $($key = $value),+)
    };
}

/// Log a debug event.
#[macro_export]
macro_rules! beacon_debug {
    (name: $name:expr $(,)?) => {
        $crate::_private::debug!(name: $name, target: env!("CARGO_PKG_NAME"), name = $name)
    };
    (name: $name:expr, $($key:ident = $value:expr),+ $(,)?) => {
        $crate::_private::debug!(name: $name, target: env!("CARGO_PKG_NAME"), name = $name, $($key = $value),+)
    };
}

/// Log an error event.
#[macro_export]
macro_rules! beacon_error {
    (name: $name:expr $(,)?) => {
        $crate::_private::error!(name: $name, target: env!("CARGO_PKG_NAME"), name = $name)
    };
    (name: $name:expr, $($key:ident = $value:expr),+ $(,)?) => {
        $crate::_private::error!(name: $name, target: env!("CARGO_PKG_NAME"), name = $name, $($key = $value),+)
    };
}
