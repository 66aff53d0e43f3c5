//! Logging helpers shared across the workspace.
//!
//! Libraries only ever emit `tracing` events. The binary decides how they look.

/// Target attached to events that report a positive finding (host alive, port open, ...).
pub const SUCCESS_TARGET: &str = "netrecon::success";

/// Target used for raw terminal lines that should be printed without a status symbol.
pub const PRINT_TARGET: &str = "netrecon::print";

/// Emits an `INFO` event on the [`SUCCESS_TARGET`] so the terminal can highlight it.
#[macro_export]
macro_rules! success {
    ($($arg:tt)+) => {
        ::tracing::info!(target: "netrecon::success", $($arg)+)
    };
}
