use std::io;

use netrecon_common::probe::{ErrorKind, PortProbeResult};

pub const REFUSED_DETAIL: &str =
    "No connection could be made because the target machine actively refused it";
pub const RESET_DETAIL: &str = "An existing connection was forcibly closed by the remote host";
pub const TIMEOUT_DETAIL: &str = "A connection attempt failed because the connected party did not properly respond after a period of time, or established connection failed because connected host has failed to respond";

/// Maps a socket error onto the closed result the classifier understands.
pub fn classify_io_error(error: &io::Error) -> PortProbeResult {
    match error.kind() {
        io::ErrorKind::ConnectionRefused => {
            PortProbeResult::closed(ErrorKind::ConnectionRefused, REFUSED_DETAIL)
        }
        io::ErrorKind::ConnectionReset | io::ErrorKind::ConnectionAborted => {
            PortProbeResult::closed(ErrorKind::ConnectionReset, RESET_DETAIL)
        }
        io::ErrorKind::TimedOut => timed_out(),
        _ => PortProbeResult::closed(ErrorKind::Os, error.to_string()),
    }
}

pub fn timed_out() -> PortProbeResult {
    PortProbeResult::closed(ErrorKind::Timeout, TIMEOUT_DETAIL)
}

// ╔════════════════════════════════════════════╗
// ║ ████████╗███████╗███████╗████████╗███████╗ ║
// ║ ╚══██╔══╝██╔════╝██╔════╝╚══██╔══╝██╔════╝ ║
// ║    ██║   █████╗  ███████╗   ██║   ███████╗ ║
// ║    ██║   ██╔══╝  ╚════██║   ██║   ╚════██║ ║
// ║    ██║   ███████╗███████║   ██║   ███████║ ║
// ║    ╚═╝   ╚══════╝╚══════╝   ╚═╝   ╚══════╝ ║
// ╚════════════════════════════════════════════╝
