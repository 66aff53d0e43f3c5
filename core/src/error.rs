use netrecon_common::error::ProbeInputError;
use netrecon_common::network::address::Address;
use netrecon_common::probe::Protocol;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum LivenessError {
    #[error("Looks like the network didn't work for getting IPs. Bye Bye!!")]
    NoTargets,
    #[error("Nothing was alive. Pick a subnet that has something alive")]
    NothingAlive,
    #[error("a liveness worker did not finish: {reason}")]
    Worker { reason: String },
}

#[derive(Debug, Error)]
pub enum ScanError {
    #[error(transparent)]
    Input(#[from] ProbeInputError),
    #[error("malformed worker result: {reason}")]
    MalformedWorkerResult { reason: String },
}

#[derive(Debug, Error)]
pub enum ClassifyError {
    #[error(
        "{protocol} classification lost ports: {open} open + {closed} closed != {total} scanned"
    )]
    CountMismatch {
        protocol: Protocol,
        open: usize,
        closed: usize,
        total: usize,
    },
    #[error("{protocol} port {port} was classified both open and closed")]
    Overlap { protocol: Protocol, port: u16 },
}

/// Failures of an SSH session.
///
/// Authentication and timeout failures are expected outcomes and are turned
/// into a `Version Info` payload; the rest propagate.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("AuthenticationException: Authentication failed for device {address}")]
    AuthenticationFailed { address: Address },
    #[error("TimeoutError: Connection timed out for device {address}")]
    Timeout { address: Address },
    #[error("'{command}' failed on {address}: {stderr}")]
    CommandFailed {
        address: Address,
        command: String,
        stderr: String,
    },
    #[error("ssh transport error with {address}: {reason}")]
    Transport { address: Address, reason: String },
}

impl SessionError {
    /// True for the failures the fingerprint step recovers from locally.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            SessionError::AuthenticationFailed { .. } | SessionError::Timeout { .. }
        )
    }
}

#[derive(Debug, Error)]
pub enum RetrievalError {
    #[error("the driver does not implement this getter")]
    NotImplemented,
    #[error("configuration retrieval failed: {0}")]
    Driver(String),
}

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("cannot read template directory {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Debug, Error)]
pub enum GrabError {
    #[error("{driver} is not an approved device driver")]
    UnsupportedDriver { driver: String },
    #[error(transparent)]
    Session(#[from] SessionError),
    #[error(transparent)]
    Retrieval(#[from] RetrievalError),
    #[error(transparent)]
    Catalog(#[from] CatalogError),
}
