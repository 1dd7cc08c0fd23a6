use relay_shared::CodecError;
use thiserror::Error;

/// Failures raised while handling a single client packet.
///
/// None of these are fatal to the process. `VersionMismatch` is fatal to the
/// offending connection; everything else drops the packet and keeps it open.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum RelayError {
    #[error("malformed packet: {0}")]
    Malformed(#[from] CodecError),

    #[error("protocol violation: {0}")]
    ProtocolViolation(&'static str),

    #[error("api version mismatch: expected {expected}, got {got}")]
    VersionMismatch { expected: u8, got: u8 },

    /// No free session code was found within the draw budget.
    #[error("no free session code after {attempts} draws")]
    CodeSpaceExhausted { attempts: usize },
}
