use thiserror::Error;

use crate::Tag;

/// Reasons a buffer cannot be decoded as a packet.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum CodecError {
    #[error("empty packet")]
    Empty,

    /// The tag requires more payload bytes than were received.
    #[error("packet {tag} needs {needed} payload bytes, got {got}")]
    Truncated { tag: Tag, needed: usize, got: usize },

    #[error("unknown join status byte {0}")]
    UnknownStatus(u8),
}
