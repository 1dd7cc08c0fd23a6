//! Wire format shared by the relay server and its clients.
//!
//! Every packet is a single tag byte followed by a tag-specific payload. The
//! relay understands a handful of session-control tags and forwards
//! everything else untouched.

pub mod code;
pub mod error;
pub mod packet;
pub mod tag;

pub use code::SessionCode;
pub use error::CodecError;
pub use packet::{ClientPacket, JoinStatus, ServerPacket};
pub use tag::Tag;
