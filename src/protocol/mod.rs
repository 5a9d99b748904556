//! Protocol module - Defines the wire format for opwire traffic
//!
//! Each UDP datagram carries zero or more back-to-back records, in both
//! directions, with no framing beyond the records themselves:
//! - 4 bytes operation/status type tag (big-endian)
//! - Variable length payload, owned by the translator/generator for that tag
//!
//! Multi-byte integers are big-endian; float payloads are raw IEEE-754
//! binary32 bit patterns. There is no magic, version, or length field.

mod codec;
mod message;

pub use codec::*;
pub use message::*;

/// Default port for opwire traffic
pub const DEFAULT_PORT: u16 = 10086;

/// Default maximum datagram size in bytes, shared by the receive buffer and
/// every peer's send buffer
pub const DEFAULT_DATAGRAM_SIZE: usize = 1024;
