//! Reconstruction oracle contract.
//!
//! The oracle owns every protocol-semantic operation: decoding bytes,
//! appending and removing layers, and re-encoding a packet after field
//! edits (checksums, lengths, type tags included). The core consumes it
//! strictly synchronously; each call is a blocking round trip and at most
//! one call is ever outstanding.

pub mod client;
pub mod error;
pub mod request;

pub use client::RemoteOracle;
pub use error::OracleError;
pub use request::{EditRequest, LayerEditBatch};

use crate::packet::DecodedPacket;

/// Stateless request/response contract with the external oracle.
///
/// Implementations may keep transport state (sockets, buffers), but each
/// method is a pure function of its arguments as far as the document is
/// concerned: the same packet and request yield the same reply.
pub trait Oracle {
    /// Decode raw bytes into a layered packet.
    fn decode(&mut self, bytes: &[u8]) -> Result<DecodedPacket, OracleError>;

    /// Append a protocol layer on top of the packet's current stack.
    fn append_layer(
        &mut self,
        packet: &DecodedPacket,
        protocol_id: &str,
    ) -> Result<DecodedPacket, OracleError>;

    /// Remove the topmost protocol layer.
    fn remove_top_layer(&mut self, packet: &DecodedPacket) -> Result<DecodedPacket, OracleError>;

    /// Apply edit batches in order and re-encode the whole packet.
    /// All-or-nothing: an error means no layer changed.
    fn apply_edits(
        &mut self,
        packet: &DecodedPacket,
        batches: &[LayerEditBatch],
    ) -> Result<DecodedPacket, OracleError>;
}
