//! Decoded packet model shared between the document and the oracle.
//!
//! Everything in this module is produced by the reconstruction oracle and
//! treated as immutable by the rest of the crate: edits never patch these
//! structures in place, they request a whole new packet.

use std::sync::Arc;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Immutable wire form of a packet.
///
/// Snapshots of the document clone this freely; the underlying buffer is
/// shared, never copied. On the oracle wire it travels as a base64 string.
///
/// # Examples
/// ```
/// use packetforge_core::PacketBytes;
///
/// let bytes = PacketBytes::from(vec![0xde, 0xad]);
/// assert_eq!(bytes.len(), 2);
/// assert_eq!(bytes.as_slice(), &[0xde, 0xad]);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PacketBytes(Arc<[u8]>);

impl PacketBytes {
    pub fn as_slice(&self) -> &[u8] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<Vec<u8>> for PacketBytes {
    fn from(value: Vec<u8>) -> Self {
        Self(value.into())
    }
}

impl From<&[u8]> for PacketBytes {
    fn from(value: &[u8]) -> Self {
        Self(value.into())
    }
}

impl Serialize for PacketBytes {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(&self.0))
    }
}

impl<'de> Deserialize<'de> for PacketBytes {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        let decoded = STANDARD
            .decode(encoded.as_bytes())
            .map_err(D::Error::custom)?;
        Ok(Self(decoded.into()))
    }
}

/// Serde adapter for loose byte values (field payloads, raw edits) that
/// share the base64 wire convention of [`PacketBytes`].
pub(crate) mod raw_bytes {
    use base64::Engine;
    use base64::engine::general_purpose::STANDARD;
    use serde::de::Error as _;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        STANDARD
            .decode(encoded.as_bytes())
            .map_err(D::Error::custom)
    }
}

/// One field of a decoded layer, as reported by the oracle.
///
/// `offset` and `length` are relative to the owning layer. `value` is the
/// raw encoded form in whatever shape the oracle chose; `hvalue` is the
/// human-readable rendering. A field that was last set through a free-form
/// expression carries that expression in `value_expr`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecodedField {
    pub id: String,
    pub offset: usize,
    pub length: usize,
    #[serde(default)]
    pub value: serde_json::Value,
    #[serde(default)]
    pub hvalue: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value_expr: Option<String>,
    #[serde(default)]
    pub ignored: bool,
    #[serde(default)]
    pub has_binary_data: bool,
    #[serde(default)]
    pub has_value: bool,
}

/// One decoded protocol layer. `offset` is absolute within the packet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecodedLayer {
    pub protocol_id: String,
    pub offset: usize,
    #[serde(default)]
    pub fields: Vec<DecodedField>,
}

/// A fully decoded packet: the wire bytes plus the layer stack in decode
/// order (index 0 is the base protocol, the last entry is the innermost).
///
/// # Examples
/// ```
/// use packetforge_core::DecodedPacket;
///
/// let packet = DecodedPacket::default();
/// assert!(packet.bytes.is_empty());
/// assert!(packet.layers.is_empty());
/// ```
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct DecodedPacket {
    pub bytes: PacketBytes,
    #[serde(default)]
    pub layers: Vec<DecodedLayer>,
}

impl DecodedPacket {
    /// Layer lookup by protocol id, innermost match first.
    pub fn layer(&self, protocol_id: &str) -> Option<&DecodedLayer> {
        self.layers
            .iter()
            .rev()
            .find(|layer| layer.protocol_id == protocol_id)
    }
}
