use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Field type tag, matching the catalog file's wire names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FieldType {
    Number,
    String,
    Enum,
    Bitmask,
    MacAddress,
    Ipv4Address,
    Raw,
    TcpOptions,
    None,
}

/// A named group of bits inside a BITMASK field: the mask selects the
/// bits, `values` names the settings they can take.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BitFlagDefinition {
    pub name: String,
    pub mask: u64,
    #[serde(default)]
    pub values: BTreeMap<String, u64>,
}

/// Immutable definition of one field within a protocol.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldDefinition {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub kind: FieldType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dictionary: Option<BTreeMap<String, serde_json::Value>>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub bits: Vec<BitFlagDefinition>,
}

/// Immutable definition of one protocol: its fields in declaration order
/// and the protocol ids that may legally follow it as payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProtocolDefinition {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub fields: Vec<FieldDefinition>,
    #[serde(default)]
    pub payload: Vec<String>,
}

impl ProtocolDefinition {
    /// Field definition lookup by id.
    pub fn field(&self, field_id: &str) -> Option<&FieldDefinition> {
        self.fields.iter().find(|field| field.id == field_id)
    }
}
