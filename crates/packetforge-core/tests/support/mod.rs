//! Shared test collaborators: a deterministic mock oracle, a catalog
//! fixture matching its protocol templates, and recording observers.

use std::collections::HashMap;
use std::ops::Range;
use std::sync::{Arc, Mutex};

use packetforge_core::{
    ByteDisplay, ChangeNotifier, DecodedField, DecodedLayer, DecodedPacket, EditRequest,
    LayerEditBatch, Oracle, OracleError, PacketBytes, ProtocolLayer,
};

/// Catalog matching the mock oracle's protocol templates. `IP` declares
/// one payload successor the catalog does not define, to exercise the
/// silent-drop rule.
pub const CATALOG_JSON: &str = r#"{
    "base_protocol": "Ether",
    "protocols": [
        {
            "id": "Ether",
            "name": "Ethernet II",
            "fields": [
                {"id": "dst", "name": "Destination", "type": "MAC_ADDRESS"},
                {"id": "src", "name": "Source", "type": "MAC_ADDRESS"},
                {"id": "type", "name": "Type", "type": "NUMBER"}
            ],
            "payload": ["IP"]
        },
        {
            "id": "IP",
            "name": "IPv4",
            "fields": [
                {"id": "src", "name": "Source", "type": "IPV4_ADDRESS"},
                {"id": "dst", "name": "Destination", "type": "IPV4_ADDRESS"},
                {"id": "id", "name": "Identification", "type": "NUMBER"},
                {"id": "length", "name": "Total Length", "type": "NUMBER"},
                {"id": "checksum", "name": "Header Checksum", "type": "NUMBER"}
            ],
            "payload": ["UDP", "Vxlan"]
        },
        {
            "id": "UDP",
            "name": "UDP",
            "fields": [
                {"id": "sport", "name": "Source Port", "type": "NUMBER"},
                {"id": "dport", "name": "Destination Port", "type": "NUMBER"},
                {"id": "length", "name": "Length", "type": "NUMBER"},
                {"id": "checksum", "name": "Checksum", "type": "NUMBER"}
            ],
            "payload": ["Raw"]
        },
        {
            "id": "Raw",
            "name": "Raw Payload",
            "fields": [
                {"id": "load", "name": "Payload", "type": "RAW"}
            ],
            "payload": []
        }
    ]
}"#;

/// One oracle call, as the document issued it.
#[derive(Debug, Clone, PartialEq)]
pub enum OracleRequest {
    Decode { bytes: Vec<u8> },
    AppendLayer { protocol_id: String },
    RemoveTopLayer,
    ApplyEdits { batches: Vec<LayerEditBatch> },
}

struct FieldTemplate {
    id: &'static str,
    length: usize,
}

/// Deterministic stand-in for the reconstruction oracle.
///
/// Every packet it produces is registered by its bytes, so `decode` can
/// re-derive any state the document has ever seen. Each `apply_edits`
/// stamps a fresh counter byte into the edited fields, so successive
/// edits always change the wire bytes. `fail_next` injects one scripted
/// error ahead of the next call.
pub struct MockOracle {
    templates: HashMap<&'static str, Vec<FieldTemplate>>,
    known: HashMap<Vec<u8>, DecodedPacket>,
    pub requests: Vec<OracleRequest>,
    fail_next: Option<OracleError>,
    counter: u8,
}

impl MockOracle {
    pub fn new() -> Self {
        let mut templates = HashMap::new();
        templates.insert(
            "Ether",
            vec![
                FieldTemplate { id: "dst", length: 6 },
                FieldTemplate { id: "src", length: 6 },
                FieldTemplate { id: "type", length: 2 },
            ],
        );
        templates.insert(
            "IP",
            vec![
                FieldTemplate { id: "src", length: 4 },
                FieldTemplate { id: "dst", length: 4 },
                FieldTemplate { id: "id", length: 2 },
                FieldTemplate { id: "length", length: 2 },
                FieldTemplate { id: "checksum", length: 2 },
            ],
        );
        templates.insert(
            "UDP",
            vec![
                FieldTemplate { id: "sport", length: 2 },
                FieldTemplate { id: "dport", length: 2 },
                FieldTemplate { id: "length", length: 2 },
                FieldTemplate { id: "checksum", length: 2 },
            ],
        );
        templates.insert("Raw", vec![FieldTemplate { id: "load", length: 4 }]);

        let mut known = HashMap::new();
        known.insert(Vec::new(), DecodedPacket::default());

        Self {
            templates,
            known,
            requests: Vec::new(),
            fail_next: None,
            counter: 0,
        }
    }

    pub fn fail_next(&mut self, error: OracleError) {
        self.fail_next = Some(error);
    }

    /// Requests of one kind, for call-count assertions.
    pub fn apply_edits_requests(&self) -> Vec<&Vec<LayerEditBatch>> {
        self.requests
            .iter()
            .filter_map(|request| match request {
                OracleRequest::ApplyEdits { batches } => Some(batches),
                _ => None,
            })
            .collect()
    }

    fn take_injected_failure(&mut self) -> Result<(), OracleError> {
        match self.fail_next.take() {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }

    fn register(&mut self, packet: DecodedPacket) -> DecodedPacket {
        self.known
            .insert(packet.bytes.as_slice().to_vec(), packet.clone());
        packet
    }
}

impl Default for MockOracle {
    fn default() -> Self {
        Self::new()
    }
}

impl Oracle for MockOracle {
    fn decode(&mut self, bytes: &[u8]) -> Result<DecodedPacket, OracleError> {
        self.requests.push(OracleRequest::Decode {
            bytes: bytes.to_vec(),
        });
        self.take_injected_failure()?;
        self.known
            .get(bytes)
            .cloned()
            .ok_or_else(|| OracleError::DecodeFailed {
                message: "unrecognized bytes".to_string(),
            })
    }

    fn append_layer(
        &mut self,
        packet: &DecodedPacket,
        protocol_id: &str,
    ) -> Result<DecodedPacket, OracleError> {
        self.requests.push(OracleRequest::AppendLayer {
            protocol_id: protocol_id.to_string(),
        });
        self.take_injected_failure()?;

        let template = self
            .templates
            .get(protocol_id)
            .ok_or_else(|| OracleError::UnknownProtocol {
                id: protocol_id.to_string(),
            })?;

        let layer_offset = packet.bytes.len();
        let mut fields = Vec::with_capacity(template.len());
        let mut offset = 0usize;
        for field in template {
            fields.push(DecodedField {
                id: field.id.to_string(),
                offset,
                length: field.length,
                value: serde_json::json!(0),
                hvalue: "0".to_string(),
                value_expr: None,
                ignored: false,
                has_binary_data: false,
                has_value: false,
            });
            offset += field.length;
        }

        let mut bytes = packet.bytes.as_slice().to_vec();
        bytes.extend(std::iter::repeat_n(0u8, offset));

        let mut layers = packet.layers.clone();
        layers.push(DecodedLayer {
            protocol_id: protocol_id.to_string(),
            offset: layer_offset,
            fields,
        });

        Ok(self.register(DecodedPacket {
            bytes: PacketBytes::from(bytes),
            layers,
        }))
    }

    fn remove_top_layer(&mut self, packet: &DecodedPacket) -> Result<DecodedPacket, OracleError> {
        self.requests.push(OracleRequest::RemoveTopLayer);
        self.take_injected_failure()?;

        let mut layers = packet.layers.clone();
        let removed = layers.pop().ok_or(OracleError::EmptyStack)?;
        let bytes = packet.bytes.as_slice()[..removed.offset].to_vec();

        Ok(self.register(DecodedPacket {
            bytes: PacketBytes::from(bytes),
            layers,
        }))
    }

    fn apply_edits(
        &mut self,
        packet: &DecodedPacket,
        batches: &[LayerEditBatch],
    ) -> Result<DecodedPacket, OracleError> {
        self.requests.push(OracleRequest::ApplyEdits {
            batches: batches.to_vec(),
        });
        self.take_injected_failure()?;

        self.counter = self.counter.wrapping_add(1);
        let stamp = self.counter;

        let mut bytes = packet.bytes.as_slice().to_vec();
        let mut layers = packet.layers.clone();

        for batch in batches {
            let layer = layers
                .iter_mut()
                .rev()
                .find(|layer| layer.protocol_id == batch.protocol_id)
                .ok_or_else(|| OracleError::InvalidFieldId {
                    protocol_id: batch.protocol_id.clone(),
                    field_id: String::new(),
                })?;
            let layer_offset = layer.offset;

            for edit in &batch.edits {
                let field_id = edit.field_id().to_string();
                let Some(field) = layer.fields.iter_mut().find(|field| field.id == field_id)
                else {
                    // Reset of an absent auto-field is tolerated; the
                    // document resets length/checksum/type blindly.
                    if matches!(edit, EditRequest::ResetToDefault { .. }) {
                        continue;
                    }
                    return Err(OracleError::InvalidFieldId {
                        protocol_id: batch.protocol_id.clone(),
                        field_id,
                    });
                };
                let start = layer_offset + field.offset;

                match edit {
                    EditRequest::SetHumanValue { value, .. } => {
                        field.hvalue = value.clone();
                        field.value = serde_json::json!(value);
                        field.value_expr = None;
                        field.has_value = true;
                        if field.length > 0 {
                            bytes[start] = stamp;
                        }
                    }
                    EditRequest::SetExpressionValue { expr, .. } => {
                        field.hvalue = expr.clone();
                        field.value = serde_json::json!(expr);
                        field.value_expr = Some(expr.clone());
                        field.has_value = true;
                        if field.length > 0 {
                            bytes[start] = stamp;
                        }
                    }
                    EditRequest::SetRawValue { bytes: raw, .. } => {
                        let copy = raw.len().min(field.length);
                        bytes[start..start + copy].copy_from_slice(&raw[..copy]);
                        field.has_binary_data = true;
                        field.has_value = true;
                        field.hvalue = String::new();
                        field.value_expr = None;
                    }
                    EditRequest::ResetToDefault { .. } => {
                        bytes[start..start + field.length].fill(0);
                        field.hvalue = "0".to_string();
                        field.value = serde_json::json!(0);
                        field.value_expr = None;
                        field.has_value = false;
                    }
                    EditRequest::Randomize { .. } => {
                        bytes[start..start + field.length].fill(0xa5);
                        field.hvalue = "165".to_string();
                        field.value = serde_json::json!(0xa5);
                        field.value_expr = None;
                        field.has_value = true;
                    }
                }
            }
        }

        Ok(self.register(DecodedPacket {
            bytes: PacketBytes::from(bytes),
            layers,
        }))
    }
}

/// Notifier that records the protocol ids of every rebuild it sees.
#[derive(Clone, Default)]
pub struct RecordingNotifier {
    pub events: Arc<Mutex<Vec<Vec<String>>>>,
}

impl RecordingNotifier {
    pub fn count(&self) -> usize {
        self.events.lock().expect("notifier lock").len()
    }

    pub fn last(&self) -> Option<Vec<String>> {
        self.events.lock().expect("notifier lock").last().cloned()
    }
}

impl ChangeNotifier for RecordingNotifier {
    fn notify(&mut self, layers: &[ProtocolLayer]) {
        self.events
            .lock()
            .expect("notifier lock")
            .push(layers.iter().map(|layer| layer.protocol_id.clone()).collect());
    }
}

/// Byte display that records the bytes and selections it was handed.
#[derive(Clone, Default)]
pub struct RecordingDisplay {
    pub bytes: Arc<Mutex<Vec<Vec<u8>>>>,
    pub selections: Arc<Mutex<Vec<Range<usize>>>>,
}

impl ByteDisplay for RecordingDisplay {
    fn set_bytes(&mut self, bytes: &[u8]) {
        self.bytes
            .lock()
            .expect("display lock")
            .push(bytes.to_vec());
    }

    fn set_selected(&mut self, range: Range<usize>) {
        self.selections.lock().expect("display lock").push(range);
    }
}
