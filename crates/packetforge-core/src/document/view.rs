//! Layer/field view mapping.
//!
//! A fresh `DecodedPacket` is mapped wholesale into addressable view
//! objects; nothing is ever patched in place, so views carry addresses
//! rather than borrows and are discarded on every rebuild.

use std::ops::Range;
use std::sync::Arc;

use thiserror::Error;

use crate::catalog::{FieldDefinition, ProtocolCatalog, ProtocolDefinition};
use crate::oracle::Oracle;
use crate::packet::{DecodedField, DecodedPacket};

use super::{DocumentError, EditIntent, PacketDocument};

/// Errors raised while mapping a decoded packet against the catalog.
#[derive(Debug, Error)]
pub enum ViewError {
    #[error("unknown protocol: {id}")]
    UnknownProtocol { id: String },
    #[error("no field definition for {field_id} in protocol {protocol_id}")]
    UnknownField {
        protocol_id: String,
        field_id: String,
    },
    #[error("field {field_id} in {protocol_id} ends at byte {end} but the packet has {len}")]
    RangeOutOfBounds {
        protocol_id: String,
        field_id: String,
        end: usize,
        len: usize,
    },
    #[error("field {field_id} in {protocol_id} overlaps the preceding field")]
    OverlappingRange {
        protocol_id: String,
        field_id: String,
    },
}

/// One decoded field bound to its definition and absolute byte range.
#[derive(Debug, Clone)]
pub struct FieldView {
    pub layer_protocol_id: String,
    pub field: DecodedField,
    pub definition: FieldDefinition,
    pub range: Range<usize>,
}

impl FieldView {
    pub fn display_value(&self) -> String {
        if self.field.hvalue.is_empty() {
            self.field.value.to_string()
        } else {
            self.field.hvalue.clone()
        }
    }

    /// Write hook: routes an edit for exactly this field through the
    /// document. Bound to `(layer_protocol_id, field id)` because the
    /// view itself does not survive the rebuild the edit causes.
    pub fn submit<O: Oracle>(
        &self,
        document: &mut PacketDocument<O>,
        intent: EditIntent,
    ) -> Result<(), DocumentError> {
        document.edit_field(&self.layer_protocol_id, &self.field.id, intent)
    }
}

/// One protocol layer bound to its definition, its fields, and the ids of
/// every layer beneath it (oldest first).
#[derive(Debug, Clone)]
pub struct ProtocolLayer {
    pub protocol_id: String,
    pub offset: usize,
    pub path: Vec<String>,
    pub definition: Arc<ProtocolDefinition>,
    pub fields: Vec<FieldView>,
}

impl ProtocolLayer {
    pub fn name(&self) -> &str {
        &self.definition.name
    }

    pub fn field(&self, field_id: &str) -> Option<&FieldView> {
        self.fields.iter().find(|view| view.field.id == field_id)
    }
}

/// Build the whole view tree for a decoded packet.
///
/// Validates the catalog resolves every layer and field, and that byte
/// ranges within a layer are in order, non-overlapping, and inside the
/// packet bytes.
pub(crate) fn map_layers(
    catalog: &ProtocolCatalog,
    packet: &DecodedPacket,
) -> Result<Vec<ProtocolLayer>, ViewError> {
    let mut layers = Vec::with_capacity(packet.layers.len());
    let mut path: Vec<String> = Vec::new();

    for decoded in &packet.layers {
        let definition =
            catalog
                .resolve_for_decoded_layer(decoded)
                .map_err(|_| ViewError::UnknownProtocol {
                    id: decoded.protocol_id.clone(),
                })?;

        let mut fields = Vec::with_capacity(decoded.fields.len());
        let mut previous_end = 0usize;
        for field in &decoded.fields {
            let field_definition =
                definition
                    .field(&field.id)
                    .cloned()
                    .ok_or_else(|| ViewError::UnknownField {
                        protocol_id: decoded.protocol_id.clone(),
                        field_id: field.id.clone(),
                    })?;

            let start = decoded.offset + field.offset;
            let end = start + field.length;
            if start < previous_end {
                return Err(ViewError::OverlappingRange {
                    protocol_id: decoded.protocol_id.clone(),
                    field_id: field.id.clone(),
                });
            }
            if end > packet.bytes.len() {
                return Err(ViewError::RangeOutOfBounds {
                    protocol_id: decoded.protocol_id.clone(),
                    field_id: field.id.clone(),
                    end,
                    len: packet.bytes.len(),
                });
            }
            previous_end = end;

            fields.push(FieldView {
                layer_protocol_id: decoded.protocol_id.clone(),
                field: field.clone(),
                definition: field_definition,
                range: start..end,
            });
        }

        layers.push(ProtocolLayer {
            protocol_id: decoded.protocol_id.clone(),
            offset: decoded.offset,
            path: path.clone(),
            definition: Arc::clone(definition),
            fields,
        });
        path.push(decoded.protocol_id.clone());
    }

    Ok(layers)
}
