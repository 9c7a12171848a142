//! The stateful packet document.
//!
//! A `PacketDocument` owns the current decoded packet, the layer/field
//! view tree built from it, and the undo/redo history. Every mutation is
//! a synchronous round trip to the reconstruction oracle followed by an
//! atomic replacement: the new view tree is built first, the old packet
//! is routed into history, the swap happens, and observers are notified
//! exactly once. When anything fails, the prior document stays
//! authoritative and nothing is visible as changed.

pub mod history;
pub mod notify;
pub mod view;

pub use history::{HistoryBusy, ReplayDirection};
pub use notify::{ByteDisplay, ChangeNotifier, NullByteDisplay, NullNotifier};
pub use view::{FieldView, ProtocolLayer, ViewError};

use std::mem;
use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::catalog::{ProtocolCatalog, ProtocolDefinition};
use crate::oracle::{EditRequest, LayerEditBatch, Oracle, OracleError};
use crate::packet::DecodedPacket;

use history::HistoryManager;
use view::map_layers;

/// Errors surfaced by document operations. Benign conditions (empty
/// stack on remove, empty history on undo/redo, replay failures) are
/// logged instead, per the error taxonomy.
#[derive(Debug, Error)]
pub enum DocumentError {
    #[error("oracle error: {0}")]
    Oracle(#[from] OracleError),
    #[error("view mapping error: {0}")]
    View(#[from] ViewError),
    #[error(transparent)]
    History(#[from] HistoryBusy),
    #[error("protocol {id} cannot follow the current layer stack")]
    AppendRejected { id: String },
    #[error("no field {field_id} in layer {protocol_id}")]
    InvalidFieldId {
        protocol_id: String,
        field_id: String,
    },
}

/// What the caller wants done to a field, before edit routing.
///
/// `Literal` text is normally a human value, but a field whose current
/// value came from an expression keeps being edited as an expression;
/// see [`PacketDocument::edit_field`].
#[derive(Debug, Clone, PartialEq)]
pub enum EditIntent {
    Literal(String),
    Expression(String),
    Raw(Vec<u8>),
    Reset,
    Randomize,
}

/// The packet document: layer stack, field views, history, and the
/// contract with the oracle and the observers.
pub struct PacketDocument<O> {
    oracle: O,
    catalog: Arc<ProtocolCatalog>,
    packet: DecodedPacket,
    layers: Vec<ProtocolLayer>,
    history: HistoryManager,
    notifier: Box<dyn ChangeNotifier>,
    display: Box<dyn ByteDisplay>,
}

impl<O: Oracle> PacketDocument<O> {
    /// Create an empty document over the given oracle and catalog.
    ///
    /// No notification fires here; attach observers first, then call
    /// [`Self::new_document`] or [`Self::load_bytes`].
    pub fn new(oracle: O, catalog: Arc<ProtocolCatalog>) -> Self {
        Self {
            oracle,
            catalog,
            packet: DecodedPacket::default(),
            layers: Vec::new(),
            history: HistoryManager::new(),
            notifier: Box::new(NullNotifier),
            display: Box::new(NullByteDisplay),
        }
    }

    pub fn set_notifier(&mut self, notifier: Box<dyn ChangeNotifier>) {
        self.notifier = notifier;
    }

    pub fn set_byte_display(&mut self, display: Box<dyn ByteDisplay>) {
        self.display = display;
    }

    pub fn oracle(&self) -> &O {
        &self.oracle
    }

    pub fn oracle_mut(&mut self) -> &mut O {
        &mut self.oracle
    }

    pub fn catalog(&self) -> &ProtocolCatalog {
        &self.catalog
    }

    pub fn packet(&self) -> &DecodedPacket {
        &self.packet
    }

    pub fn bytes(&self) -> &[u8] {
        self.packet.bytes.as_slice()
    }

    pub fn layers(&self) -> &[ProtocolLayer] {
        &self.layers
    }

    /// Topmost (innermost) layer, if any.
    pub fn current_layer(&self) -> Option<&ProtocolLayer> {
        self.layers.last()
    }

    pub fn undo_depth(&self) -> usize {
        self.history.undo_depth()
    }

    pub fn redo_depth(&self) -> usize {
        self.history.redo_depth()
    }

    /// Field view lookup by `(layer protocol id, field id)`; when the
    /// same protocol appears more than once, the innermost layer wins.
    pub fn field_view(&self, layer_protocol_id: &str, field_id: &str) -> Option<&FieldView> {
        self.layers
            .iter()
            .rev()
            .find(|layer| layer.protocol_id == layer_protocol_id)
            .and_then(|layer| layer.field(field_id))
    }

    /// Reset to the empty packet and drop all history.
    pub fn new_document(&mut self) {
        self.history.clear();
        self.packet = DecodedPacket::default();
        self.layers.clear();
        self.refresh_and_notify();
        info!("document reset");
    }

    /// Replace the document with a decode of the given bytes, dropping
    /// all history. On failure the current document is untouched.
    pub fn load_bytes(&mut self, bytes: &[u8]) -> Result<(), DocumentError> {
        let packet = self.oracle.decode(bytes)?;
        let layers = map_layers(&self.catalog, &packet)?;
        self.history.clear();
        self.packet = packet;
        self.layers = layers;
        self.refresh_and_notify();
        info!(
            bytes = self.packet.bytes.len(),
            layers = self.layers.len(),
            "document loaded"
        );
        Ok(())
    }

    /// Protocols that may legally be appended right now: the catalog's
    /// base protocol on an empty stack, otherwise the top layer's
    /// declared payload successors. Successor ids the catalog does not
    /// know are silently dropped.
    pub fn available_protocols_to_append(&self) -> Vec<Arc<ProtocolDefinition>> {
        match self.layers.last() {
            None => vec![Arc::clone(self.catalog.base_protocol())],
            Some(top) => top
                .definition
                .payload
                .iter()
                .filter_map(|id| self.catalog.lookup_by_id(id))
                .cloned()
                .collect(),
        }
    }

    /// Append a protocol layer on top of the stack.
    pub fn append_protocol(&mut self, protocol_id: &str) -> Result<(), DocumentError> {
        let allowed = self.available_protocols_to_append();
        if !allowed.iter().any(|protocol| protocol.id == protocol_id) {
            return Err(DocumentError::AppendRejected {
                id: protocol_id.to_string(),
            });
        }

        self.history.begin_recording()?;
        let outcome = self.oracle.append_layer(&self.packet, protocol_id);
        self.commit_recorded(outcome)?;
        info!(protocol = protocol_id, "protocol appended");
        Ok(())
    }

    /// Remove the topmost layer. Removing from an empty stack is a
    /// benign no-op: logged, no history entry, no notification.
    pub fn remove_top_protocol(&mut self) -> Result<(), DocumentError> {
        if self.layers.is_empty() {
            debug!("remove requested on an empty layer stack");
            return Ok(());
        }

        self.history.begin_recording()?;
        let outcome = self.oracle.remove_top_layer(&self.packet);
        if let Err(OracleError::EmptyStack) = outcome {
            self.history.finish();
            debug!("oracle reported an empty stack on remove");
            return Ok(());
        }
        self.commit_recorded(outcome)?;
        info!("top protocol removed");
        Ok(())
    }

    /// Edit one field, addressed by `(layer protocol id, field id)`.
    ///
    /// A field whose current value was set through an expression has no
    /// faithful human form, so a `Literal` edit of it is sent as
    /// `SetExpressionValue`, never `SetHumanValue`.
    pub fn edit_field(
        &mut self,
        layer_protocol_id: &str,
        field_id: &str,
        intent: EditIntent,
    ) -> Result<(), DocumentError> {
        let has_expression = self
            .field_view(layer_protocol_id, field_id)
            .ok_or_else(|| DocumentError::InvalidFieldId {
                protocol_id: layer_protocol_id.to_string(),
                field_id: field_id.to_string(),
            })?
            .field
            .value_expr
            .is_some();

        let request = match intent {
            EditIntent::Literal(value) if has_expression => EditRequest::SetExpressionValue {
                field_id: field_id.to_string(),
                expr: value,
            },
            EditIntent::Literal(value) => EditRequest::SetHumanValue {
                field_id: field_id.to_string(),
                value,
            },
            EditIntent::Expression(expr) => EditRequest::SetExpressionValue {
                field_id: field_id.to_string(),
                expr,
            },
            EditIntent::Raw(bytes) => EditRequest::SetRawValue {
                field_id: field_id.to_string(),
                bytes,
            },
            EditIntent::Reset => EditRequest::ResetToDefault {
                field_id: field_id.to_string(),
            },
            EditIntent::Randomize => EditRequest::Randomize {
                field_id: field_id.to_string(),
            },
        };
        let batch = LayerEditBatch::single(layer_protocol_id, request);

        self.history.begin_recording()?;
        let outcome = self.oracle.apply_edits(&self.packet, std::slice::from_ref(&batch));
        self.commit_recorded(outcome)?;
        info!(
            protocol = layer_protocol_id,
            field = field_id,
            "field edited"
        );
        Ok(())
    }

    /// Reset the oracle-computed fields of every layer in one atomic
    /// call: `length` and `checksum` on each layer, `type` only on the
    /// last. Either every layer updates or none does.
    pub fn recalculate_auto_values(&mut self) -> Result<(), DocumentError> {
        if self.packet.layers.is_empty() {
            debug!("recalculate requested on an empty packet");
            return Ok(());
        }

        let last = self.packet.layers.len() - 1;
        let batches: Vec<LayerEditBatch> = self
            .packet
            .layers
            .iter()
            .enumerate()
            .map(|(index, layer)| {
                let mut edits = vec![
                    EditRequest::ResetToDefault {
                        field_id: "length".to_string(),
                    },
                    EditRequest::ResetToDefault {
                        field_id: "checksum".to_string(),
                    },
                ];
                if index == last {
                    edits.push(EditRequest::ResetToDefault {
                        field_id: "type".to_string(),
                    });
                }
                LayerEditBatch {
                    protocol_id: layer.protocol_id.clone(),
                    edits,
                }
            })
            .collect();

        self.history.begin_recording()?;
        let outcome = self.oracle.apply_edits(&self.packet, &batches);
        self.commit_recorded(outcome)?;
        info!(layers = batches.len(), "auto values recalculated");
        Ok(())
    }

    pub fn undo(&mut self) {
        self.replay(ReplayDirection::Undo);
    }

    pub fn redo(&mut self) {
        self.replay(ReplayDirection::Redo);
    }

    /// Select a field: forward its absolute byte range to the byte
    /// display. No document mutation, no notification.
    pub fn set_selected(&mut self, view: &FieldView) {
        self.display.set_selected(view.range.clone());
    }

    fn replay(&mut self, direction: ReplayDirection) {
        let snapshot = match self.history.begin_replay(direction) {
            Ok(Some(snapshot)) => snapshot,
            Ok(None) => {
                debug!(?direction, "nothing to undo or redo");
                return;
            }
            Err(err) => {
                warn!(%err, ?direction, "replay rejected");
                return;
            }
        };

        // The snapshot stays authoritative for structure: a fresh decode
        // cannot reproduce expression state. The oracle still has to
        // accept the snapshot's wire form before it becomes current.
        let restored = self
            .oracle
            .decode(snapshot.bytes.as_slice())
            .map_err(DocumentError::from)
            .and_then(|_| map_layers(&self.catalog, &snapshot).map_err(DocumentError::from));

        match restored {
            Ok(layers) => {
                let old = mem::replace(&mut self.packet, snapshot);
                self.history.before_replace(old);
                self.layers = layers;
                self.refresh_and_notify();
                info!(?direction, "history replayed");
            }
            Err(err) => {
                // Lossy on purpose: the popped snapshot is consumed, not
                // restored to its source stack.
                error!(%err, ?direction, "replay failed, snapshot dropped");
            }
        }
        self.history.finish();
    }

    /// Complete a Recording-phase operation: on success, swap in the new
    /// packet, route the old one into history, rebuild the views, and
    /// notify once. On failure, leave the document untouched.
    fn commit_recorded(
        &mut self,
        outcome: Result<DecodedPacket, OracleError>,
    ) -> Result<(), DocumentError> {
        let mapped = outcome.map_err(DocumentError::from).and_then(|packet| {
            let layers = map_layers(&self.catalog, &packet)?;
            Ok((packet, layers))
        });
        match mapped {
            Ok((packet, layers)) => {
                let old = mem::replace(&mut self.packet, packet);
                self.history.before_replace(old);
                self.history.finish();
                self.layers = layers;
                self.refresh_and_notify();
                Ok(())
            }
            Err(err) => {
                self.history.finish();
                Err(err)
            }
        }
    }

    fn refresh_and_notify(&mut self) {
        self.display.set_bytes(self.packet.bytes.as_slice());
        self.notifier.notify(&self.layers);
    }
}
