//! Packetforge core library: an incrementally editable packet document.
//!
//! This crate implements the stateful document model behind the
//! `packetforge` tool: an ordered protocol-layer stack, a field-edit
//! protocol, two-stack undo/redo with a reentrancy guard, and the
//! synchronous contract with an external reconstruction oracle. The
//! oracle owns every protocol semantic (decoding, checksums, lengths,
//! type tags); the document owns state, history, and consistency.
//!
//! Invariants:
//! - Layer order always equals decode order; the topmost layer is the
//!   innermost protocol.
//! - Views are rebuilt wholesale on every successful edit and never
//!   patched in place; edits are addressed by `(layer protocol id,
//!   field id)` because field ids are only unique within a layer.
//! - Document replacement is atomic: on any failure the prior packet,
//!   views, and history stacks are untouched.
//! - At most one history operation (recording or replaying) and one
//!   oracle call are active at a time.
//!
//! # Examples
//! ```no_run
//! use std::path::Path;
//! use std::sync::Arc;
//!
//! use packetforge_core::{EditIntent, PacketDocument, ProtocolCatalog, RemoteOracle};
//!
//! let catalog = Arc::new(ProtocolCatalog::load(Path::new("catalog.json"))?);
//! let oracle = RemoteOracle::connect("127.0.0.1:29941")?;
//! let mut document = PacketDocument::new(oracle, catalog);
//!
//! document.append_protocol("Ether")?;
//! document.edit_field("Ether", "src", EditIntent::Literal("de:ad:be:ef:00:01".into()))?;
//! document.undo();
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod catalog;
pub mod document;
pub mod oracle;
pub mod packet;

pub use catalog::{
    BitFlagDefinition, CatalogError, FieldDefinition, FieldType, ProtocolCatalog,
    ProtocolDefinition,
};
pub use document::{
    ByteDisplay, ChangeNotifier, DocumentError, EditIntent, FieldView, NullByteDisplay,
    NullNotifier, PacketDocument, ProtocolLayer, ViewError,
};
pub use oracle::{EditRequest, LayerEditBatch, Oracle, OracleError, RemoteOracle};
pub use packet::{DecodedField, DecodedLayer, DecodedPacket, PacketBytes};
