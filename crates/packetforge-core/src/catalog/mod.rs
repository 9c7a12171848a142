//! Protocol catalog: definitions of protocols and their fields.
//!
//! The catalog is loaded once from a JSON file, lives for the whole
//! process, and is read-only afterwards. It never decodes bytes itself;
//! it only describes what the oracle's decode output means.

pub mod error;
pub mod types;

pub use error::CatalogError;
pub use types::{BitFlagDefinition, FieldDefinition, FieldType, ProtocolDefinition};

use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::sync::Arc;

use serde::Deserialize;

use crate::packet::DecodedLayer;

#[derive(Debug, Deserialize)]
struct CatalogFile {
    base_protocol: String,
    protocols: Vec<ProtocolDefinition>,
}

/// Read-only lookup of protocol definitions by id.
///
/// One protocol is designated as the base of every packet (the only legal
/// first layer). Definitions are handed out as shared handles so view
/// trees can keep them across rebuilds without copying.
#[derive(Debug)]
pub struct ProtocolCatalog {
    base_id: String,
    protocols: Vec<Arc<ProtocolDefinition>>,
    by_id: HashMap<String, usize>,
}

impl ProtocolCatalog {
    pub fn new(
        base_protocol: impl Into<String>,
        protocols: Vec<ProtocolDefinition>,
    ) -> Result<Self, CatalogError> {
        let base_id = base_protocol.into();
        let mut by_id = HashMap::with_capacity(protocols.len());
        for (index, protocol) in protocols.iter().enumerate() {
            if by_id.insert(protocol.id.clone(), index).is_some() {
                return Err(CatalogError::DuplicateProtocol {
                    id: protocol.id.clone(),
                });
            }
        }
        if !by_id.contains_key(&base_id) {
            return Err(CatalogError::UnknownBaseProtocol { id: base_id });
        }
        Ok(Self {
            base_id,
            protocols: protocols.into_iter().map(Arc::new).collect(),
            by_id,
        })
    }

    pub fn from_json(json: &str) -> Result<Self, CatalogError> {
        let file: CatalogFile = serde_json::from_str(json)?;
        Self::new(file.base_protocol, file.protocols)
    }

    pub fn load(path: &Path) -> Result<Self, CatalogError> {
        let json = fs::read_to_string(path)?;
        Self::from_json(&json)
    }

    pub fn lookup_by_id(&self, id: &str) -> Option<&Arc<ProtocolDefinition>> {
        self.by_id.get(id).map(|&index| &self.protocols[index])
    }

    /// All protocol definitions in catalog declaration order.
    pub fn list_all(&self) -> &[Arc<ProtocolDefinition>] {
        &self.protocols
    }

    /// The designated base protocol, the only legal first layer.
    pub fn base_protocol(&self) -> &Arc<ProtocolDefinition> {
        self.lookup_by_id(&self.base_id)
            .expect("base protocol validated at construction")
    }

    /// Resolve the definition for a decoded layer; unlike payload
    /// successor lookups, an unknown id here is an error.
    pub fn resolve_for_decoded_layer(
        &self,
        layer: &DecodedLayer,
    ) -> Result<&Arc<ProtocolDefinition>, CatalogError> {
        self.lookup_by_id(&layer.protocol_id)
            .ok_or_else(|| CatalogError::UnknownProtocol {
                id: layer.protocol_id.clone(),
            })
    }
}
