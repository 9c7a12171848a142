use serde::{Deserialize, Serialize};

/// One intended field change, tagged by kind.
///
/// The document builds these; only the oracle interprets them. Raw bytes
/// travel base64-encoded like every other binary value on the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum EditRequest {
    SetHumanValue {
        field_id: String,
        value: String,
    },
    SetExpressionValue {
        field_id: String,
        expr: String,
    },
    SetRawValue {
        field_id: String,
        #[serde(with = "crate::packet::raw_bytes")]
        bytes: Vec<u8>,
    },
    ResetToDefault {
        field_id: String,
    },
    Randomize {
        field_id: String,
    },
}

impl EditRequest {
    pub fn field_id(&self) -> &str {
        match self {
            EditRequest::SetHumanValue { field_id, .. }
            | EditRequest::SetExpressionValue { field_id, .. }
            | EditRequest::SetRawValue { field_id, .. }
            | EditRequest::ResetToDefault { field_id }
            | EditRequest::Randomize { field_id } => field_id,
        }
    }
}

/// Ordered edits for one layer, addressed by its protocol id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayerEditBatch {
    pub protocol_id: String,
    pub edits: Vec<EditRequest>,
}

impl LayerEditBatch {
    pub fn single(protocol_id: impl Into<String>, edit: EditRequest) -> Self {
        Self {
            protocol_id: protocol_id.into(),
            edits: vec![edit],
        }
    }
}
