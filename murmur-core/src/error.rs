use crate::model::EnvelopeKind;

/// Reasons an inbound envelope is rejected. Always logged and discarded by the receiver.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    #[error("malformed envelope: {0}")]
    Json(#[from] serde_json::Error),

    #[error("`{kind}` envelope is missing `{field}`")]
    MissingField {
        kind: EnvelopeKind,
        field: &'static str,
    },
}
