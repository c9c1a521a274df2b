//! Document file format: JSON snapshots with a schema version gate.

use camber_types::Document;

use crate::validate::{self, DocumentErrors};

/// Errors during document loading. Any of these refuses the document; a
/// partially-valid file never reaches the store.
#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error("failed to parse document: {0}")]
    Parse(String),

    #[error("schema validation failed with {} error(s): {}", .0.schema.len(), summarize(&.0.schema))]
    Schema(DocumentErrors),

    #[error("invariant validation failed with {} error(s): {}", .0.invariants.len(), summarize(&.0.invariants))]
    Invariants(DocumentErrors),
}

fn summarize<E: std::fmt::Display>(errors: &[E]) -> String {
    errors
        .iter()
        .take(3)
        .map(|e| e.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}

/// Parse and fully validate a JSON document snapshot.
pub fn load_document(json: &str) -> Result<Document, LoadError> {
    let raw: serde_json::Value =
        serde_json::from_str(json).map_err(|e| LoadError::Parse(e.to_string()))?;

    validate::validate_document(&raw).map_err(|errors| {
        if errors.schema.is_empty() {
            LoadError::Invariants(errors)
        } else {
            LoadError::Schema(errors)
        }
    })
}

/// Serialize a snapshot to pretty-printed JSON.
pub fn save_document(doc: &Document) -> String {
    serde_json::to_string_pretty(doc).expect("document serialization should never fail")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mutate;

    #[test]
    fn save_then_load_is_identity() {
        let store = mutate::new_document("rt");
        let json = save_document(store.snapshot());
        let back = load_document(&json).unwrap();
        assert_eq!(&back, store.snapshot());
    }

    #[test]
    fn load_rejects_garbage() {
        assert!(matches!(load_document("{"), Err(LoadError::Parse(_))));
    }

    #[test]
    fn load_rejects_broken_invariants() {
        let store = mutate::new_document("broken");
        let mut doc = store.snapshot().clone();
        doc.feature_order.reverse(); // origin no longer first
        let json = save_document(&doc);
        assert!(matches!(
            load_document(&json),
            Err(LoadError::Invariants(_))
        ));
    }
}
