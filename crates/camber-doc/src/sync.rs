use camber_types::{DocMeta, Feature};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Replication errors. Decoding is all-or-nothing: a payload that fails here
/// has had no effect on the local document.
#[derive(Debug, Clone, thiserror::Error)]
pub enum SyncError {
    #[error("malformed update payload: {reason}")]
    Malformed { reason: String },
}

/// A last-writer-wins stamp: Lamport clock with the site id as tie-break.
/// Derived `Ord` compares `clock` first, then `site`, which is exactly the
/// total order the merge needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Stamp {
    pub clock: u64,
    pub site: Uuid,
}

/// Which replicated register an op targets. One register per feature id plus
/// singletons for the metadata block, the rebuild gate, and the timeline
/// order.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(tag = "key", content = "keyValue", rename_all = "camelCase")]
pub enum RegKey {
    Meta,
    Gate,
    Order,
    Feature(Uuid),
}

/// New value for a register. A `Feature(None)` is a tombstone.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "value", content = "valueData", rename_all = "camelCase")]
pub enum RegValue {
    Meta(DocMeta),
    Gate(Option<Uuid>),
    Order(Vec<Uuid>),
    Feature(Option<Box<Feature>>),
}

/// A stamped register write.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegisterOp {
    pub key: RegKey,
    pub stamp: Stamp,
    pub value: RegValue,
}

/// One replication payload: the register writes of a committed transaction
/// (or a full-state snapshot for initial sync). Applying the complete set of
/// updates in any order converges every peer to the same snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Update {
    pub ops: Vec<RegisterOp>,
}

impl Update {
    /// Encode to the opaque wire form.
    pub fn encode(&self) -> Vec<u8> {
        serde_json::to_vec(self).expect("update encoding is infallible")
    }

    /// Decode from the opaque wire form.
    pub fn decode(bytes: &[u8]) -> Result<Self, SyncError> {
        serde_json::from_slice(bytes).map_err(|e| SyncError::Malformed {
            reason: e.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stamp_order_is_clock_then_site() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let (lo, hi) = if a < b { (a, b) } else { (b, a) };
        assert!(Stamp { clock: 1, site: hi } < Stamp { clock: 2, site: lo });
        assert!(Stamp { clock: 2, site: lo } < Stamp { clock: 2, site: hi });
    }

    #[test]
    fn update_round_trips_through_bytes() {
        let update = Update {
            ops: vec![RegisterOp {
                key: RegKey::Gate,
                stamp: Stamp {
                    clock: 3,
                    site: Uuid::new_v4(),
                },
                value: RegValue::Gate(None),
            }],
        };
        let bytes = update.encode();
        let back = Update::decode(&bytes).unwrap();
        assert_eq!(update, back);
    }

    #[test]
    fn garbage_bytes_are_rejected() {
        assert!(Update::decode(b"not an update").is_err());
    }
}
