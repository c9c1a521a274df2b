use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Errors parsing a shallow topological reference string.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RefParseError {
    #[error("expected prefix {expected:?} in reference {input:?}")]
    WrongPrefix { expected: &'static str, input: String },

    #[error("malformed reference {input:?}: {reason}")]
    Malformed { input: String, reason: String },
}

macro_rules! shallow_ref {
    ($name:ident, $prefix:literal, $index_field:ident, $doc:literal) => {
        #[doc = $doc]
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(into = "String", try_from = "String")]
        pub struct $name {
            pub feature_id: Uuid,
            pub $index_field: u32,
        }

        impl $name {
            pub fn new(feature_id: Uuid, $index_field: u32) -> Self {
                Self {
                    feature_id,
                    $index_field,
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}:{}:{}", $prefix, self.feature_id, self.$index_field)
            }
        }

        impl FromStr for $name {
            type Err = RefParseError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                let mut parts = s.splitn(3, ':');
                let prefix = parts.next().unwrap_or("");
                if prefix != $prefix {
                    return Err(RefParseError::WrongPrefix {
                        expected: $prefix,
                        input: s.to_string(),
                    });
                }
                let id_part = parts.next().ok_or_else(|| RefParseError::Malformed {
                    input: s.to_string(),
                    reason: "missing feature id".to_string(),
                })?;
                let idx_part = parts.next().ok_or_else(|| RefParseError::Malformed {
                    input: s.to_string(),
                    reason: "missing index".to_string(),
                })?;
                let feature_id = Uuid::parse_str(id_part).map_err(|e| RefParseError::Malformed {
                    input: s.to_string(),
                    reason: e.to_string(),
                })?;
                let index = idx_part.parse::<u32>().map_err(|e| RefParseError::Malformed {
                    input: s.to_string(),
                    reason: e.to_string(),
                })?;
                Ok(Self {
                    feature_id,
                    $index_field: index,
                })
            }
        }

        impl From<$name> for String {
            fn from(r: $name) -> String {
                r.to_string()
            }
        }

        impl TryFrom<String> for $name {
            type Error = RefParseError;

            fn try_from(s: String) -> Result<Self, Self::Error> {
                s.parse()
            }
        }
    };
}

shallow_ref!(
    FaceRef,
    "face",
    face_index,
    "Shallow reference to a face of a feature's body: `face:<featureId>:<faceIndex>`."
);

shallow_ref!(
    EdgeRef,
    "edge",
    edge_index,
    "Shallow reference to an edge of a feature's body: `edge:<featureId>:<edgeIndex>`."
);
