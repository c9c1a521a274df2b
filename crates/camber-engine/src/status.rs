use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Per-feature evaluation state after a rebuild.
///
/// `Gated` is assigned to every feature after the rebuild gate; a feature in
/// `Error` never produces a body.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FeatureStatus {
    Unevaluated,
    Suppressed,
    Gated,
    Computed,
    Error,
}

/// Error taxonomy surfaced to the UI alongside partial results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    /// The sketch lacks a closed loop for extrude/revolve.
    NoClosedProfile,
    /// The profile crosses itself.
    SelfIntersecting,
    /// A feature refers to a non-existent id.
    InvalidReference,
    /// Cache miss when interpreting an extrude/revolve.
    SketchNotFound,
    /// Generic kernel failure; the message carries upstream detail.
    BuildError,
}

/// One collected per-feature failure. Rebuilds continue past these.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildError {
    pub feature_id: Uuid,
    pub code: ErrorCode,
    pub message: String,
}

impl BuildError {
    pub fn new(feature_id: Uuid, code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            feature_id,
            code,
            message: message.into(),
        }
    }
}

impl std::fmt::Display for BuildError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?} on {}: {}", self.code, self.feature_id, self.message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_codes_serialize_screaming() {
        assert_eq!(
            serde_json::to_string(&ErrorCode::NoClosedProfile).unwrap(),
            "\"NO_CLOSED_PROFILE\""
        );
        assert_eq!(
            serde_json::to_string(&ErrorCode::InvalidReference).unwrap(),
            "\"INVALID_REFERENCE\""
        );
    }

    #[test]
    fn statuses_serialize_lowercase() {
        assert_eq!(
            serde_json::to_string(&FeatureStatus::Gated).unwrap(),
            "\"gated\""
        );
    }
}
