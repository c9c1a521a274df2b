//! The worker protocol: messages between the UI thread and the rebuild
//! worker, serialized as tagged JSON. Binary payloads (replication updates,
//! export buffers) ride as base64 strings.

use std::collections::BTreeMap;

use camber_engine::{BuildError, FeatureStatus, ReferenceEntry};
use camber_kernel::{DofReport, Mesh, PlaneFrame, SolveStatus};
use camber_types::{BodyOp, ExtrudeDirection};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use camber_engine::BodySummary;

/// Serde helper: `Vec<u8>` as a base64 string in JSON.
mod b64 {
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        STANDARD.encode(bytes).serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let s = String::deserialize(deserializer)?;
        STANDARD.decode(s).map_err(serde::de::Error::custom)
    }
}

/// Inbound: UI → rebuild worker.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum WorkerRequest {
    /// Open the replication channel; the worker answers with a full-state
    /// sync update.
    InitSync,
    /// Full-state replication payload for a fresh peer.
    SyncInit {
        #[serde(with = "b64")]
        bytes: Vec<u8>,
    },
    /// Incremental replication payload.
    SyncUpdate {
        #[serde(with = "b64")]
        bytes: Vec<u8>,
    },
    PreviewExtrude {
        sketch_id: Uuid,
        distance: f64,
        direction: ExtrudeDirection,
        op: BodyOp,
    },
    PreviewRevolve {
        sketch_id: Uuid,
        axis: Uuid,
        angle: f64,
        op: BodyOp,
    },
    ClearPreview,
    ExportStl {
        #[serde(default)]
        binary: Option<bool>,
        #[serde(default)]
        name: Option<String>,
    },
    ExportStep {
        #[serde(default)]
        name: Option<String>,
    },
    ExportJson,
}

/// Outbound: rebuild worker → UI.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum WorkerResponse {
    Ready,
    RebuildStart,
    RebuildComplete {
        bodies: Vec<BodySummary>,
        feature_status: BTreeMap<Uuid, FeatureStatus>,
        errors: Vec<BuildError>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        reference_index: Option<BTreeMap<Uuid, ReferenceEntry>>,
    },
    Mesh {
        body_id: Uuid,
        mesh: Mesh,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        color: Option<String>,
    },
    SketchSolved {
        sketch_id: Uuid,
        points: Vec<(Uuid, f64, f64)>,
        status: SolveStatus,
        plane_transform: PlaneFrame,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        dof: Option<DofReport>,
    },
    /// Preview geometry from a throwaway session.
    PreviewMesh { mesh: Mesh },
    PreviewError { message: String },
    /// Replication payload emitted by a local mutation.
    SyncUpdate {
        #[serde(with = "b64")]
        bytes: Vec<u8>,
    },
    Error { message: String },
    StlExported {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        buffer: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        content: Option<String>,
    },
    StepExported { buffer: String },
    JsonExported { content: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_tags_are_kebab_case() {
        let req = WorkerRequest::ExportStl {
            binary: Some(true),
            name: None,
        };
        let value = serde_json::to_value(&req).unwrap();
        assert_eq!(value["type"], "export-stl");

        let req = WorkerRequest::SyncUpdate { bytes: vec![1, 2] };
        let value = serde_json::to_value(&req).unwrap();
        assert_eq!(value["type"], "sync-update");
        assert!(value["bytes"].is_string(), "binary payloads ride as base64");
    }

    #[test]
    fn sync_bytes_round_trip_through_base64() {
        let req = WorkerRequest::SyncInit {
            bytes: vec![0, 255, 7, 42],
        };
        let json = serde_json::to_string(&req).unwrap();
        let back: WorkerRequest = serde_json::from_str(&json).unwrap();
        match back {
            WorkerRequest::SyncInit { bytes } => assert_eq!(bytes, vec![0, 255, 7, 42]),
            other => panic!("wrong variant: {other:?}"),
        }
    }

    #[test]
    fn response_tags_match_protocol() {
        let resp = WorkerResponse::RebuildStart;
        assert_eq!(
            serde_json::to_value(&resp).unwrap()["type"],
            "rebuild-start"
        );
        let resp = WorkerResponse::JsonExported {
            content: "{}".to_string(),
        };
        assert_eq!(
            serde_json::to_value(&resp).unwrap()["type"],
            "json-exported"
        );
    }
}
