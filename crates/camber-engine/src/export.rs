//! Whole-document export through a throwaway rebuild session.

use camber_kernel::{AnalyticKernel, GeometryKernel};
use camber_types::Document;
use uuid::Uuid;

use crate::rebuild::rebuild_with_ctx;
use crate::status::{BuildError, ErrorCode};

/// Rebuild the document on a fresh kernel and export the last surviving body
/// to STEP. Fails when the timeline produces no body.
pub fn export_step(doc: &Document, name: &str) -> Result<String, BuildError> {
    let mut kernel = AnalyticKernel::new();
    let (_, ctx) = rebuild_with_ctx(doc, &mut kernel);

    let last = ctx
        .bodies
        .iter()
        .last()
        .map(|(key, entry)| (key, entry.handle))
        .ok_or_else(|| {
            BuildError::new(
                Uuid::nil(),
                ErrorCode::BuildError,
                "document produces no body to export",
            )
        })?;

    ctx.kernel
        .export_step(last.1, name)
        .map_err(|e| BuildError::new(last.0, ErrorCode::BuildError, e.to_string()))
}
