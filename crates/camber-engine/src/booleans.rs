//! Explicit boolean features over body-map entries.

use camber_kernel::GeometryKernel;
use camber_types::{BooleanFeature, BooleanOp};
use uuid::Uuid;

use crate::rebuild::Ctx;
use crate::status::{BuildError, ErrorCode};

/// Apply a boolean feature: the target entry is replaced by the result, the
/// tool entry disappears, and both source handles are released. On kernel
/// failure both source bodies are left intact and the feature errors.
pub(crate) fn execute(
    ctx: &mut Ctx<'_>,
    feature: Uuid,
    boolean: &BooleanFeature,
) -> Result<(), BuildError> {
    let target_handle = ctx
        .bodies
        .get(boolean.target)
        .map(|e| e.handle)
        .ok_or_else(|| {
            BuildError::new(
                feature,
                ErrorCode::InvalidReference,
                format!("target body {} not in map", boolean.target),
            )
        })?;
    let tool_handle = ctx
        .bodies
        .get(boolean.tool)
        .map(|e| e.handle)
        .ok_or_else(|| {
            BuildError::new(
                feature,
                ErrorCode::InvalidReference,
                format!("tool body {} not in map", boolean.tool),
            )
        })?;

    let result = match boolean.operation {
        BooleanOp::Union => ctx.kernel.union(target_handle, tool_handle),
        BooleanOp::Subtract => ctx.kernel.subtract(target_handle, tool_handle),
        BooleanOp::Intersect => ctx.kernel.intersect(target_handle, tool_handle),
    }
    .map_err(|e| BuildError::new(feature, ErrorCode::BuildError, e.to_string()))?;

    ctx.kernel.delete_body(target_handle);
    ctx.kernel.delete_body(tool_handle);

    let tool_entry = ctx.bodies.remove(boolean.tool);
    ctx.bodies.replace_handle(boolean.target, result);
    if let (Some(entry), Some(tool_entry)) = (ctx.bodies.get_mut(boolean.target), tool_entry) {
        entry.contributions.extend(tool_entry.contributions);
    }
    Ok(())
}
