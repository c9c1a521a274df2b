//! Body-map operation policy for additive and subtractive sweeps.

use camber_kernel::{BodyId, GeometryKernel};
use camber_types::{BodyOp, MergeScope};
use tracing::warn;
use uuid::Uuid;

use crate::bodies::LoopContribution;
use crate::rebuild::Ctx;
use crate::status::{BuildError, ErrorCode};

pub(crate) struct BodyStyle {
    pub name: Option<String>,
    pub color: Option<String>,
}

/// Fold a freshly built body into the map according to the feature's
/// operation and merge scope. The fresh body handle is always released or
/// adopted by the map before returning.
pub(crate) fn apply_body_op(
    ctx: &mut Ctx<'_>,
    feature: Uuid,
    op: BodyOp,
    merge_scope: Option<MergeScope>,
    targets: Option<&[Uuid]>,
    style: BodyStyle,
    new_body: BodyId,
    contribution: LoopContribution,
) -> Result<(), BuildError> {
    match op {
        BodyOp::Cut => apply_cut(ctx, feature, new_body, contribution),
        BodyOp::Add => apply_add(ctx, feature, merge_scope, targets, style, new_body, contribution),
    }
}

/// Subtract the tool from every body in the map. A cut against an empty map
/// is a no-op; a cut that fails against every body of a non-empty map
/// escalates the last kernel error.
fn apply_cut(
    ctx: &mut Ctx<'_>,
    feature: Uuid,
    tool: BodyId,
    contribution: LoopContribution,
) -> Result<(), BuildError> {
    if ctx.bodies.is_empty() {
        ctx.kernel.delete_body(tool);
        return Ok(());
    }

    let keys: Vec<Uuid> = ctx.bodies.keys().collect();
    let mut any_success = false;
    let mut last_error: Option<String> = None;

    for key in keys {
        let handle = match ctx.bodies.get(key) {
            Some(entry) => entry.handle,
            None => continue,
        };
        match ctx.kernel.subtract(handle, tool) {
            Ok(result) => {
                ctx.kernel.delete_body(handle);
                ctx.bodies.replace_handle(key, result);
                if let Some(entry) = ctx.bodies.get_mut(key) {
                    entry.contributions.push(contribution.clone());
                }
                any_success = true;
            }
            Err(e) => last_error = Some(e.to_string()),
        }
    }

    ctx.kernel.delete_body(tool);
    if !any_success {
        return Err(BuildError::new(
            feature,
            ErrorCode::BuildError,
            last_error.unwrap_or_else(|| "cut failed against every body".to_string()),
        ));
    }
    Ok(())
}

fn apply_add(
    ctx: &mut Ctx<'_>,
    feature: Uuid,
    merge_scope: Option<MergeScope>,
    targets: Option<&[Uuid]>,
    style: BodyStyle,
    new_body: BodyId,
    contribution: LoopContribution,
) -> Result<(), BuildError> {
    let scope = merge_scope.unwrap_or(MergeScope::Auto);

    if ctx.bodies.is_empty() || scope == MergeScope::New {
        ctx.bodies
            .insert_new(feature, new_body, style.name, style.color, contribution);
        return Ok(());
    }

    let candidates: Vec<Uuid> = match scope {
        MergeScope::Specific => targets
            .map(|t| t.to_vec())
            .unwrap_or_default()
            .into_iter()
            .filter(|key| ctx.bodies.get(*key).is_some())
            .collect(),
        _ => ctx.bodies.keys().collect(),
    };

    // Fold-left: the first successful union's key survives; bodies merged
    // after it fold into the accumulator and their entries disappear.
    let mut acc = new_body;
    let mut surviving: Option<Uuid> = None;
    let mut absorbed: Vec<LoopContribution> = Vec::new();

    for key in candidates {
        let handle = match ctx.bodies.get(key) {
            Some(entry) => entry.handle,
            None => continue,
        };
        match ctx.kernel.union(handle, acc) {
            Ok(result) => {
                ctx.kernel.delete_body(handle);
                ctx.kernel.delete_body(acc);
                acc = result;
                if surviving.is_none() {
                    surviving = Some(key);
                } else if let Some(removed) = ctx.bodies.remove(key) {
                    absorbed.extend(removed.contributions);
                }
            }
            Err(e) => {
                // Under auto merge a failed union just leaves the bodies
                // separate; under specific scope the named target is skipped.
                warn!(feature = %feature, target = %key, error = %e, "union skipped");
            }
        }
    }

    match surviving {
        Some(key) => {
            ctx.bodies.replace_handle(key, acc);
            if let Some(entry) = ctx.bodies.get_mut(key) {
                entry.contributions.extend(absorbed);
                entry.contributions.push(contribution);
            }
        }
        None => {
            ctx.bodies
                .insert_new(feature, acc, style.name, style.color, contribution);
        }
    }
    Ok(())
}
