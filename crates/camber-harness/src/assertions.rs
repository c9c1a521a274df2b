//! Assertion helpers with diagnostic output.

use approx::relative_eq;
use camber_engine::{FeatureStatus, RebuildResult};
use camber_kernel::Mesh;
use uuid::Uuid;

/// Unified error type for harness assertions.
#[derive(Debug, thiserror::Error)]
pub enum HarnessError {
    #[error("assertion failed: {detail}")]
    AssertionFailed { detail: String },

    #[error("no mesh for body {key}")]
    NoMesh { key: Uuid },
}

/// Assert the mesh bounding box matches within a tolerance.
pub fn assert_bounding_box(
    mesh: &Mesh,
    expected_min: [f32; 3],
    expected_max: [f32; 3],
    tol: f32,
    ctx: &str,
) -> Result<(), HarnessError> {
    let (min, max) = mesh.bounds().ok_or_else(|| HarnessError::AssertionFailed {
        detail: format!("[{ctx}] mesh is empty"),
    })?;
    for i in 0..3 {
        if !relative_eq!(min[i], expected_min[i], epsilon = tol) {
            return Err(HarnessError::AssertionFailed {
                detail: format!(
                    "[{ctx}] bbox min[{i}]: expected {:.3}, got {:.3}",
                    expected_min[i], min[i]
                ),
            });
        }
        if !relative_eq!(max[i], expected_max[i], epsilon = tol) {
            return Err(HarnessError::AssertionFailed {
                detail: format!(
                    "[{ctx}] bbox max[{i}]: expected {:.3}, got {:.3}",
                    expected_max[i], max[i]
                ),
            });
        }
    }
    Ok(())
}

/// Assert a feature landed in the expected status, with the full status map
/// in the failure message.
pub fn assert_status(
    result: &RebuildResult,
    feature: Uuid,
    expected: FeatureStatus,
    ctx: &str,
) -> Result<(), HarnessError> {
    let actual = result.feature_status.get(&feature).copied();
    if actual == Some(expected) {
        Ok(())
    } else {
        Err(HarnessError::AssertionFailed {
            detail: format!(
                "[{ctx}] feature {feature}: expected {expected:?}, got {actual:?}; all: {:?}; errors: {:?}",
                result.feature_status, result.errors
            ),
        })
    }
}

/// Assert every evaluated feature computed cleanly.
pub fn assert_all_computed(result: &RebuildResult, ctx: &str) -> Result<(), HarnessError> {
    for (id, status) in &result.feature_status {
        if *status != FeatureStatus::Computed {
            return Err(HarnessError::AssertionFailed {
                detail: format!(
                    "[{ctx}] feature {id} is {status:?}; errors: {:?}",
                    result.errors
                ),
            });
        }
    }
    Ok(())
}

/// Mesh of the single expected body.
pub fn single_body_mesh<'r>(result: &'r RebuildResult, ctx: &str) -> Result<&'r Mesh, HarnessError> {
    if result.bodies.len() != 1 {
        return Err(HarnessError::AssertionFailed {
            detail: format!(
                "[{ctx}] expected exactly one body, got {}: {:?}",
                result.bodies.len(),
                result.bodies
            ),
        });
    }
    let key = result.bodies[0].key;
    result.meshes.get(&key).ok_or(HarnessError::NoMesh { key })
}
