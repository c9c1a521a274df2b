//! Solve orchestration: bind a sketch record, run the kernel solver, diff the
//! coordinates, and write movements back to the document store.

use camber_doc::{mutate, DocError, DocStore};
use camber_kernel::{DofReport, GeometryKernel, PlaneFrame, SketchSession, SolveStatus};
use camber_types::SketchData;
use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

use crate::serialize::{populate_session, BindError, SketchBinding};

/// Minimum coordinate movement that counts as a change, and therefore as
/// something worth writing back to the document.
pub const MOVEMENT_EPS: f64 = 1e-9;

/// The downstream-facing result of solving one sketch.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SketchSolveResult {
    pub sketch_id: Uuid,
    pub status: SolveStatus,
    /// Points that moved more than [`MOVEMENT_EPS`], with their new
    /// coordinates.
    pub changed_points: Vec<(Uuid, f64, f64)>,
    /// The world frame the sketch was solved on.
    pub plane_transform: PlaneFrame,
    pub dof: DofReport,
    pub iterations: usize,
    pub max_residual: f64,
}

/// A solved sketch: the public result plus the live session and binding the
/// rebuild engine uses for profile extraction.
pub struct SolvedSketch {
    pub result: SketchSolveResult,
    pub session: SketchSession,
    pub binding: SketchBinding,
}

/// Bind, solve, and diff one sketch against its pre-solve record.
pub fn solve_sketch(
    kernel: &dyn GeometryKernel,
    plane: PlaneFrame,
    sketch_id: Uuid,
    data: &SketchData,
) -> Result<SolvedSketch, BindError> {
    let mut session = kernel.create_sketch(plane);
    let binding = populate_session(&mut session, data)?;

    let outcome = session.solve();
    let dof = session.analyze_dof();

    let mut changed_points = Vec::new();
    for (doc_id, handle) in &binding.points {
        let (x, y) = session.get_point(*handle);
        let before = &data.points_by_id[doc_id];
        if (x - before.x).abs() > MOVEMENT_EPS || (y - before.y).abs() > MOVEMENT_EPS {
            changed_points.push((*doc_id, x, y));
        }
    }

    debug!(
        sketch = %sketch_id,
        status = ?outcome.status,
        changed = changed_points.len(),
        "sketch solved"
    );

    Ok(SolvedSketch {
        result: SketchSolveResult {
            sketch_id,
            status: outcome.status,
            changed_points,
            plane_transform: plane,
            dof,
            iterations: outcome.iterations,
            max_residual: outcome.max_residual,
        },
        session,
        binding,
    })
}

/// Write solved movements back to the document store in one batch under the
/// `solver-writeback` origin. A result with no movements writes nothing.
pub fn write_back(store: &mut DocStore, result: &SketchSolveResult) -> Result<(), DocError> {
    if result.changed_points.is_empty() {
        return Ok(());
    }
    mutate::write_solved_points(store, result.sketch_id, result.changed_points.clone())
}

#[cfg(test)]
mod tests {
    use super::*;
    use camber_doc::Origin;
    use camber_kernel::AnalyticKernel;
    use camber_types::{
        new_id, Feature, FeatureKind, SketchConstraint, SketchFeature, SketchPlaneRef, SketchPoint,
    };

    fn store_with_sketch() -> (DocStore, Uuid, Vec<Uuid>) {
        let mut store = mutate::new_document("s");
        let plane = store.snapshot().feature_order[1];
        let sketch_id = mutate::add_feature(
            &mut store,
            Feature::new(
                new_id(),
                FeatureKind::Sketch(SketchFeature {
                    plane: SketchPlaneRef::PlaneFeatureId { id: plane },
                    data: Default::default(),
                }),
            ),
        )
        .unwrap();

        let a = new_id();
        let b = new_id();
        mutate::add_sketch_point(&mut store, sketch_id, SketchPoint::new(a, 0.0, 0.0)).unwrap();
        mutate::add_sketch_point(&mut store, sketch_id, SketchPoint::new(b, 4.0, 0.0)).unwrap();
        (store, sketch_id, vec![a, b])
    }

    fn sketch_data(store: &DocStore, sketch_id: Uuid) -> SketchData {
        match &store.snapshot().features_by_id[&sketch_id].kind {
            FeatureKind::Sketch(s) => s.data.clone(),
            _ => unreachable!(),
        }
    }

    #[test]
    fn solve_reports_changed_points_and_writes_back() {
        let (mut store, sketch_id, ids) = store_with_sketch();
        mutate::add_sketch_constraint(
            &mut store,
            sketch_id,
            new_id(),
            SketchConstraint::Distance {
                points: [ids[0], ids[1]],
                value: 10.0,
                offset_x: None,
                offset_y: None,
            },
        )
        .unwrap();

        let kernel = AnalyticKernel::new();
        let data = sketch_data(&store, sketch_id);
        let solved = solve_sketch(&kernel, PlaneFrame::xy(), sketch_id, &data).unwrap();
        assert_eq!(solved.result.status, SolveStatus::Ok);
        assert_eq!(solved.result.changed_points.len(), 2);

        let mut origins: Vec<String> = Vec::new();
        let sink = std::rc::Rc::new(std::cell::RefCell::new(Vec::new()));
        {
            let sink = sink.clone();
            store.subscribe(move |_, _, origin: &Origin| {
                sink.borrow_mut().push(origin.as_str().to_string());
            });
        }
        write_back(&mut store, &solved.result).unwrap();
        origins.extend(sink.borrow().iter().cloned());
        assert_eq!(origins, ["solver-writeback"]);

        // Re-solving the written-back document moves nothing.
        let data = sketch_data(&store, sketch_id);
        let again = solve_sketch(&kernel, PlaneFrame::xy(), sketch_id, &data).unwrap();
        assert!(again.result.changed_points.is_empty());
    }

    #[test]
    fn unmoved_points_are_not_reported() {
        let (store, sketch_id, _) = store_with_sketch();
        let kernel = AnalyticKernel::new();
        let data = sketch_data(&store, sketch_id);
        let solved = solve_sketch(&kernel, PlaneFrame::xy(), sketch_id, &data).unwrap();
        assert!(solved.result.changed_points.is_empty());
        assert_eq!(solved.result.status, SolveStatus::Ok);
    }

    #[test]
    fn solver_output_is_reproducible_across_runs() {
        let (mut store, sketch_id, ids) = store_with_sketch();
        mutate::add_sketch_constraint(
            &mut store,
            sketch_id,
            new_id(),
            SketchConstraint::Distance {
                points: [ids[0], ids[1]],
                value: 7.5,
                offset_x: None,
                offset_y: None,
            },
        )
        .unwrap();
        let data = sketch_data(&store, sketch_id);
        let kernel = AnalyticKernel::new();

        let run = || {
            let solved = solve_sketch(&kernel, PlaneFrame::xy(), sketch_id, &data).unwrap();
            solved.result.changed_points
        };
        assert_eq!(run(), run());
    }

    #[test]
    fn over_constrained_pair_reports_dof() {
        let (mut store, sketch_id, ids) = store_with_sketch();
        mutate::add_sketch_constraint(
            &mut store,
            sketch_id,
            new_id(),
            SketchConstraint::Distance {
                points: [ids[0], ids[1]],
                value: 10.0,
                offset_x: None,
                offset_y: None,
            },
        )
        .unwrap();
        mutate::add_sketch_constraint(
            &mut store,
            sketch_id,
            new_id(),
            SketchConstraint::Coincident {
                points: [ids[0], ids[1]],
            },
        )
        .unwrap();

        let kernel = AnalyticKernel::new();
        let data = sketch_data(&store, sketch_id);
        let solved = solve_sketch(&kernel, PlaneFrame::xy(), sketch_id, &data).unwrap();
        assert!(matches!(
            solved.result.status,
            SolveStatus::Inconsistent | SolveStatus::NoProgress
        ));
        assert!(solved.result.dof.is_over_constrained);
    }
}
