//! Minimal STEP (ISO 10303-21) writer for analytic bodies.
//!
//! Emits a faceted shape representation: each body is triangulated and the
//! triangles written as poly-loop faces. Enough for downstream tools that
//! accept faceted AP203 data; a full B-Rep writer is a kernel-binding
//! concern, not ours.

use std::fmt::Write;

use crate::analytic::SolidBody;
use crate::tessellate;

struct StepBuilder {
    entities: Vec<String>,
    next_id: usize,
}

impl StepBuilder {
    fn new() -> Self {
        Self {
            entities: Vec::new(),
            next_id: 1,
        }
    }

    fn add(&mut self, entity: String) -> usize {
        let id = self.next_id;
        self.next_id += 1;
        self.entities.push(format!("#{id} = {entity};"));
        id
    }
}

/// Serialize a body as a faceted STEP document.
pub(crate) fn export_body(body: &SolidBody, name: &str) -> String {
    let mesh = tessellate::tessellate_body(body);
    let mut b = StepBuilder::new();

    let mut point_ids = Vec::with_capacity(mesh.positions.len() / 3);
    for chunk in mesh.positions.chunks_exact(3) {
        let id = b.add(format!(
            "CARTESIAN_POINT('',({:.6},{:.6},{:.6}))",
            chunk[0], chunk[1], chunk[2]
        ));
        point_ids.push(id);
    }

    let mut face_ids = Vec::with_capacity(mesh.triangle_count());
    for tri in mesh.indices.chunks_exact(3) {
        let loop_id = b.add(format!(
            "POLY_LOOP('',(#{},#{},#{}))",
            point_ids[tri[0] as usize], point_ids[tri[1] as usize], point_ids[tri[2] as usize]
        ));
        let bound_id = b.add(format!("FACE_OUTER_BOUND('',#{loop_id},.T.)"));
        let face_id = b.add(format!("FACE_SURFACE('',(#{bound_id}),$,.T.)"));
        face_ids.push(face_id);
    }

    let face_list = face_ids
        .iter()
        .map(|id| format!("#{id}"))
        .collect::<Vec<_>>()
        .join(",");
    let shell_id = b.add(format!("CLOSED_SHELL('',({face_list}))"));
    let brep_id = b.add(format!("FACETED_BREP('{name}',#{shell_id})"));
    b.add(format!(
        "ADVANCED_BREP_SHAPE_REPRESENTATION('{name}',(#{brep_id}),$)"
    ));

    let mut out = String::new();
    let _ = writeln!(out, "ISO-10303-21;");
    let _ = writeln!(out, "HEADER;");
    let _ = writeln!(
        out,
        "FILE_DESCRIPTION(('faceted export'),'2;1');"
    );
    let _ = writeln!(
        out,
        "FILE_NAME('{name}','',(''),(''),'camber','camber','');"
    );
    let _ = writeln!(
        out,
        "FILE_SCHEMA(('CONFIG_CONTROL_DESIGN'));"
    );
    let _ = writeln!(out, "ENDSEC;");
    let _ = writeln!(out, "DATA;");
    for entity in &b.entities {
        let _ = writeln!(out, "{entity}");
    }
    let _ = writeln!(out, "ENDSEC;");
    let _ = writeln!(out, "END-ISO-10303-21;");
    out
}
