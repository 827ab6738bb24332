//! Wavefront OBJ output with atlas UVs.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use tracing::info;

use crate::error::Result;
use crate::types::OutputMesh;

/// An atlased object ready to be written.
#[derive(Debug, Clone, Copy)]
pub struct ObjOutput<'a> {
    pub name: &'a str,
    /// Flat xyz of the input vertices.
    pub positions: &'a [f32],
    /// Flat xyz of the input normals, empty when the object had none.
    pub normals: &'a [f32],
    pub mesh: &'a OutputMesh,
}

fn attr3(data: &[f32], v: usize) -> Option<[f32; 3]> {
    data.get(v * 3..v * 3 + 3).map(|s| [s[0], s[1], s[2]])
}

/// Write `objects` as one OBJ document.
///
/// Every output vertex becomes one `v`/`vt` (and `vn`) entry, so chart seams
/// appear as duplicated positions with distinct UVs.
pub fn write_obj<W: Write>(out: &mut W, objects: &[ObjOutput<'_>]) -> Result<()> {
    writeln!(out, "# uv-atlas")?;
    let mut base = 1usize;

    for object in objects {
        writeln!(out, "o {}", object.name)?;
        let mesh = object.mesh;
        let with_normals = mesh
            .vertices
            .iter()
            .all(|v| attr3(object.normals, v.original_vertex_index as usize).is_some());

        for v in &mesh.vertices {
            let [x, y, z] = attr3(object.positions, v.original_vertex_index as usize)
                .unwrap_or_default();
            writeln!(out, "v {x} {y} {z}")?;
        }
        for v in &mesh.vertices {
            writeln!(out, "vt {} {}", v.uv[0], v.uv[1])?;
        }
        if with_normals {
            for v in &mesh.vertices {
                let [x, y, z] = attr3(object.normals, v.original_vertex_index as usize)
                    .unwrap_or_default();
                writeln!(out, "vn {x} {y} {z}")?;
            }
        }

        for tri in mesh.indices.chunks_exact(3) {
            let [a, b, c] = [tri[0], tri[1], tri[2]].map(|i| base + i as usize);
            if with_normals {
                writeln!(out, "f {a}/{a}/{a} {b}/{b}/{b} {c}/{c}/{c}")?;
            } else {
                writeln!(out, "f {a}/{a} {b}/{b} {c}/{c}")?;
            }
        }
        base += mesh.vertices.len();
    }

    Ok(())
}

/// Write `objects` to the OBJ file at `path`.
pub fn write_obj_file(path: &Path, objects: &[ObjOutput<'_>]) -> Result<()> {
    let mut out = BufWriter::new(File::create(path)?);
    write_obj(&mut out, objects)?;
    out.flush()?;
    info!(
        objects = objects.len(),
        path = %path.display(),
        "Wrote atlased OBJ"
    );
    Ok(())
}
