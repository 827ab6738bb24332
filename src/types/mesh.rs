use glam::{Vec2, Vec3};

use crate::error::RejectReason;

/// One host vertex: position, normal and (possibly unused) UV.
///
/// `#[repr(C)]` so tightly packed host buffers can be cast directly.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Default, bytemuck::Pod, bytemuck::Zeroable)]
pub struct InputVertex {
    pub position: [f32; 3],
    pub normal: [f32; 3],
    pub uv: [f32; 2],
}

impl InputVertex {
    pub fn new(position: [f32; 3], normal: [f32; 3], uv: [f32; 2]) -> Self {
        Self {
            position,
            normal,
            uv,
        }
    }
}

/// Byte layout of a host vertex buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VertexLayout {
    pub stride: usize,
    pub position_offset: usize,
    pub normal_offset: usize,
    /// `None` when the buffer carries no UVs; they decode as zero.
    pub uv_offset: Option<usize>,
}

impl VertexLayout {
    /// Layout of a `[InputVertex]` buffer.
    pub const PACKED: VertexLayout = VertexLayout {
        stride: std::mem::size_of::<InputVertex>(),
        position_offset: 0,
        normal_offset: 12,
        uv_offset: Some(24),
    };

    fn validate(&self) -> Result<(), RejectReason> {
        let fits = |offset: usize, size: usize| offset + size <= self.stride;
        if self.stride == 0 {
            return Err(RejectReason::Layout("stride is zero".into()));
        }
        if !fits(self.position_offset, 12) || !fits(self.normal_offset, 12) {
            return Err(RejectReason::Layout(format!(
                "position/normal offsets exceed stride {}",
                self.stride
            )));
        }
        match self.uv_offset {
            Some(uv) if !fits(uv, 8) => Err(RejectReason::Layout(format!(
                "uv offset {uv} exceeds stride {}",
                self.stride
            ))),
            _ => Ok(()),
        }
    }
}

/// How the atlas treats a mesh's existing UVs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MeshKind {
    /// Charted and unwrapped by the pipeline.
    #[default]
    Raw,
    /// UVs are final; each UV island is packed as a fixed chart.
    PreUnwrapped,
}

/// A caller-supplied mesh snapshot.
///
/// `M` is an opaque material identity (an id, a name, an address...) with one
/// entry per triangle.
#[derive(Debug, Clone)]
pub struct InputMesh<M> {
    pub vertices: Vec<InputVertex>,
    /// 16-bit triangle list, 3 per triangle.
    pub indices: Vec<u16>,
    pub face_materials: Vec<M>,
    pub kind: MeshKind,
}

impl<M: Clone> InputMesh<M> {
    /// Mesh whose triangles all share `material`.
    pub fn new(vertices: Vec<InputVertex>, indices: Vec<u16>, material: M) -> Self {
        let face_materials = vec![material; indices.len() / 3];
        Self {
            vertices,
            indices,
            face_materials,
            kind: MeshKind::Raw,
        }
    }

    /// Decode a strided host vertex buffer.
    pub fn from_strided(
        data: &[u8],
        layout: VertexLayout,
        indices: Vec<u16>,
        material: M,
    ) -> Result<Self, RejectReason> {
        layout.validate()?;
        if data.len() % layout.stride != 0 {
            return Err(RejectReason::Layout(format!(
                "buffer of {} bytes is not a whole number of {}-byte vertices",
                data.len(),
                layout.stride
            )));
        }

        let vertices = data
            .chunks_exact(layout.stride)
            .map(|v| {
                let read3 = |o: usize| bytemuck::pod_read_unaligned::<[f32; 3]>(&v[o..o + 12]);
                InputVertex {
                    position: read3(layout.position_offset),
                    normal: read3(layout.normal_offset),
                    uv: layout
                        .uv_offset
                        .map(|o| bytemuck::pod_read_unaligned::<[f32; 2]>(&v[o..o + 8]))
                        .unwrap_or_default(),
                }
            })
            .collect();

        Ok(Self::new(vertices, indices, material))
    }
}

impl<M> InputMesh<M> {
    /// Mesh with an explicit material per triangle.
    pub fn with_face_materials(
        vertices: Vec<InputVertex>,
        indices: Vec<u16>,
        face_materials: Vec<M>,
    ) -> Self {
        Self {
            vertices,
            indices,
            face_materials,
            kind: MeshKind::Raw,
        }
    }

    /// Mark the mesh's UVs as final.
    pub fn pre_unwrapped(mut self) -> Self {
        self.kind = MeshKind::PreUnwrapped;
        self
    }

    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }
}

/// The builder's canonical mesh representation.
///
/// Flat attribute arrays, `u32` indices and dense material indices.
#[derive(Debug, Clone, Default)]
pub struct IndexedMesh {
    /// Interleaved positions: [x, y, z, x, y, z, ...]
    pub positions: Vec<f32>,
    /// Interleaved unit normals: [nx, ny, nz, ...]
    pub normals: Vec<f32>,
    /// Interleaved UVs: [u, v, u, v, ...]
    pub uvs: Vec<f32>,
    /// Triangle indices into the vertex arrays
    pub indices: Vec<u32>,
    /// Dense material index per triangle
    pub face_materials: Vec<u32>,
    pub kind: MeshKind,
}

impl IndexedMesh {
    /// Number of vertices (positions / 3).
    pub fn vertex_count(&self) -> usize {
        self.positions.len() / 3
    }

    /// Number of triangles (indices / 3).
    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }

    /// Whether the mesh contains no geometry.
    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    pub fn position(&self, v: usize) -> Vec3 {
        Vec3::from_slice(&self.positions[v * 3..v * 3 + 3])
    }

    pub fn normal(&self, v: usize) -> Vec3 {
        Vec3::from_slice(&self.normals[v * 3..v * 3 + 3])
    }

    pub fn uv(&self, v: usize) -> Vec2 {
        Vec2::from_slice(&self.uvs[v * 2..v * 2 + 2])
    }

    /// Vertex indices of triangle `face`.
    pub fn triangle(&self, face: usize) -> [usize; 3] {
        [
            self.indices[face * 3] as usize,
            self.indices[face * 3 + 1] as usize,
            self.indices[face * 3 + 2] as usize,
        ]
    }

    /// Unnormalized face normal (length = twice the area).
    pub fn face_cross(&self, face: usize) -> Vec3 {
        let [a, b, c] = self.triangle(face);
        let p0 = self.position(a);
        (self.position(b) - p0).cross(self.position(c) - p0)
    }

    pub fn face_area(&self, face: usize) -> f32 {
        self.face_cross(face).length() * 0.5
    }

    /// Total surface area.
    pub fn surface_area(&self) -> f32 {
        (0..self.triangle_count()).map(|f| self.face_area(f)).sum()
    }
}
