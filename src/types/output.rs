use serde::Serialize;

/// One vertex of an atlased mesh.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct OutputVertex {
    /// Index of the input vertex this one was emitted for. Not unique: a vertex
    /// on a chart seam appears once per chart.
    pub original_vertex_index: u32,
    /// Normalized UV on page `page_index`, in [0, 1].
    pub uv: [f32; 2],
    /// Atlas-wide chart index.
    pub chart_index: u32,
    pub page_index: u32,
}

/// Final atlas result for one input mesh.
///
/// Triangle `i` of the output corresponds to triangle `i` of the input.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct OutputMesh {
    pub indices: Vec<u32>,
    pub vertices: Vec<OutputVertex>,
}

impl OutputMesh {
    pub fn index_count(&self) -> usize {
        self.indices.len()
    }

    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }

    pub fn index(&self, i: usize) -> Option<u32> {
        self.indices.get(i).copied()
    }

    pub fn vertex(&self, i: usize) -> Option<&OutputVertex> {
        self.vertices.get(i)
    }
}
