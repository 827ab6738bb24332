use std::io;

/// Why an input mesh was refused by [`AtlasBuilder::add_mesh`](crate::AtlasBuilder::add_mesh).
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum RejectReason {
    #[error("mesh has no vertices")]
    NoVertices,
    #[error("mesh has no triangles")]
    NoTriangles,
    #[error("index count {0} is not a multiple of 3")]
    IndexCountNotMultipleOfThree(usize),
    #[error("triangle {triangle} references vertex {index} but the mesh has {vertex_count} vertices")]
    IndexOutOfRange {
        triangle: usize,
        index: u32,
        vertex_count: usize,
    },
    #[error("expected {expected} face materials (one per triangle), got {actual}")]
    MaterialCountMismatch { expected: usize, actual: usize },
    #[error("vertex {vertex} has a non-finite attribute")]
    NonFiniteAttribute { vertex: usize },
    #[error("mesh has {0} vertices, more than 16-bit indices can address")]
    TooManyVertices(usize),
    #[error("vertex buffer layout: {0}")]
    Layout(String),
}

/// A malformed mesh, identified by the ordinal of the `add_mesh` call that submitted it.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("mesh {mesh_index} rejected: {reason}")]
pub struct MeshRejected {
    pub mesh_index: usize,
    pub reason: RejectReason,
}

/// All error types for the atlas pipeline.
#[derive(thiserror::Error, Debug)]
pub enum AtlasError {
    #[error(transparent)]
    Rejected(#[from] MeshRejected),
    #[error("Packing infeasible: {reason}")]
    PackingInfeasible { reason: String },
    #[error("Internal error: {0}")]
    Internal(String),
    #[error("Input error: {0}")]
    Input(String),
    #[error("Output error: {0}")]
    Output(String),
    #[error(transparent)]
    Io(#[from] io::Error),
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, AtlasError>;
