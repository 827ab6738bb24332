pub mod material;
pub mod mesh;
pub mod output;

pub use material::MaterialRegistry;
pub use mesh::{IndexedMesh, InputMesh, InputVertex, MeshKind, VertexLayout};
pub use output::{OutputMesh, OutputVertex};
