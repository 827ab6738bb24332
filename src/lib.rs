pub mod atlas;
pub mod charting;
pub mod config;
pub mod error;
pub mod extract;
pub mod ingestion;
pub mod output;
pub mod packing;
pub mod parameterize;
pub mod pipeline;
pub mod progress;
pub mod types;

#[cfg(test)]
mod testing;

pub use atlas::{Atlas, AtlasBuilder, MeshIndex};
pub use config::{ChartConfig, PackConfig, RunConfig};
pub use error::{AtlasError, MeshRejected, RejectReason, Result};
pub use packing::PageInfo;
pub use pipeline::Pipeline;
pub use progress::{Progress, ProgressPhase};
pub use types::{InputMesh, InputVertex, MeshKind, OutputMesh, OutputVertex, VertexLayout};
