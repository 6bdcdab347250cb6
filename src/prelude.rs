//! Re-exports everything needed to extract a mesh.

pub use crate::cms::{mesh_from_field, CubicalMarchingSquares, MeshingStats};
pub use crate::config::{CmsConfig, MAX_DEPTH};
pub use crate::error::{CmsError, Result};
pub use crate::field::ScalarField;
pub use crate::mesh::{Mesh, Vertex};
pub use crate::octree::{CellId, CellState, FaceState, Octree, Side};
