// Based on:
//
// - Ho, Chien-Chang & Wu, Fu-Che & Chen, Bing-Yu & Chuang, Yung-Yu & Ouhyoung, Ming. (2005).
// Cubical Marching Squares: Adaptive Feature Preserving Surface Extraction from Volume Data.
// Computer Graphics Forum. 24. 537-545. 10.1111/j.1467-8659.2005.00879.x.
//
// - Stocco, Leo & Schrack, Guenther. (1995).
// Integer dilation and contraction for quadtrees and octrees.
// 426 - 428. 10.1109/PACRIM.1995.519560.
//
// Bourke, Paul. (1994).
// Polygonising a scalar field
// http://paulbourke.net/geometry/polygonise/

// Licensed under the MIT License. You may find a copy of this license in the root directory of the
// crate.

//! Cubical Marching Squares implementation for adaptive octrees

#![warn(missing_docs)]

pub mod cms;
pub mod config;
pub mod error;
pub mod field;
pub mod grid;
pub mod mesh;
pub mod octree;
pub mod prelude;
pub mod segment;
mod tables;
mod tessellate;
mod trace;
mod transition;
mod util;

pub use crate::cms::{mesh_from_field, CubicalMarchingSquares, MeshingStats};
pub use crate::config::{CmsConfig, MAX_DEPTH};
pub use crate::error::{CmsError, Result};
pub use crate::field::ScalarField;
pub use crate::mesh::{Mesh, Vertex};
