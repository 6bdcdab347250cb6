//! The extracted triangle mesh.

use ahash::RandomState;
use cgmath::{Point3, Vector3};
use std::collections::HashMap;

/// A simple mesh type that holds a vector of vertices and another one of indices.
/// This type is meant to be converted to your own mesh type via the [`std::convert::From`] trait.
///
/// Triangles are wound counter-clockwise when seen from outside the surface, that is, from where
/// the field is above the iso-level.
#[derive(Clone, Debug, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Mesh {
    /// The vertices of the mesh.
    pub vertices: Vec<Vertex>,
    /// The vertex indices of the mesh, three per triangle.
    pub indices: Vec<u32>,
}

/// A 3D vertex that holds a position and a normal.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Vertex {
    /// The position of the vertex.
    pub position: Point3<f32>,
    /// The normalized normal of the vertex, pointing out of the surface.
    pub normal: Vector3<f32>,
}

impl Mesh {
    /// Vertex positions as plain arrays, ready for upload.
    pub fn positions(&self) -> Vec<[f32; 3]> {
        self.vertices.iter().map(|v| v.position.into()).collect()
    }

    /// Vertex normals as plain arrays.
    pub fn normals(&self) -> Vec<[f32; 3]> {
        self.vertices.iter().map(|v| v.normal.into()).collect()
    }

    /// Number of triangles.
    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }

    /// Iterates over the vertex indices of each triangle.
    pub fn triangles(&self) -> impl Iterator<Item = [u32; 3]> + '_ {
        self.indices.chunks_exact(3).map(|t| [t[0], t[1], t[2]])
    }

    /// Number of triangles using each undirected edge, keyed by `(low, high)` vertex index.
    pub fn edge_valences(&self) -> HashMap<(u32, u32), usize, RandomState> {
        let mut valences = HashMap::with_capacity_and_hasher(self.indices.len(), RandomState::new());
        for [a, b, c] in self.triangles() {
            for (v0, v1) in [(a, b), (b, c), (c, a)] {
                *valences.entry((v0.min(v1), v0.max(v1))).or_insert(0) += 1;
            }
        }
        valences
    }

    /// Edges used by a single triangle. A closed surface has none.
    pub fn boundary_edges(&self) -> Vec<(u32, u32)> {
        let mut edges: Vec<_> = self
            .edge_valences()
            .into_iter()
            .filter(|&(_, count)| count == 1)
            .map(|(edge, _)| edge)
            .collect();
        edges.sort_unstable();
        edges
    }

    /// Whether every edge is shared by exactly two triangles.
    pub fn is_watertight(&self) -> bool {
        self.edge_valences().values().all(|&count| count == 2)
    }
}
