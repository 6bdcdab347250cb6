//! Face segmentation: marching squares on each face of a leaf cell.

use cgmath::EuclideanSpace;

use crate::error::{CmsError, Result};
use crate::field::{gradient, safe_normalize, ScalarField};
use crate::grid::{is_inside, EdgeCache, EdgeKey, SampleGrid};
use crate::mesh::Vertex;
use crate::octree::{CellBounds, Side};
use crate::tables::MARCHING_SQUARES;
use crate::util::{interpolation_factor, Interpolatable};

/// Crossing refinement stops once the field is this close to the iso-level.
pub const ZERO_EPSILON: f32 = 1e-6;

/// Finite difference step for normals, as a fraction of the grid spacing.
pub const GRADIENT_STEP: f32 = 0.1;

/// A piece of the surface boundary crossing one face, from one crossing vertex to another.
///
/// Walking from `vertices[0]` to `vertices[1]` with the face seen from outside its cell, the
/// inside of the surface is on the right.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Strip {
    /// Face edges the strip enters and leaves through. A long strip whose end lies inside the
    /// face has no edge there.
    pub edges: [Option<u8>; 2],
    /// Vertex indices of the two ends, in walking order.
    pub vertices: [u32; 2],
    /// Grid edges holding the two vertices.
    pub crossings: [EdgeKey; 2],
    /// Set when the strip stands for a closed chain of a transitional face.
    pub is_loop: bool,
    /// Index into the owning face's transitional segments.
    pub segment: Option<usize>,
}

impl Strip {
    /// The same strip walked the other way.
    pub fn reversed(&self) -> Self {
        Self {
            edges: [self.edges[1], self.edges[0]],
            vertices: [self.vertices[1], self.vertices[0]],
            crossings: [self.crossings[1], self.crossings[0]],
            is_loop: self.is_loop,
            segment: self.segment,
        }
    }
}

/// Creates strips and crossing vertices, sharing vertices through the edge cache.
pub(crate) struct Segmenter<'a, F: ScalarField + ?Sized> {
    pub field: &'a F,
    pub grid: &'a SampleGrid,
    pub cache: &'a mut EdgeCache,
    pub vertices: &'a mut Vec<Vertex>,
    pub iso_level: f32,
    pub zero_approximation: u32,
}

impl<'a, F: ScalarField + ?Sized> Segmenter<'a, F> {
    /// Computes the 0 to 2 strips of the face on `side` of a cell.
    pub fn segment_face(&mut self, bounds: CellBounds, side: Side) -> Result<Vec<Strip>> {
        let mut code = 0;
        for (i, (cu, cv)) in [(0, 0), (1, 0), (0, 1), (1, 1)].into_iter().enumerate() {
            if is_inside(self.grid.value(bounds.face_corner(side, cu, cv)), self.iso_level) {
                code |= 1 << i;
            }
        }

        MARCHING_SQUARES[code]
            .iter()
            .map(|&(from, to)| {
                let (start_key, start) = self.crossing(bounds, side, from as usize)?;
                let (end_key, end) = self.crossing(bounds, side, to as usize)?;
                Ok(Strip {
                    edges: [Some(from), Some(to)],
                    vertices: [start, end],
                    crossings: [start_key, end_key],
                    is_loop: false,
                    segment: None,
                })
            })
            .collect()
    }

    /// Returns the vertex where the surface crosses a face edge, creating it if needed.
    ///
    /// The crossing is attached to the one finest grid edge along the face edge that changes sign,
    /// so cells of any size see the same vertex.
    fn crossing(&mut self, bounds: CellBounds, side: Side, edge: usize) -> Result<(EdgeKey, u32)> {
        let (start, axis) = bounds.face_edge(side, edge);
        let key = (0..bounds.size)
            .map(|step| {
                let mut p = start;
                p[axis] += step;
                EdgeKey::new(p, axis)
            })
            .find(|key| {
                is_inside(self.grid.value(key.point), self.iso_level)
                    != is_inside(self.grid.value(key.end()), self.iso_level)
            })
            .ok_or(CmsError::UnresolvedCrossing {
                edge: EdgeKey::new(start, axis),
            })?;

        if let Some(vertex) = self.cache.get(key) {
            return Ok((key, vertex));
        }

        let position = self.refine(key);
        let step = self.grid.spacing() * GRADIENT_STEP;
        let normal = safe_normalize(gradient(self.field, position, step));
        let index = self.vertices.len() as u32;
        self.vertices.push(Vertex {
            position,
            normal,
        });
        Ok((key, self.cache.insert(key, index)))
    }

    /// Locates the crossing on a grid edge: a linear guess, then bisection of the bracket, which
    /// re-samples the field at every step.
    fn refine(&self, key: EdgeKey) -> cgmath::Point3<f32> {
        let (mut a, mut b) = (self.grid.position(key.point), self.grid.position(key.end()));
        let (fa, fb) = (self.grid.value(key.point), self.grid.value(key.end()));
        let a_inside = is_inside(fa, self.iso_level);

        let mut p = a.interpolate(b, interpolation_factor(fa, fb, self.iso_level));
        for _ in 0..self.zero_approximation {
            let value = self.field.evaluate_at(p);
            if (value - self.iso_level).abs() < ZERO_EPSILON {
                break;
            }
            if is_inside(value, self.iso_level) == a_inside {
                a = p;
            } else {
                b = p;
            }
            p = a.midpoint(b);
        }
        p
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CmsConfig;
    use cgmath::{EuclideanSpace, InnerSpace};

    fn config(max_depth: u32, zero_approximation: u32) -> CmsConfig {
        CmsConfig {
            min_depth: max_depth,
            max_depth,
            zero_approximation,
            ..CmsConfig::default()
        }
    }

    #[test]
    fn shared_face_shares_vertices() {
        let slope = |_: f32, y: f32, _: f32| y + 0.5;
        let config = config(1, 4);
        let grid = SampleGrid::sample(&slope, &config);
        let mut cache = EdgeCache::new(grid.dim());
        let mut vertices = Vec::new();
        let mut segmenter = Segmenter {
            field: &slope,
            grid: &grid,
            cache: &mut cache,
            vertices: &mut vertices,
            iso_level: 0.,
            zero_approximation: 4,
        };

        let left_cell = CellBounds {
            origin: [0, 0, 0],
            size: 1,
        };
        let right_cell = CellBounds {
            origin: [1, 0, 0],
            size: 1,
        };
        let a = segmenter.segment_face(left_cell, Side::Right).unwrap();
        let b = segmenter.segment_face(right_cell, Side::Left).unwrap();

        assert_eq!(a.len(), 1);
        assert_eq!(b.len(), 1);
        let b = b[0].reversed();
        assert_eq!(a[0].vertices, b.vertices);
        assert_eq!(a[0].crossings, b.crossings);
        assert_eq!(vertices.len(), 2);
        for vertex in &vertices {
            assert!((vertex.position.y + 0.5).abs() < 1e-5);
            assert!((vertex.normal.y - 1.).abs() < 1e-4);
        }
    }

    #[test]
    fn empty_and_full_faces_have_no_strips() {
        let outside = |_: f32, _: f32, _: f32| 1.;
        let config = config(1, 0);
        let grid = SampleGrid::sample(&outside, &config);
        let mut cache = EdgeCache::new(grid.dim());
        let mut vertices = Vec::new();
        let mut segmenter = Segmenter {
            field: &outside,
            grid: &grid,
            cache: &mut cache,
            vertices: &mut vertices,
            iso_level: 0.,
            zero_approximation: 0,
        };
        let bounds = CellBounds {
            origin: [0, 0, 0],
            size: 2,
        };
        for side in Side::ALL {
            assert!(segmenter.segment_face(bounds, side).unwrap().is_empty());
        }
        // The same field is entirely inside for a higher iso-level.
        segmenter.iso_level = 2.;
        for side in Side::ALL {
            assert!(segmenter.segment_face(bounds, side).unwrap().is_empty());
        }
        assert!(vertices.is_empty());
    }

    #[test]
    fn saddle_face_yields_two_strips() {
        // Inside near (-1, -1) and (1, 1) of the z = -1 face.
        let saddle = |x: f32, y: f32, _: f32| -x * y + 0.25;
        let config = config(1, 6);
        let grid = SampleGrid::sample(&saddle, &config);
        let mut cache = EdgeCache::new(grid.dim());
        let mut vertices = Vec::new();
        let mut segmenter = Segmenter {
            field: &saddle,
            grid: &grid,
            cache: &mut cache,
            vertices: &mut vertices,
            iso_level: 0.,
            zero_approximation: 6,
        };
        let bounds = CellBounds {
            origin: [0, 0, 0],
            size: 2,
        };
        let strips = segmenter.segment_face(bounds, Side::Back).unwrap();
        assert_eq!(strips.len(), 2);
        assert_eq!(vertices.len(), 4);
    }

    #[test]
    fn bisection_converges_on_sphere() {
        let sphere = |x: f32, y: f32, z: f32| x * x + y * y + z * z - 0.7;
        let config = config(3, 12);
        let grid = SampleGrid::sample(&sphere, &config);
        let mut cache = EdgeCache::new(grid.dim());
        let mut vertices = Vec::new();
        let mut segmenter = Segmenter {
            field: &sphere,
            grid: &grid,
            cache: &mut cache,
            vertices: &mut vertices,
            iso_level: 0.,
            zero_approximation: 12,
        };
        for x in 0..8 {
            for y in 0..8 {
                let bounds = CellBounds {
                    origin: [x, y, 4],
                    size: 1,
                };
                segmenter.segment_face(bounds, Side::Back).unwrap();
            }
        }
        assert!(!vertices.is_empty());
        for vertex in &vertices {
            let radius = vertex.position.to_vec().magnitude();
            assert!((radius - 0.7f32.sqrt()).abs() < 1e-3, "radius {}", radius);
        }
    }
}
