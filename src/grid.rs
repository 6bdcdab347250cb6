//! The dense sample grid and the cache of crossing vertices along its edges.

use cgmath::{Point3, Vector3};
use rayon::prelude::*;

use crate::config::CmsConfig;
use crate::field::ScalarField;

/// Integer coordinates of a grid sample.
pub type GridPoint = [u32; 3];

/// Returns whether a sampled value lies inside the surface.
#[inline]
pub fn is_inside(value: f32, iso_level: f32) -> bool {
    value < iso_level
}

/// Field values sampled on a regular `(2^max_depth + 1)³` lattice, stored x-fastest.
#[derive(Clone, Debug)]
pub struct SampleGrid {
    samples: Vec<f32>,
    dim: usize,
    origin: Point3<f32>,
    spacing: Vector3<f32>,
}

impl SampleGrid {
    /// Samples `field` over the configured bounding box.
    ///
    /// Each z-slab is filled by its own task; tasks write disjoint slices, so every sample is
    /// written exactly once.
    pub fn sample<F: ScalarField + ?Sized>(field: &F, config: &CmsConfig) -> Self {
        let dim = config.samples_per_axis();
        let origin = Point3::from(config.bounds_min);
        let spacing = Vector3::from(config.spacing());

        let mut samples = vec![0f32; dim * dim * dim];
        samples
            .par_chunks_mut(dim * dim)
            .enumerate()
            .for_each(|(k, slab)| {
                let z = origin.z + k as f32 * spacing.z;
                for j in 0..dim {
                    let y = origin.y + j as f32 * spacing.y;
                    for i in 0..dim {
                        slab[j * dim + i] = field.evaluate(origin.x + i as f32 * spacing.x, y, z);
                    }
                }
            });

        log::debug!("Sampled {} grid points ({}³)", samples.len(), dim);

        Self {
            samples,
            dim,
            origin,
            spacing,
        }
    }

    /// Samples per axis.
    pub fn dim(&self) -> usize {
        self.dim
    }

    /// Total number of samples.
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// Whether the grid holds no samples.
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Distance between neighboring samples along each axis.
    pub fn spacing(&self) -> Vector3<f32> {
        self.spacing
    }

    /// Linear index of a grid point.
    #[inline]
    pub fn index(&self, p: GridPoint) -> usize {
        (p[2] as usize * self.dim + p[1] as usize) * self.dim + p[0] as usize
    }

    /// Sample at a grid point.
    #[inline]
    pub fn value(&self, p: GridPoint) -> f32 {
        self.samples[self.index(p)]
    }

    /// Sample at a linear index, such as [`Cell::corners`](crate::octree::Cell::corners).
    #[inline]
    pub fn value_at(&self, index: usize) -> f32 {
        self.samples[index]
    }

    /// World-space position of a grid point.
    pub fn position(&self, p: GridPoint) -> Point3<f32> {
        Point3::new(
            self.origin.x + p[0] as f32 * self.spacing.x,
            self.origin.y + p[1] as f32 * self.spacing.y,
            self.origin.z + p[2] as f32 * self.spacing.z,
        )
    }

    /// Smallest and largest sample in the box `[origin, origin + size]` (inclusive).
    pub fn range(&self, origin: GridPoint, size: u32) -> (f32, f32) {
        let mut min = f32::INFINITY;
        let mut max = f32::NEG_INFINITY;
        for k in origin[2]..=origin[2] + size {
            for j in origin[1]..=origin[1] + size {
                let row = self.index([origin[0], j, k]);
                for &value in &self.samples[row..=row + size as usize] {
                    min = min.min(value);
                    max = max.max(value);
                }
            }
        }
        (min, max)
    }

    /// Number of inside/outside changes between consecutive samples on the grid line starting at
    /// `start` and running `len` samples along `axis`.
    pub fn sign_changes(&self, start: GridPoint, axis: usize, len: u32, iso_level: f32) -> usize {
        let mut p = start;
        let mut previous = is_inside(self.value(p), iso_level);
        let mut changes = 0;
        for _ in 0..len {
            p[axis] += 1;
            let current = is_inside(self.value(p), iso_level);
            if current != previous {
                changes += 1;
            }
            previous = current;
        }
        changes
    }
}

/// Locator of one finest-level grid edge: its lower end point and its direction.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct EdgeKey {
    /// Lower end of the edge.
    pub point: GridPoint,
    /// Direction of the edge (0 = x, 1 = y, 2 = z).
    pub axis: u8,
}

impl EdgeKey {
    /// The edge leaving `point` along `axis`.
    pub fn new(point: GridPoint, axis: usize) -> Self {
        debug_assert!(axis < 3);
        Self {
            point,
            axis: axis as u8,
        }
    }

    /// Upper end of the edge.
    pub fn end(self) -> GridPoint {
        let mut end = self.point;
        end[self.axis as usize] += 1;
        end
    }
}

/// Maps every finest grid edge to the vertex created on it, if any.
///
/// Adjacent cells, and cells of different size sharing part of an edge, always look up the same
/// finest edge for the same crossing, so they end up sharing the vertex index.
#[derive(Clone, Debug)]
pub struct EdgeCache {
    /// One vertex index per axis for every grid point, [`EdgeCache::EMPTY`] where there is none.
    entries: Vec<[u32; 3]>,
    dim: usize,
}

impl EdgeCache {
    /// Marks an edge without a vertex.
    pub const EMPTY: u32 = u32::MAX;

    /// Creates an empty cache for a grid with `dim` samples per axis.
    pub fn new(dim: usize) -> Self {
        Self {
            entries: vec![[Self::EMPTY; 3]; dim * dim * dim],
            dim,
        }
    }

    fn slot(&self, key: EdgeKey) -> usize {
        let p = key.point;
        (p[2] as usize * self.dim + p[1] as usize) * self.dim + p[0] as usize
    }

    /// The vertex recorded for an edge, if any.
    pub fn get(&self, key: EdgeKey) -> Option<u32> {
        match self.entries[self.slot(key)][key.axis as usize] {
            Self::EMPTY => None,
            vertex => Some(vertex),
        }
    }

    /// Records the vertex of an edge. An edge keeps the first vertex recorded for it.
    ///
    /// # Panics
    /// Panics if `vertex` is [`EdgeCache::EMPTY`].
    pub fn insert(&mut self, key: EdgeKey, vertex: u32) -> u32 {
        assert_ne!(vertex, Self::EMPTY, "vertex index out of range");
        let slot = self.slot(key);
        let entry = &mut self.entries[slot][key.axis as usize];
        if *entry == Self::EMPTY {
            *entry = vertex;
        }
        *entry
    }

    /// Number of edges holding a vertex.
    pub fn len(&self) -> usize {
        self.entries
            .iter()
            .flatten()
            .filter(|&&vertex| vertex != Self::EMPTY)
            .count()
    }

    /// Whether no edge holds a vertex.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
