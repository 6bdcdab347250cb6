//! Contains the Cubical Marching Squares driver, [`CubicalMarchingSquares`], along with a function
//! ([`mesh_from_field`]) to run it in one call.
//!
//! # Explanation
//! The field is sampled once on a regular grid as fine as the deepest octree level allowed. An
//! octree is then built over that grid, refining only where the surface is complex. Each leaf cell
//! is treated as six independent faces: marching squares on every face yields short boundary
//! strips, and the strips of a cell link up into closed loops that are finally triangulated.
//!
//! Leaves next to finer cells borrow the strips of the finer faces instead of segmenting their own
//! face, and every crossing vertex is shared through a per-edge cache. Both sides of every face
//! therefore agree on its boundary, and the mesh has no cracks between cells of different size.
//!
//! # References
//! Refer to the comments at the start of `src/lib.rs`.

use ahash::RandomState;
use std::collections::HashSet;

use crate::config::CmsConfig;
use crate::error::Result;
use crate::field::ScalarField;
use crate::grid::{EdgeCache, SampleGrid};
use crate::mesh::{Mesh, Vertex};
use crate::octree::{CellId, FaceId, FaceState, Octree, Side};
use crate::segment::{Segmenter, GRADIENT_STEP};
use crate::tessellate::Tessellator;
use crate::trace::trace_components;
use crate::transition::resolve_transitional_face;
use crate::util::PhaseTimer;

/// Counters gathered during the last extraction.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct MeshingStats {
    /// Samples in the grid, counting those taken by earlier extractions.
    pub grid_samples: usize,
    /// Cells in the octree, branches included.
    pub cells: usize,
    /// Leaf cells in the octree.
    pub leaves: usize,
    /// Faces that adopted the strips of a finer neighbor.
    pub transitional_faces: usize,
    /// Strips found by marching squares on leaf faces.
    pub strips: usize,
    /// Vertices placed on grid edges, before medians are added.
    pub crossing_vertices: usize,
    /// Closed loops traced over all leaves.
    pub components: usize,
    /// Vertices in the output mesh, medians included.
    pub vertices: usize,
    /// Triangles emitted into the mesh.
    pub triangles: usize,
}

/// An extractor bound to one field and one configuration.
///
/// The field is sampled on the first call to [`extract`](Self::extract) (or [`sample`](Self::sample))
/// and the samples are kept. Every extraction rebuilds the octree and the vertex buffer from them,
/// so extracting twice gives the same mesh without sampling the grid again.
///
/// # Example
/// ```rust
/// use cms::prelude::*;
///
/// let sphere = |x: f32, y: f32, z: f32| x * x + y * y + z * z - 0.5;
/// let config = CmsConfig {
///     min_depth: 3,
///     max_depth: 3,
///     ..CmsConfig::default()
/// };
///
/// let mut cms = CubicalMarchingSquares::new(sphere, config).unwrap();
/// let mesh = cms.extract().unwrap();
/// assert!(mesh.triangle_count() > 0);
/// assert!(mesh.is_watertight());
/// ```
pub struct CubicalMarchingSquares<F: ScalarField> {
    field: F,
    config: CmsConfig,
    grid: Option<SampleGrid>,
    octree: Option<Octree>,
    vertices: Vec<Vertex>,
    desired: Option<HashSet<CellId, RandomState>>,
    stats: MeshingStats,
}

impl<F: ScalarField> CubicalMarchingSquares<F> {
    /// Creates an extractor, checking the configuration before anything is sampled.
    pub fn new(field: F, config: CmsConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            field,
            config,
            grid: None,
            octree: None,
            vertices: Vec::new(),
            desired: None,
            stats: MeshingStats::default(),
        })
    }

    /// The configuration this extractor was created with.
    pub fn config(&self) -> &CmsConfig {
        &self.config
    }

    /// The field being meshed.
    pub fn field(&self) -> &F {
        &self.field
    }

    /// Samples the field if that has not happened yet, and returns the grid.
    pub fn sample(&mut self) -> &SampleGrid {
        let (field, config) = (&self.field, &self.config);
        self.grid.get_or_insert_with(|| {
            let mut timer = PhaseTimer::debug("Sampling");
            let grid = SampleGrid::sample(field, config);
            timer.record(grid.len(), "samples");
            grid
        })
    }

    /// Whether the field has been sampled already.
    pub fn is_sampled(&self) -> bool {
        self.grid.is_some()
    }

    /// The cached samples, if any.
    pub fn grid(&self) -> Option<&SampleGrid> {
        self.grid.as_ref()
    }

    /// Restricts the output to the given cells. Branch cells stand for all of their leaves.
    ///
    /// Ids refer to the octree of [`octree`](Self::octree), which is rebuilt identically by every
    /// extraction of this instance.
    pub fn set_desired_cells<I: IntoIterator<Item = CellId>>(&mut self, cells: I) {
        let mut desired = HashSet::with_hasher(RandomState::new());
        desired.extend(cells);
        self.desired = Some(desired);
    }

    /// Emits every cell again.
    pub fn clear_desired_cells(&mut self) {
        self.desired = None;
    }

    /// The octree of the last extraction.
    pub fn octree(&self) -> Option<&Octree> {
        self.octree.as_ref()
    }

    /// Every vertex created by the last extraction.
    pub fn vertices(&self) -> &[Vertex] {
        &self.vertices
    }

    /// Components of every leaf from the last extraction.
    pub fn components(&self) -> impl Iterator<Item = (CellId, &[u32])> + '_ {
        self.octree.iter().flat_map(|octree| {
            octree.cells().iter().flat_map(|cell| {
                cell.components
                    .iter()
                    .map(move |component| (cell.id, component.as_slice()))
            })
        })
    }

    /// Counters of the last extraction.
    pub fn stats(&self) -> &MeshingStats {
        &self.stats
    }

    /// Runs the whole pipeline and returns the mesh.
    ///
    /// # Errors
    /// [`CmsError::MalformedTopology`](crate::error::CmsError::MalformedTopology) or
    /// [`CmsError::UnresolvedCrossing`](crate::error::CmsError::UnresolvedCrossing) if the
    /// octree could not be stitched together. A shallower `max_depth` or a lower complexity
    /// threshold usually avoids them.
    pub fn extract(&mut self) -> Result<Mesh> {
        let mut timer = PhaseTimer::debug("Extraction");

        let (field, config) = (&self.field, &self.config);
        let grid: &SampleGrid = self.grid.get_or_insert_with(|| {
            let mut timer = PhaseTimer::debug("Sampling");
            let grid = SampleGrid::sample(field, config);
            timer.record(grid.len(), "samples");
            grid
        });

        let mut extraction = Extraction::new(field, grid, config);
        extraction.segment()?;
        extraction.resolve()?;
        extraction.trace()?;
        let mesh = extraction.tessellate(self.desired.as_ref());

        let Extraction {
            octree,
            vertices,
            stats,
            ..
        } = extraction;
        log::trace!("{:?}", stats);
        timer.record(stats.triangles, "triangles");

        self.octree = Some(octree);
        self.vertices = vertices;
        self.stats = stats;
        Ok(mesh)
    }
}

/// Creates a mesh from a scalar field in one call.
/// The triangles of the resulting mesh will be in **counter-clockwise** order seen from outside.
pub fn mesh_from_field<F: ScalarField>(field: F, config: &CmsConfig) -> Result<Mesh> {
    CubicalMarchingSquares::new(field, config.clone())?.extract()
}

/// State of a single run of the pipeline.
struct Extraction<'a, F: ScalarField + ?Sized> {
    field: &'a F,
    grid: &'a SampleGrid,
    config: &'a CmsConfig,
    octree: Octree,
    cache: EdgeCache,
    vertices: Vec<Vertex>,
    stats: MeshingStats,
}

impl<'a, F: ScalarField + ?Sized> Extraction<'a, F> {
    fn new(field: &'a F, grid: &'a SampleGrid, config: &'a CmsConfig) -> Self {
        let octree = {
            let mut timer = PhaseTimer::debug("Octree");
            let octree = Octree::build(grid, config);
            timer.record(octree.cell_count(), "cells");
            octree
        };
        let stats = MeshingStats {
            grid_samples: grid.len(),
            cells: octree.cell_count(),
            leaves: octree.cells().iter().filter(|cell| cell.is_leaf()).count(),
            ..MeshingStats::default()
        };

        Self {
            field,
            grid,
            config,
            octree,
            cache: EdgeCache::new(grid.dim()),
            vertices: Vec::new(),
            stats,
        }
    }

    /// Marks transitional faces and segments every other face of every leaf.
    fn segment(&mut self) -> Result<()> {
        let mut timer = PhaseTimer::debug("Segmentation");
        let mut segmenter = Segmenter {
            field: self.field,
            grid: self.grid,
            cache: &mut self.cache,
            vertices: &mut self.vertices,
            iso_level: self.config.iso_level,
            zero_approximation: self.config.zero_approximation,
        };

        for id in self.octree.leaf_ids() {
            let (bounds, faces) = {
                let cell = self.octree.cell(id);
                (cell.bounds, cell.faces)
            };

            for side in Side::ALL {
                let face_id = faces[side as usize];
                let transitional = self
                    .octree
                    .face(face_id)
                    .twin
                    .map_or(false, |twin| !self.octree.face_cell(twin).is_leaf());
                if transitional {
                    self.octree.face_mut(face_id).state = FaceState::Transitional;
                    continue;
                }

                let strips = segmenter.segment_face(bounds, side)?;
                self.stats.strips += strips.len();
                let face = self.octree.face_mut(face_id);
                face.state = FaceState::Leaf;
                face.strips = strips;
            }
        }

        self.stats.crossing_vertices = self.vertices.len();
        timer.record(self.stats.strips, "strips");
        Ok(())
    }

    fn resolve(&mut self) -> Result<()> {
        let mut timer = PhaseTimer::debug("Transitional faces");
        let transitional: Vec<FaceId> = self
            .octree
            .faces()
            .iter()
            .filter(|face| face.state == FaceState::Transitional)
            .map(|face| face.id)
            .collect();

        for face in transitional {
            resolve_transitional_face(&mut self.octree, face)?;
            if self.octree.face(face).state == FaceState::Transitional {
                self.stats.transitional_faces += 1;
            }
        }
        timer.record(self.stats.transitional_faces, "faces");
        Ok(())
    }

    fn trace(&mut self) -> Result<()> {
        let mut timer = PhaseTimer::debug("Tracing");
        for id in self.octree.leaf_ids() {
            let components = trace_components(&self.octree, id)?;
            self.stats.components += components.len();
            self.octree.cell_mut(id).components = components;
        }
        timer.record(self.stats.components, "components");
        Ok(())
    }

    /// Triangulates the components of the selected leaves (all of them when `desired` is `None`).
    fn tessellate(&mut self, desired: Option<&HashSet<CellId, RandomState>>) -> Mesh {
        let mut timer = PhaseTimer::debug("Tessellation");
        let selected: Option<HashSet<CellId, RandomState>> = desired.map(|desired| {
            desired
                .iter()
                .filter(|id| self.octree.get(**id).is_some())
                .flat_map(|&id| self.octree.leaves(id))
                .collect()
        });

        let mut indices = Vec::new();
        let mut tessellator = Tessellator {
            field: self.field,
            vertices: &mut self.vertices,
            indices: &mut indices,
            iso_level: self.config.iso_level,
            snap_median: self.config.snap_median,
            step: self.grid.spacing() * GRADIENT_STEP,
        };

        for cell in self.octree.cells() {
            let wanted = selected
                .as_ref()
                .map_or(true, |selected| selected.contains(&cell.id));
            if !cell.is_leaf() || !wanted {
                continue;
            }
            for component in &cell.components {
                tessellator.tessellate(component);
            }
        }

        self.stats.vertices = self.vertices.len();
        self.stats.triangles = indices.len() / 3;
        timer.record(self.stats.triangles, "triangles");
        Mesh {
            vertices: self.vertices.clone(),
            indices,
        }
    }
}
