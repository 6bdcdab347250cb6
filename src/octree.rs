//! The adaptive octree: an arena of cells and faces addressed by stable integer ids.

use ahash::RandomState;
use bitflags::bitflags;
use std::collections::HashMap;

use crate::config::CmsConfig;
use crate::grid::{is_inside, EdgeKey, GridPoint, SampleGrid};
use crate::segment::Strip;
use crate::tables::{CELL_EDGES, CORNER_OFFSETS, FACE_AXES, FACE_EDGES};
use crate::util::PhaseTimer;

bitflags! {
    /// Position of a child inside its parent, one bit per axis.
    pub struct OctreeIndex : u8 {
        /// Upper half along x.
        const RIGHT = 1 << 0;
        /// Upper half along y.
        const TOP = 1 << 1;
        /// Upper half along z.
        const FRONT = 1 << 2;
    }
}

impl OctreeIndex {
    /// Offset of this octant inside its parent, in units of the child size.
    pub fn offset(self) -> [u32; 3] {
        CORNER_OFFSETS[self.bits() as usize]
    }
}

/// A 64-bit integer that indicates a single node in the octree.
/// Its internal representation starts with 1 as the root node and appends 3 bits for each following
/// child node, indicating its position in the X, Y and Z axis.
#[derive(Hash, PartialEq, Eq, Clone, Copy, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct MortonKey(pub u64);

impl MortonKey {
    /// Returns a Morton key pointing to the octree root node.
    pub const fn root() -> Self {
        Self(1)
    }

    /// Returns a Morton key pointing to no node.
    pub const fn none() -> Self {
        Self(0)
    }

    /// Returns the parent of this Morton key.
    /// If this key is pointing to the root node, the node given will be equal to [`MortonKey::none()`].
    pub fn parent(self) -> Self {
        Self(self.0 >> 3)
    }

    /// Returns a child of the node this key is pointing to.
    /// # Panics
    /// Panics if the level of this key is equal to the maximum level possible.
    pub fn child(self, index: OctreeIndex) -> Self {
        assert!(self.level() < Self::max_level());
        Self(self.0 << 3 | index.bits() as u64)
    }

    /// Returns the level or depth of this node, where 0 is the root node.
    /// # Panics
    /// Panics if this is a Morton key pointing to no node.
    pub fn level(self) -> u32 {
        assert_ne!(self.0, 0);
        (63 - self.0.leading_zeros()) / 3
    }

    /// Returns the maximum depth of the nodes that this type can point to.
    pub const fn max_level() -> u32 {
        63 / 3
    }

    /// Returns the key of the node at `level` whose integer coordinates (in units of that level's
    /// node size) are `coords`.
    pub fn from_coords(level: u32, coords: [u32; 3]) -> Self {
        assert!(level <= Self::max_level());
        let mut bits = 1u64;
        for i in (0..level).rev() {
            bits <<= 3;
            bits |= ((coords[0] >> i) & 1) as u64
                | (((coords[1] >> i) & 1) as u64) << 1
                | (((coords[2] >> i) & 1) as u64) << 2;
        }
        Self(bits)
    }

    /// Integer coordinates of this node in units of its own size.
    pub fn coords(self) -> [u32; 3] {
        let (mut x, mut y, mut z) = (0, 0, 0);
        let mut bits = self.0;

        for i in 0..self.level() {
            x |= ((bits & 1) as u32) << i;
            bits >>= 1;
            y |= ((bits & 1) as u32) << i;
            bits >>= 1;
            z |= ((bits & 1) as u32) << i;
            bits >>= 1;
        }

        [x, y, z]
    }

    /// Returns a key that goes along the current key until a given level.
    /// # Panics
    /// If `self.level() < level`.
    pub fn until_level(self, level: u32) -> Self {
        assert!(self.level() >= level);
        Self(self.0 >> ((self.level() - level) * 3))
    }
}

/// Index of a cell in the octree arena.
#[derive(Hash, PartialEq, Eq, PartialOrd, Ord, Clone, Copy, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CellId(pub usize);

/// Index of a face in the octree arena.
#[derive(Hash, PartialEq, Eq, PartialOrd, Ord, Clone, Copy, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct FaceId(pub usize);

/// One of the six sides of a cell.
#[derive(PartialEq, Eq, Clone, Copy, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
/// One of the six sides of a cell. The discriminant is the face index.
pub enum Side {
    /// -x
    Left,
    /// +x
    Right,
    /// -y
    Bottom,
    /// +y
    Top,
    /// -z
    Back,
    /// +z
    Front,
}

impl Side {
    /// All sides, in face order.
    pub const ALL: [Side; 6] = [
        Side::Left,
        Side::Right,
        Side::Bottom,
        Side::Top,
        Side::Back,
        Side::Front,
    ];

    /// Axis the side is perpendicular to.
    pub fn axis(self) -> usize {
        self as usize / 2
    }

    /// Whether the side faces the positive direction of its axis.
    pub fn is_high(self) -> bool {
        self as usize % 2 == 1
    }

    /// The side facing the other way along the same axis.
    pub fn opposite(self) -> Side {
        Side::ALL[self as usize ^ 1]
    }

    /// `(u, v)` axes of the face frame, with `u × v` pointing out of the cell.
    pub fn frame(self) -> (usize, usize) {
        FACE_AXES[self as usize]
    }
}

/// Integer extent of a cell on the sample grid.
#[derive(PartialEq, Eq, Clone, Copy, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CellBounds {
    /// Lowest grid point of the cell.
    pub origin: GridPoint,
    /// Edge length in grid steps.
    pub size: u32,
}

impl CellBounds {
    /// Grid point of cell corner `i` (see [`OctreeIndex`] for the bit layout).
    pub fn corner(&self, i: usize) -> GridPoint {
        let offset = CORNER_OFFSETS[i];
        [
            self.origin[0] + offset[0] * self.size,
            self.origin[1] + offset[1] * self.size,
            self.origin[2] + offset[2] * self.size,
        ]
    }

    /// Grid point of corner `(cu, cv)` of the face on `side`.
    pub fn face_corner(&self, side: Side, cu: u32, cv: u32) -> GridPoint {
        let (u, v) = side.frame();
        let mut p = self.origin;
        if side.is_high() {
            p[side.axis()] += self.size;
        }
        p[u] += cu * self.size;
        p[v] += cv * self.size;
        p
    }

    /// First grid point and axis of face edge `edge` on `side`. The edge spans `size` grid steps.
    pub fn face_edge(&self, side: Side, edge: usize) -> (GridPoint, usize) {
        let ((cu, cv), direction) = FACE_EDGES[edge];
        let (u, v) = side.frame();
        let axis = if direction == 0 { u } else { v };
        (self.face_corner(side, cu, cv), axis)
    }

    /// The face edge of `side` that contains the grid edge `key`, if any.
    pub fn face_edge_of(&self, side: Side, key: EdgeKey) -> Option<u8> {
        (0..4).find_map(|edge| {
            let (start, axis) = self.face_edge(side, edge);
            let on_line = (0..3).all(|a| a == axis || key.point[a] == start[a]);
            let within = key.point[axis] >= start[axis] && key.point[axis] < start[axis] + self.size;
            (key.axis as usize == axis && on_line && within).then(|| edge as u8)
        })
    }
}

#[derive(PartialEq, Eq, Clone, Copy, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
/// Whether a cell was subdivided.
pub enum CellState {
    /// Subdivided into 8 children.
    Branch,
    /// Not subdivided; the surface is extracted here.
    Leaf,
}

/// A node of the octree.
#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Cell {
    /// Index of this cell in the arena.
    pub id: CellId,
    /// Branch or leaf.
    pub state: CellState,
    /// Depth, 0 for the root.
    pub level: u32,
    /// Path from the root.
    pub address: MortonKey,
    /// Extent in grid coordinates.
    pub bounds: CellBounds,
    /// Linear sample index of each corner.
    pub corners: [usize; 8],
    /// `None` for the root.
    pub parent: Option<CellId>,
    /// Children in [`OctreeIndex`] order, for branches.
    pub children: Option<[CellId; 8]>,
    /// Faces in [`Side::ALL`] order.
    pub faces: [FaceId; 6],
    /// Same-level cells across each face.
    pub neighbors: [Option<CellId>; 6],
    /// Closed boundary loops of vertex indices, filled in for leaves by the tracer.
    pub components: Vec<Vec<u32>>,
}

impl Cell {
    /// Whether the cell was left undivided.
    pub fn is_leaf(&self) -> bool {
        self.state == CellState::Leaf
    }
}

#[derive(PartialEq, Eq, Clone, Copy, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
/// How the strips of a face were obtained.
pub enum FaceState {
    /// Face of a branch cell; it holds no strips of its own.
    Branch,
    /// Segmented from its own corners.
    Leaf,
    /// The cell across it is subdivided; its strips come from the finer side.
    Transitional,
}

/// One side of a cell.
#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Face {
    /// Index of this face in the arena.
    pub id: FaceId,
    /// The cell this face belongs to.
    pub cell: CellId,
    /// Which side of its cell it lies on.
    pub side: Side,
    /// Branch, leaf or transitional.
    pub state: FaceState,
    /// Faces of the child cells lying on this face, for branch cells.
    pub children: Option<[FaceId; 4]>,
    /// The opposite face of the same-level neighbor.
    pub twin: Option<FaceId>,
    /// Boundary strips seen from outside this face's cell.
    pub strips: Vec<Strip>,
    /// Vertex chains of a transitional face, oriented for this face's cell.
    pub segments: Vec<Vec<u32>>,
}

/// An adaptive octree over a [`SampleGrid`].
///
/// Cell 0 is the root. Ids are assigned in build order and never change.
#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Octree {
    cells: Vec<Cell>,
    faces: Vec<Face>,
    addresses: HashMap<MortonKey, CellId, RandomState>,
    max_depth: u32,
}

impl Octree {
    /// Builds the octree, splitting cells top-down with an explicit work stack.
    ///
    /// A cell is split while it is shallower than `min_depth`. Below that, a cell shallower than
    /// `max_depth` is split when its samples straddle the iso-level and either vary by more than
    /// the complexity threshold or cross one of its edges more than once.
    pub fn build(grid: &SampleGrid, config: &CmsConfig) -> Self {
        let mut octree = Self {
            cells: Vec::with_capacity(256),
            faces: Vec::with_capacity(256 * 6),
            addresses: HashMap::with_capacity_and_hasher(256, RandomState::new()),
            max_depth: config.max_depth,
        };

        let root = octree.push_cell(
            grid,
            None,
            MortonKey::root(),
            CellBounds {
                origin: [0, 0, 0],
                size: 1 << config.max_depth,
            },
        );

        let mut to_process = Vec::with_capacity(64);
        to_process.push(root);
        while let Some(id) = to_process.pop() {
            if octree.should_split(grid, config, id) {
                to_process.extend(octree.subdivide(grid, id));
            }
        }

        {
            let mut timer = PhaseTimer::trace("Twins");
            timer.record(octree.wire_twins(), "twin faces");
        }

        log::debug!(
            "Built octree with {} cells ({} leaves)",
            octree.cells.len(),
            octree.cells.iter().filter(|cell| cell.is_leaf()).count()
        );

        octree
    }

    fn push_cell(
        &mut self,
        grid: &SampleGrid,
        parent: Option<CellId>,
        address: MortonKey,
        bounds: CellBounds,
    ) -> CellId {
        let id = CellId(self.cells.len());
        let mut faces = [FaceId(0); 6];
        for (face, side) in faces.iter_mut().zip(Side::ALL) {
            *face = FaceId(self.faces.len());
            self.faces.push(Face {
                id: *face,
                cell: id,
                side,
                state: FaceState::Leaf,
                children: None,
                twin: None,
                strips: Vec::new(),
                segments: Vec::new(),
            });
        }

        let mut corners = [0; 8];
        for (i, corner) in corners.iter_mut().enumerate() {
            *corner = grid.index(bounds.corner(i));
        }

        self.cells.push(Cell {
            id,
            state: CellState::Leaf,
            level: address.level(),
            address,
            bounds,
            corners,
            parent,
            children: None,
            faces,
            neighbors: [None; 6],
            components: Vec::new(),
        });
        self.addresses.insert(address, id);
        id
    }

    fn should_split(&self, grid: &SampleGrid, config: &CmsConfig, id: CellId) -> bool {
        let cell = &self.cells[id.0];
        if cell.level < config.min_depth {
            return true;
        }
        if cell.level >= config.max_depth {
            return false;
        }

        let (min, max) = grid.range(cell.bounds.origin, cell.bounds.size);
        let straddles = is_inside(min, config.iso_level) && !is_inside(max, config.iso_level);
        if !straddles {
            return false;
        }
        if max - min > config.complexity_threshold {
            return true;
        }

        CELL_EDGES.iter().any(|&(corner, axis)| {
            grid.sign_changes(
                cell.bounds.corner(corner),
                axis,
                cell.bounds.size,
                config.iso_level,
            ) > 1
        })
    }

    /// Splits a leaf into 8 children and links the parent's faces to the children's faces.
    fn subdivide(&mut self, grid: &SampleGrid, id: CellId) -> [CellId; 8] {
        assert!(
            self.cells[id.0].children.is_none(),
            "Tried to subdivide already subdivided cell"
        );
        let (address, bounds) = (self.cells[id.0].address, self.cells[id.0].bounds);
        let half = bounds.size / 2;

        let mut children = [CellId(0); 8];
        for (i, child) in children.iter_mut().enumerate() {
            let index = OctreeIndex::from_bits_truncate(i as u8);
            let offset = index.offset();
            *child = self.push_cell(
                grid,
                Some(id),
                address.child(index),
                CellBounds {
                    origin: [
                        bounds.origin[0] + offset[0] * half,
                        bounds.origin[1] + offset[1] * half,
                        bounds.origin[2] + offset[2] * half,
                    ],
                    size: half,
                },
            );
        }

        let faces = self.cells[id.0].faces;
        for side in Side::ALL {
            let high = side.is_high() as u32;
            let mut face_children = [FaceId(0); 4];
            let octants = (0..8).filter(|&i| CORNER_OFFSETS[i][side.axis()] == high);
            for (slot, octant) in face_children.iter_mut().zip(octants) {
                *slot = self.cells[children[octant].0].faces[side as usize];
            }
            let face = &mut self.faces[faces[side as usize].0];
            face.children = Some(face_children);
            face.state = FaceState::Branch;
        }

        let cell = &mut self.cells[id.0];
        cell.children = Some(children);
        cell.state = CellState::Branch;
        children
    }

    /// Links every face to the opposite face of the same-level cell across it, returning the
    /// number of faces that found a twin.
    fn wire_twins(&mut self) -> usize {
        let mut wired = 0;
        for id in 0..self.cells.len() {
            let (address, level) = (self.cells[id].address, self.cells[id].level);
            let coords = address.coords();
            let extent = 1u32 << level;

            for side in Side::ALL {
                let axis = side.axis();
                let mut neighbor = coords;
                if side.is_high() {
                    if coords[axis] + 1 >= extent {
                        continue;
                    }
                    neighbor[axis] += 1;
                } else {
                    if coords[axis] == 0 {
                        continue;
                    }
                    neighbor[axis] -= 1;
                }

                if let Some(&other) = self.addresses.get(&MortonKey::from_coords(level, neighbor)) {
                    let twin = self.cells[other.0].faces[side.opposite() as usize];
                    let face = self.cells[id].faces[side as usize];
                    self.cells[id].neighbors[side as usize] = Some(other);
                    self.faces[face.0].twin = Some(twin);
                    wired += 1;
                }
            }
        }
        wired
    }

    /// The root cell.
    pub fn root(&self) -> CellId {
        CellId(0)
    }

    /// Deepest level cells may reach.
    pub fn max_depth(&self) -> u32 {
        self.max_depth
    }

    /// The cell with the given id.
    /// # Panics
    /// If the id does not belong to this octree.
    pub fn cell(&self, id: CellId) -> &Cell {
        &self.cells[id.0]
    }

    /// Mutable access to a cell.
    pub fn cell_mut(&mut self, id: CellId) -> &mut Cell {
        &mut self.cells[id.0]
    }

    /// The face with the given id.
    /// # Panics
    /// If the id does not belong to this octree.
    pub fn face(&self, id: FaceId) -> &Face {
        &self.faces[id.0]
    }

    /// Mutable access to a face.
    pub fn face_mut(&mut self, id: FaceId) -> &mut Face {
        &mut self.faces[id.0]
    }

    /// The cell with the given id, if it exists.
    pub fn get(&self, id: CellId) -> Option<&Cell> {
        self.cells.get(id.0)
    }

    /// Every cell, indexed by [`CellId`].
    pub fn cells(&self) -> &[Cell] {
        &self.cells
    }

    /// Every face, indexed by [`FaceId`].
    pub fn faces(&self) -> &[Face] {
        &self.faces
    }

    /// Number of cells, branches included.
    pub fn cell_count(&self) -> usize {
        self.cells.len()
    }

    /// Finds the cell with the given address, if it was created.
    pub fn find(&self, address: MortonKey) -> Option<CellId> {
        self.addresses.get(&address).copied()
    }

    /// Finds all the leaf cells belonging to `parent`.
    pub fn leaves(&self, parent: CellId) -> Vec<CellId> {
        let mut leaves = Vec::with_capacity(128);
        let mut to_process = Vec::with_capacity(64);
        to_process.push(parent);

        while let Some(cell_to_process) = to_process.pop() {
            match self.cells[cell_to_process.0].children {
                Some(children) => to_process.extend(children.iter().rev()),
                None => leaves.push(cell_to_process),
            }
        }

        leaves
    }

    /// Ids of every leaf, in arena order.
    pub fn leaf_ids(&self) -> Vec<CellId> {
        self.cells
            .iter()
            .filter(|cell| cell.is_leaf())
            .map(|cell| cell.id)
            .collect()
    }

    /// The cell owning a face.
    pub fn face_cell(&self, face: FaceId) -> &Cell {
        &self.cells[self.faces[face.0].cell.0]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(min_depth: u32, max_depth: u32, complexity_threshold: f32) -> CmsConfig {
        CmsConfig {
            min_depth,
            max_depth,
            complexity_threshold,
            ..CmsConfig::default()
        }
    }

    #[test]
    fn morton_coords_round_trip() {
        let key = MortonKey::from_coords(3, [5, 2, 7]);
        assert_eq!(key.level(), 3);
        assert_eq!(key.coords(), [5, 2, 7]);
        assert_eq!(key.parent().coords(), [2, 1, 3]);
        assert_eq!(key.until_level(1).coords(), [1, 0, 1]);
        assert_eq!(MortonKey::root().coords(), [0, 0, 0]);
    }

    #[test]
    fn uniform_depth_has_all_leaves() {
        let sphere = |x: f32, y: f32, z: f32| x * x + y * y + z * z - 0.5;
        let config = config(2, 2, 0.);
        let grid = SampleGrid::sample(&sphere, &config);
        let octree = Octree::build(&grid, &config);

        assert_eq!(octree.cell_count(), 1 + 8 + 64);
        let leaves = octree.leaf_ids();
        assert_eq!(leaves.len(), 64);
        for id in leaves {
            let cell = octree.cell(id);
            assert_eq!(cell.level, 2);
            assert_eq!(cell.bounds.size, 1);
            assert_eq!(octree.find(cell.address), Some(id));
        }
    }

    #[test]
    fn twins_point_back() {
        let sphere = |x: f32, y: f32, z: f32| x * x + y * y + z * z - 0.5;
        let config = config(2, 3, 0.);
        let grid = SampleGrid::sample(&sphere, &config);
        let octree = Octree::build(&grid, &config);

        for face in octree.faces() {
            if let Some(twin) = face.twin {
                let twin = octree.face(twin);
                assert_eq!(twin.twin, Some(face.id));
                assert_eq!(twin.side, face.side.opposite());
                assert_eq!(
                    octree.face_cell(twin.id).level,
                    octree.cell(face.cell).level
                );
            }
        }
    }

    #[test]
    fn splits_only_cells_that_hold_the_surface() {
        // Surface is the plane x = 0.3; only cells crossing it refine past min_depth.
        let plane = |x: f32, _: f32, _: f32| x - 0.3;
        let config = config(1, 3, 0.);
        let grid = SampleGrid::sample(&plane, &config);
        let octree = Octree::build(&grid, &config);

        for id in octree.leaf_ids() {
            let cell = octree.cell(id);
            let (min, max) = grid.range(cell.bounds.origin, cell.bounds.size);
            let crossed = min < 0. && max >= 0.;
            if crossed {
                assert_eq!(cell.level, 3);
            } else if cell.level > 1 {
                let parent = octree.cell(cell.parent.unwrap());
                let (min, max) = grid.range(parent.bounds.origin, parent.bounds.size);
                assert!(min < 0. && max >= 0.);
            }
        }
    }

    #[test]
    fn edge_ambiguity_forces_a_split() {
        // Two thin slabs cross the bottom x edge of the root twice.
        let slabs = |x: f32, _: f32, _: f32| ((x.abs() - 0.5).abs()) - 0.1;
        let config = config(0, 2, f32::INFINITY);
        let grid = SampleGrid::sample(&slabs, &config);
        let octree = Octree::build(&grid, &config);
        assert_eq!(octree.cell(octree.root()).state, CellState::Branch);
    }

    #[test]
    fn leaves_of_branch() {
        let sphere = |x: f32, y: f32, z: f32| x * x + y * y + z * z - 0.5;
        let config = config(1, 1, 0.);
        let grid = SampleGrid::sample(&sphere, &config);
        let octree = Octree::build(&grid, &config);
        let leaves = octree.leaves(octree.root());
        assert_eq!(leaves.len(), 8);
        assert_eq!(octree.leaves(leaves[3]), vec![leaves[3]]);
    }

    #[test]
    fn face_edge_lookup() {
        let bounds = CellBounds {
            origin: [4, 0, 8],
            size: 4,
        };
        // +z face, frame (x, y): edge 1 runs along y at x = 8.
        let (start, axis) = bounds.face_edge(Side::Front, 1);
        assert_eq!((start, axis), ([8, 0, 12], 1));
        assert_eq!(
            bounds.face_edge_of(Side::Front, EdgeKey::new([8, 2, 12], 1)),
            Some(1)
        );
        assert_eq!(
            bounds.face_edge_of(Side::Front, EdgeKey::new([6, 2, 12], 1)),
            None
        );
    }
}
