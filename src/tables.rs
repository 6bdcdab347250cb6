//! Lookup tables shared by the octree builder and the face segmenter.
//!
//! Faces are seen from outside their cell in a local `(u, v)` frame where `u × v` is the outward
//! normal. Face corners are numbered in Z order and face edges counter-clockwise:
//!
//! ```text
//!   v
//!   ^   2 ---e2--- 3
//!   |   |          |
//!   |   e3         e1
//!   |   |          |
//!   |   0 ---e0--- 1
//!   +----------------> u
//! ```

/// `(u, v)` axes of each face frame, indexed by side (-x, +x, -y, +y, -z, +z).
pub const FACE_AXES: [(usize, usize); 6] = [(2, 1), (1, 2), (0, 2), (2, 0), (1, 0), (0, 1)];

/// Starting corner `(u, v)` and direction (0 = along u, 1 = along v) of each face edge.
pub const FACE_EDGES: [((u32, u32), usize); 4] = [((0, 0), 0), ((1, 0), 1), ((0, 1), 0), ((0, 0), 1)];

/// Marching squares table. Bit `i` of the index is set when face corner `i` is inside.
///
/// Each entry lists directed strips `(from edge, to edge)`; walking a strip, the inside corners lie
/// on its right. Entries 6 and 9 have two diagonal inside corners: each corner is cut off by a
/// strip of its own.
pub const MARCHING_SQUARES: [&[(u8, u8)]; 16] = [
    &[],
    &[(3, 0)],
    &[(0, 1)],
    &[(3, 1)],
    &[(2, 3)],
    &[(2, 0)],
    &[(0, 1), (2, 3)],
    &[(2, 1)],
    &[(1, 2)],
    &[(3, 0), (1, 2)],
    &[(0, 2)],
    &[(3, 2)],
    &[(1, 3)],
    &[(1, 0)],
    &[(0, 3)],
    &[],
];

/// Offset of cell corner (and child octant) `i`, one bit per axis.
pub const CORNER_OFFSETS: [[u32; 3]; 8] = [
    [0, 0, 0],
    [1, 0, 0],
    [0, 1, 0],
    [1, 1, 0],
    [0, 0, 1],
    [1, 0, 1],
    [0, 1, 1],
    [1, 1, 1],
];

/// The 12 cell edges as `(start corner, axis)`.
pub const CELL_EDGES: [(usize, usize); 12] = [
    (0, 0),
    (2, 0),
    (4, 0),
    (6, 0),
    (0, 1),
    (1, 1),
    (4, 1),
    (5, 1),
    (0, 2),
    (1, 2),
    (2, 2),
    (3, 2),
];
