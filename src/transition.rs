//! Stitching of faces between a leaf and a subdivided neighbor.
//!
//! When the cell across a leaf's face is still subdivided, the leaf must not segment that face
//! from its own four corners: the finer side sees more of the surface, and the two would not meet.
//! Instead, the strips of all the finer faces tiling it are chained into long strips. Each chain
//! keeps its interior vertices so the tracer can splice them into the leaf's boundary loops.

use std::collections::VecDeque;

use crate::error::{CmsError, Result};
use crate::octree::{CellState, FaceId, FaceState, Octree};
use crate::segment::Strip;

/// Gathers every strip of the leaf faces below `root`, depth first.
fn collect_strips(octree: &Octree, root: FaceId) -> Vec<Strip> {
    let mut strips = Vec::new();
    let mut to_process = vec![root];

    while let Some(face_id) = to_process.pop() {
        let face = octree.face(face_id);
        match face.children {
            Some(children) => to_process.extend(children.iter().rev()),
            None => strips.extend(face.strips.iter().cloned()),
        }
    }

    strips
}

/// A run of collected strips linked end to start.
struct Chain {
    vertices: VecDeque<u32>,
    first: usize,
    last: usize,
    is_loop: bool,
}

/// Links strips sharing vertices into the longest chains possible, consuming every strip.
fn link_chains(strips: &[Strip]) -> Vec<Chain> {
    let mut used = vec![false; strips.len()];
    let mut chains = Vec::new();

    for seed in 0..strips.len() {
        if used[seed] {
            continue;
        }
        used[seed] = true;

        let mut chain = Chain {
            vertices: VecDeque::from(vec![strips[seed].vertices[0], strips[seed].vertices[1]]),
            first: seed,
            last: seed,
            is_loop: false,
        };

        // Forward, until the chain closes or runs out of strips.
        while let Some(next) = (0..strips.len())
            .find(|&i| !used[i] && Some(&strips[i].vertices[0]) == chain.vertices.back())
        {
            used[next] = true;
            chain.vertices.push_back(strips[next].vertices[1]);
            chain.last = next;
            if chain.vertices.front() == chain.vertices.back() {
                chain.vertices.pop_back();
                chain.is_loop = true;
                break;
            }
        }

        if !chain.is_loop {
            while let Some(previous) = (0..strips.len())
                .find(|&i| !used[i] && Some(&strips[i].vertices[1]) == chain.vertices.front())
            {
                used[previous] = true;
                chain.vertices.push_front(strips[previous].vertices[0]);
                chain.first = previous;
            }
        }

        chains.push(chain);
    }

    chains
}

/// Resolves a leaf face whose twin belongs to a branch cell.
///
/// The finer strips are seen from the other cell, so each chain is reversed before it is stored
/// as a transitional segment of `face_id`. A face with nothing collected becomes a plain leaf face.
pub(crate) fn resolve_transitional_face(octree: &mut Octree, face_id: FaceId) -> Result<()> {
    let face = octree.face(face_id);
    let cell = face.cell;
    let side = face.side;
    let twin = match face.twin {
        Some(twin) if octree.face_cell(twin).state == CellState::Branch => twin,
        _ => {
            return Err(CmsError::malformed(
                cell,
                format!("transitional face on {:?} has no subdivided twin", side),
            ))
        }
    };
    let bounds = octree.cell(cell).bounds;

    let collected = collect_strips(octree, twin);
    if collected.is_empty() {
        let face = octree.face_mut(face_id);
        face.state = FaceState::Leaf;
        face.strips.clear();
        face.segments.clear();
        return Ok(());
    }

    let chains = link_chains(&collected);
    let mut strips = Vec::with_capacity(chains.len());
    let mut segments = Vec::with_capacity(chains.len());

    for chain in chains {
        let vertices: Vec<u32> = chain.vertices.into_iter().rev().collect();
        if chain.is_loop && vertices.len() < 3 {
            return Err(CmsError::malformed(
                cell,
                format!("transitional loop of {} vertices", vertices.len()),
            ));
        }

        // Reversed: the chain now starts where the last collected strip ended.
        let crossings = [
            collected[chain.last].crossings[1],
            collected[chain.first].crossings[0],
        ];
        let (start, end) = if chain.is_loop {
            (None, None)
        } else {
            (
                bounds.face_edge_of(side, crossings[0]),
                bounds.face_edge_of(side, crossings[1]),
            )
        };

        strips.push(Strip {
            edges: [start, end],
            vertices: [vertices[0], vertices[vertices.len() - 1]],
            crossings,
            is_loop: chain.is_loop,
            segment: Some(segments.len()),
        });
        segments.push(vertices);
    }

    log::trace!(
        "Transitional face {:?} of cell {:?}: {} strips in {} segments",
        side,
        cell,
        collected.len(),
        segments.len()
    );

    let face = octree.face_mut(face_id);
    face.state = FaceState::Transitional;
    face.strips = strips;
    face.segments = segments;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::EdgeKey;

    fn strip(from: u32, to: u32) -> Strip {
        Strip {
            edges: [Some(0), Some(1)],
            vertices: [from, to],
            crossings: [
                EdgeKey::new([from, 0, 0], 0),
                EdgeKey::new([to, 0, 0], 0),
            ],
            is_loop: false,
            segment: None,
        }
    }

    #[test]
    fn links_out_of_order_strips() {
        let strips = [strip(2, 3), strip(0, 1), strip(3, 4), strip(1, 2)];
        let chains = link_chains(&strips);
        assert_eq!(chains.len(), 1);
        let chain = &chains[0];
        assert_eq!(Vec::from(chain.vertices.clone()), vec![0, 1, 2, 3, 4]);
        assert!(!chain.is_loop);
        assert_eq!((chain.first, chain.last), (1, 2));
    }

    #[test]
    fn detects_closed_chains() {
        let strips = [strip(5, 6), strip(7, 5), strip(10, 11), strip(6, 7)];
        let chains = link_chains(&strips);
        assert_eq!(chains.len(), 2);
        assert!(chains[0].is_loop);
        assert_eq!(Vec::from(chains[0].vertices.clone()), vec![5, 6, 7]);
        assert!(!chains[1].is_loop);
        assert_eq!(Vec::from(chains[1].vertices.clone()), vec![10, 11]);
    }
}
