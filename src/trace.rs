//! Linking a leaf cell's strips into closed boundary loops.

use std::collections::VecDeque;

use crate::error::{CmsError, Result};
use crate::octree::{CellId, Octree};

/// A strip as seen by the tracer: the vertex path it contributes to a loop.
struct Link<'a> {
    path: &'a [u32],
    is_loop: bool,
}

impl Link<'_> {
    fn first(&self) -> u32 {
        self.path[0]
    }

    fn last(&self) -> u32 {
        self.path[self.path.len() - 1]
    }
}

/// Traces the components of a leaf cell from the strips on its six faces.
///
/// Strips standing for a transitional segment contribute the whole segment. Every strip is used
/// exactly once; a cell may host several disjoint components.
pub(crate) fn trace_components(octree: &Octree, cell_id: CellId) -> Result<Vec<Vec<u32>>> {
    let cell = octree.cell(cell_id);
    let links: Vec<Link> = cell
        .faces
        .iter()
        .map(|&face_id| octree.face(face_id))
        .flat_map(|face| {
            face.strips.iter().map(move |strip| Link {
                path: match strip.segment {
                    Some(segment) => &face.segments[segment][..],
                    None => &strip.vertices[..],
                },
                is_loop: strip.is_loop,
            })
        })
        .collect();

    let mut used = vec![false; links.len()];
    let mut components = Vec::new();

    for seed in 0..links.len() {
        if used[seed] {
            continue;
        }
        used[seed] = true;

        if links[seed].is_loop {
            let component = links[seed].path.to_vec();
            if component.len() < 3 {
                return Err(CmsError::malformed(cell_id, "degenerate transitional loop"));
            }
            components.push(component);
            continue;
        }

        let mut component: VecDeque<u32> = links[seed].path.iter().copied().collect();
        loop {
            let (front, back) = (component[0], component[component.len() - 1]);
            if component.len() > 1 && front == back {
                component.pop_back();
                break;
            }

            let free = |i: usize| !used[i] && !links[i].is_loop;
            let next = (0..links.len()).find(|&i| free(i) && links[i].first() == back);
            if let Some(next) = next {
                used[next] = true;
                component.extend(links[next].path[1..].iter().copied());
                continue;
            }

            let previous = (0..links.len()).find(|&i| free(i) && links[i].last() == front);
            match previous {
                Some(previous) => {
                    used[previous] = true;
                    let path = links[previous].path;
                    for &vertex in path[..path.len() - 1].iter().rev() {
                        component.push_front(vertex);
                    }
                }
                None => {
                    return Err(CmsError::malformed(
                        cell_id,
                        format!(
                            "boundary loop through vertices {} .. {} does not close",
                            front, back
                        ),
                    ))
                }
            }
        }

        if component.len() < 3 {
            return Err(CmsError::malformed(
                cell_id,
                format!("component of {} vertices", component.len()),
            ));
        }
        components.push(component.into());
    }

    Ok(components)
}
