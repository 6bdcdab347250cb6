//! Triangulation of boundary loops.

use cgmath::{EuclideanSpace, InnerSpace, Point3, Vector3};

use crate::field::{gradient, safe_normalize, ScalarField};
use crate::mesh::Vertex;

/// Fans loops around a median vertex, appending medians to the shared vertex buffer.
pub(crate) struct Tessellator<'a, F: ScalarField + ?Sized> {
    pub field: &'a F,
    pub vertices: &'a mut Vec<Vertex>,
    pub indices: &'a mut Vec<u32>,
    pub iso_level: f32,
    pub snap_median: bool,
    /// Per-axis finite difference step.
    pub step: Vector3<f32>,
}

impl<'a, F: ScalarField + ?Sized> Tessellator<'a, F> {
    /// Emits the triangles of one component, keeping its winding.
    pub fn tessellate(&mut self, component: &[u32]) {
        debug_assert!(component.len() >= 3);
        if component.len() == 3 {
            self.indices.extend_from_slice(component);
            return;
        }

        let median = self.push_median(component);
        for (i, &vertex) in component.iter().enumerate() {
            let next = component[(i + 1) % component.len()];
            self.indices.extend_from_slice(&[median, vertex, next]);
        }
    }

    fn push_median(&mut self, component: &[u32]) -> u32 {
        let points: Vec<Point3<f32>> = component
            .iter()
            .map(|&i| self.vertices[i as usize].position)
            .collect();
        let mut position = Point3::centroid(&points);

        let mut grad = gradient(self.field, position, self.step);
        if self.snap_median {
            let len2 = grad.magnitude2();
            if len2 > 1e-12 && len2.is_finite() {
                let value = self.field.evaluate_at(position);
                position -= grad * ((value - self.iso_level) / len2);
                grad = gradient(self.field, position, self.step);
            }
        }

        let mut normal = safe_normalize(grad);
        if normal == Vector3::new(0., 0., 0.) {
            normal = safe_normalize(
                component
                    .iter()
                    .map(|&i| self.vertices[i as usize].normal)
                    .sum(),
            );
        }

        let index = self.vertices.len() as u32;
        self.vertices.push(Vertex { position, normal });
        index
    }
}
