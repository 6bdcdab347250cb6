#![allow(dead_code)]

use cms::CmsConfig;

/// Unit sphere centered at the origin.
pub fn sphere(x: f32, y: f32, z: f32) -> f32 {
    x * x + y * y + z * z - 1.
}

/// Same zero set as [`sphere`], but four times steeper in the positive octant, so only that
/// octant is refined past the minimum depth.
pub fn skewed_sphere(x: f32, y: f32, z: f32) -> f32 {
    let weight = if x > 0. && y > 0. && z > 0. { 4. } else { 1. };
    sphere(x, y, z) * weight
}

pub fn uniform(depth: u32) -> CmsConfig {
    CmsConfig {
        min_depth: depth,
        max_depth: depth,
        ..CmsConfig::default()
    }
}

pub fn mixed() -> CmsConfig {
    CmsConfig {
        min_depth: 2,
        max_depth: 5,
        complexity_threshold: 2.5,
        ..CmsConfig::default()
    }
}
