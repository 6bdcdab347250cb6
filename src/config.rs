//! Extraction parameters and their validation.

use crate::error::{CmsError, Result};

/// Deepest octree level accepted by [`CmsConfig::validate`].
///
/// A depth of 9 means `513³` samples plus three edge slots per sample, about 2 GB in total.
/// Every level deeper multiplies that by 8.
pub const MAX_DEPTH: u32 = 9;

/// Parameters of a Cubical Marching Squares extraction.
///
/// # Example
/// ```rust
/// use cms::config::CmsConfig;
///
/// let config = CmsConfig {
///     min_depth: 2,
///     max_depth: 5,
///     ..CmsConfig::default()
/// };
/// assert!(config.validate().is_ok());
/// assert_eq!(config.samples_per_axis(), 33);
/// ```
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CmsConfig {
    /// Minimum corner of the sampled box.
    pub bounds_min: [f32; 3],
    /// Maximum corner of the sampled box.
    pub bounds_max: [f32; 3],
    /// Every cell shallower than this is split, whatever the field looks like.
    pub min_depth: u32,
    /// Finest octree level. The sample grid has `2^max_depth + 1` points per axis.
    pub max_depth: u32,
    /// Bisection iterations spent refining each edge crossing.
    pub zero_approximation: u32,
    /// A cell that contains the surface is split when `max - min` of its samples exceeds this.
    pub complexity_threshold: f32,
    /// Field value of the extracted surface. Values below it are inside.
    pub iso_level: f32,
    /// Pull fan centers of large loops back onto the surface.
    pub snap_median: bool,
}

impl Default for CmsConfig {
    fn default() -> Self {
        Self {
            bounds_min: [-1.0; 3],
            bounds_max: [1.0; 3],
            min_depth: 2,
            max_depth: 5,
            zero_approximation: 8,
            complexity_threshold: 0.5,
            iso_level: 0.0,
            snap_median: true,
        }
    }
}

impl CmsConfig {
    /// Number of grid samples along each axis.
    pub fn samples_per_axis(&self) -> usize {
        (1usize << self.max_depth) + 1
    }

    /// Distance between two neighboring samples along each axis.
    pub fn spacing(&self) -> [f32; 3] {
        let cells = (1u32 << self.max_depth) as f32;
        [
            (self.bounds_max[0] - self.bounds_min[0]) / cells,
            (self.bounds_max[1] - self.bounds_min[1]) / cells,
            (self.bounds_max[2] - self.bounds_min[2]) / cells,
        ]
    }

    /// Checks every parameter, returning the first problem found.
    pub fn validate(&self) -> Result<()> {
        for axis in 0..3 {
            let (min, max) = (self.bounds_min[axis], self.bounds_max[axis]);
            if !min.is_finite() || !max.is_finite() || min >= max {
                return Err(CmsError::InvalidBounds { axis, min, max });
            }
        }

        let depth_error = |reason| CmsError::InvalidDepth {
            min_depth: self.min_depth,
            max_depth: self.max_depth,
            reason,
        };
        if self.max_depth == 0 {
            return Err(depth_error("the grid needs at least 3 samples per axis"));
        }
        if self.max_depth > MAX_DEPTH {
            return Err(depth_error("max_depth exceeds the supported limit"));
        }
        if self.min_depth > self.max_depth {
            return Err(depth_error("min_depth is deeper than max_depth"));
        }

        if !(self.complexity_threshold >= 0.0) {
            return Err(CmsError::invalid_param(
                "complexity_threshold",
                self.complexity_threshold,
                "must be a non-negative number",
            ));
        }
        if !self.iso_level.is_finite() {
            return Err(CmsError::invalid_param(
                "iso_level",
                self.iso_level,
                "must be finite",
            ));
        }

        Ok(())
    }
}
