//! Error types for mesh extraction.

use thiserror::Error;

use crate::grid::EdgeKey;
use crate::octree::CellId;

/// Result type alias using [`CmsError`].
pub type Result<T> = std::result::Result<T, CmsError>;

/// Errors that can occur while configuring or running an extraction.
///
/// The first three variants are configuration errors and are always reported before the field is
/// sampled. The last two signal a broken internal invariant; callers may retry with a shallower
/// `max_depth` or a looser complexity threshold.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CmsError {
    /// The bounding box is empty or not finite along one axis.
    #[error("invalid bounding box on axis {axis}: [{min}, {max}]")]
    InvalidBounds {
        /// Axis index (0 = x, 1 = y, 2 = z).
        axis: usize,
        /// Lower bound given.
        min: f32,
        /// Upper bound given.
        max: f32,
    },

    /// The depth limits cannot produce a valid octree.
    #[error("invalid octree depth (min {min_depth}, max {max_depth}): {reason}")]
    InvalidDepth {
        /// Requested minimum depth.
        min_depth: u32,
        /// Requested maximum depth.
        max_depth: u32,
        /// Why the combination was rejected.
        reason: &'static str,
    },

    /// A scalar parameter is out of range.
    #[error("invalid parameter: {name} = {value} ({reason})")]
    InvalidParameter {
        /// Parameter name.
        name: &'static str,
        /// The rejected value, formatted.
        value: String,
        /// Why the value was rejected.
        reason: &'static str,
    },

    /// Strips inside a cell do not link up into closed loops.
    #[error("malformed topology in cell {cell:?}: {details}")]
    MalformedTopology {
        /// The leaf cell being traced.
        cell: CellId,
        /// Description of the failure.
        details: String,
    },

    /// A face edge changes sign between its corners but no grid edge along it does.
    #[error("no crossing found along grid edge {edge:?}")]
    UnresolvedCrossing {
        /// The face edge's first grid edge.
        edge: EdgeKey,
    },
}

impl CmsError {
    /// Create an invalid parameter error.
    pub fn invalid_param<T: std::fmt::Display>(
        name: &'static str,
        value: T,
        reason: &'static str,
    ) -> Self {
        CmsError::InvalidParameter {
            name,
            value: value.to_string(),
            reason,
        }
    }

    pub(crate) fn malformed(cell: CellId, details: impl Into<String>) -> Self {
        CmsError::MalformedTopology {
            cell,
            details: details.into(),
        }
    }
}
