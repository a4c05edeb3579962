//! Two-up eligibility and render scale
//!
//! Everything here is a pure function of the viewport width and the
//! intrinsic size of the first page.

use super::types::PageSize;

/// Gutter between the two pages of a spread, in viewport units
pub const DEFAULT_GAP: f32 = 24.0;

/// Below this per-page scale two pages side by side are no longer legible,
/// so the layout falls back to a single page
pub const DEFAULT_MIN_TWO_UP_SCALE: f32 = 0.68;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Viewport {
    pub container_width: f32,
}

impl Viewport {
    #[must_use]
    pub const fn new(container_width: f32) -> Self {
        Self { container_width }
    }
}

/// Derived layout decision; never stored
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct GeometryDecision {
    pub two_up: bool,
    pub scale: f32,
}

impl GeometryDecision {
    /// Nothing can be laid out yet
    pub const UNDECIDED: Self = Self {
        two_up: false,
        scale: 0.0,
    };
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct GeometryModel {
    pub gap: f32,
    pub min_two_up_scale: f32,
}

impl Default for GeometryModel {
    fn default() -> Self {
        Self {
            gap: DEFAULT_GAP,
            min_two_up_scale: DEFAULT_MIN_TWO_UP_SCALE,
        }
    }
}

impl GeometryModel {
    #[must_use]
    pub const fn new(gap: f32, min_two_up_scale: f32) -> Self {
        Self {
            gap,
            min_two_up_scale,
        }
    }

    /// Column width each page would get in a spread
    #[must_use]
    pub fn two_up_column_width(&self, container_width: f32) -> f32 {
        ((container_width - self.gap) / 2.0).max(0.0)
    }

    /// Decide between single-page and spread layout.
    ///
    /// Total over non-negative inputs: an unknown page size or a zero-width
    /// container yields [`GeometryDecision::UNDECIDED`].
    #[must_use]
    pub fn decide(&self, viewport: Viewport, page: Option<PageSize>) -> GeometryDecision {
        let Some(page) = page.filter(|p| p.width > 0.0 && p.width.is_finite()) else {
            return GeometryDecision::UNDECIDED;
        };
        let container_width = viewport.container_width;
        if !(container_width > 0.0) {
            return GeometryDecision::UNDECIDED;
        }

        let column = self.two_up_column_width(container_width);
        let two_up = column / page.width >= self.min_two_up_scale;
        let target = if two_up { column } else { container_width };

        GeometryDecision {
            two_up,
            scale: target / page.width,
        }
    }
}
