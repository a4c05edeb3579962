//! View state management
//!
//! Only primitive inputs are stored here. The geometry decision and the slot
//! list are recomputed from them on every read, so a caller can never
//! observe a derived value that lags behind its inputs.

use super::geometry::{GeometryDecision, GeometryModel, Viewport};
use super::navigation::{self, Navigation};
use super::spread::{self, SpreadSlot};
use super::types::PageSize;

#[derive(Clone, Debug)]
pub struct ViewState {
    pub viewport: Viewport,
    pub geometry: GeometryModel,

    /// Total page count of the loaded document
    pub page_count: usize,

    /// First-page size, captured once per document
    pub page_size: Option<PageSize>,

    /// Left-most (or sole) visible page, 1-based
    pub anchor: usize,

    pub offset_mode: bool,
}

impl ViewState {
    #[must_use]
    pub fn new(container_width: f32, geometry: GeometryModel, offset_mode: bool) -> Self {
        Self {
            viewport: Viewport::new(container_width),
            geometry,
            page_count: 0,
            page_size: None,
            anchor: 1,
            offset_mode,
        }
    }

    #[must_use]
    pub fn decision(&self) -> GeometryDecision {
        self.geometry.decide(self.viewport, self.page_size)
    }

    #[must_use]
    pub fn slots(&self) -> Vec<SpreadSlot> {
        spread::build_slots(
            self.page_count,
            self.anchor,
            self.decision().two_up,
            self.offset_mode,
        )
    }

    fn normalized(&self, requested: usize) -> usize {
        navigation::normalize(
            requested,
            self.page_count,
            self.decision().two_up,
            self.offset_mode,
        )
    }

    /// Apply a command and return resulting effects
    #[must_use]
    pub fn apply(&mut self, cmd: Command) -> Vec<Effect> {
        match cmd {
            Command::SetContainerWidth(width) => {
                let width = width.max(0.0);
                if (self.viewport.container_width - width).abs() <= f32::EPSILON {
                    return vec![];
                }
                self.viewport.container_width = width;
                // Re-anchor regardless of which way two-up flipped
                self.anchor = self.normalized(self.anchor);
                if self.page_count == 0 {
                    vec![]
                } else {
                    vec![Effect::RenderPass]
                }
            }

            Command::Navigate(nav) => {
                let decision = self.decision();
                let target = navigation::resolve(
                    nav,
                    self.anchor,
                    self.page_count,
                    decision.two_up,
                    self.offset_mode,
                );
                if target == self.anchor || self.page_count == 0 {
                    vec![]
                } else {
                    self.anchor = target;
                    vec![Effect::RenderPass]
                }
            }

            Command::SetOffsetMode(enabled) => {
                if self.offset_mode == enabled {
                    return vec![];
                }
                self.offset_mode = enabled;
                self.anchor = self.normalized(self.anchor);
                if self.decision().two_up && self.page_count > 0 {
                    vec![Effect::RenderPass]
                } else {
                    vec![]
                }
            }

            Command::SetDocument {
                page_count,
                page_size,
            } => {
                self.page_count = page_count;
                self.page_size = page_size;
                self.anchor = self.normalized(1);
                if page_count == 0 {
                    vec![Effect::CancelRendering]
                } else {
                    vec![Effect::RenderPass]
                }
            }

            Command::ClearDocument => {
                self.page_count = 0;
                self.page_size = None;
                self.anchor = 1;
                vec![Effect::CancelRendering]
            }
        }
    }
}

/// Commands that modify view state
#[derive(Clone, Debug, PartialEq)]
pub enum Command {
    /// Viewport resize notification
    SetContainerWidth(f32),
    Navigate(Navigation),
    SetOffsetMode(bool),
    /// A new paged document replaced the previous one
    SetDocument {
        page_count: usize,
        page_size: Option<PageSize>,
    },
    ClearDocument,
}

/// Effects produced by state changes
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Effect {
    /// Start a new render pass for the current slots, superseding any
    /// outstanding one
    RenderPass,
    /// Supersede outstanding work without starting a new pass
    CancelRendering,
}
