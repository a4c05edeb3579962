//! Spread layout: which pages go into which slots

use std::fmt;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SlotPosition {
    Single,
    Left,
    Right,
}

impl SlotPosition {
    pub fn as_str(&self) -> &'static str {
        match self {
            SlotPosition::Single => "single",
            SlotPosition::Left => "left",
            SlotPosition::Right => "right",
        }
    }
}

/// One place on screen. `page == None` is an intentional blank, which only
/// ever appears at the start (offset mode, page 1) or at the end (odd tail).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SpreadSlot {
    pub page: Option<usize>,
    pub position: SlotPosition,
}

impl SpreadSlot {
    #[must_use]
    pub const fn new(page: Option<usize>, position: SlotPosition) -> Self {
        Self { page, position }
    }

    #[must_use]
    pub const fn is_blank(&self) -> bool {
        self.page.is_none()
    }
}

impl fmt::Display for SpreadSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.page {
            Some(page) => write!(f, "{}:{page}", self.position.as_str()),
            None => write!(f, "{}:blank", self.position.as_str()),
        }
    }
}

/// Project a normalized anchor onto slots.
///
/// The anchor is trusted as-is; pairing rules live in the normalizer.
#[must_use]
pub fn build_slots(
    page_count: usize,
    anchor: usize,
    two_up: bool,
    offset_mode: bool,
) -> Vec<SpreadSlot> {
    if page_count == 0 {
        return Vec::new();
    }

    if !two_up {
        return vec![SpreadSlot::new(Some(anchor), SlotPosition::Single)];
    }

    if offset_mode && anchor == 1 {
        return vec![
            SpreadSlot::new(None, SlotPosition::Left),
            SpreadSlot::new(Some(1), SlotPosition::Right),
        ];
    }

    let right = Some(anchor + 1).filter(|page| *page <= page_count);
    vec![
        SpreadSlot::new(Some(anchor), SlotPosition::Left),
        SpreadSlot::new(right, SlotPosition::Right),
    ]
}

/// "Showing N" or "Showing N-M" over the visible, non-blank pages
#[must_use]
pub fn page_range_label(slots: &[SpreadSlot]) -> String {
    let mut pages = slots.iter().filter_map(|slot| slot.page);
    let Some(first) = pages.next() else {
        return String::new();
    };
    match pages.last() {
        Some(last) if last != first => format!("Showing {first}-{last}"),
        _ => format!("Showing {first}"),
    }
}
