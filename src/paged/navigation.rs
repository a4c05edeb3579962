//! Anchor normalization and page stepping

/// A navigation request from the user
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Navigation {
    Next,
    Previous,
    /// Jump to a page (1-based); any value is accepted and normalized
    Page(usize),
}

/// Map any requested page onto a valid anchor for the current layout.
///
/// Total: the result is always in `[1, page_count]`, or 1 for an empty
/// document. Idempotent for fixed layout parameters.
#[must_use]
pub fn normalize(requested: usize, page_count: usize, two_up: bool, offset_mode: bool) -> usize {
    if page_count == 0 {
        return 1;
    }

    let clamped = requested.clamp(1, page_count);
    if !two_up {
        return clamped;
    }

    let even = clamped % 2 == 0;
    if offset_mode {
        // 1 sits alone on the right; odd pages are right-hand members
        if clamped > 1 && !even {
            clamped - 1
        } else {
            clamped
        }
    } else if even {
        clamped - 1
    } else {
        clamped
    }
}

/// Pages to move per Next/Previous
#[must_use]
pub const fn step_size(two_up: bool) -> usize {
    if two_up { 2 } else { 1 }
}

/// Resolve a navigation request against the current anchor, re-normalizing
/// immediately so no intermediate invalid anchor is ever produced.
#[must_use]
pub fn resolve(
    nav: Navigation,
    anchor: usize,
    page_count: usize,
    two_up: bool,
    offset_mode: bool,
) -> usize {
    let requested = match nav {
        Navigation::Next => anchor.saturating_add(step_size(two_up)),
        Navigation::Previous => anchor.saturating_sub(step_size(two_up)),
        Navigation::Page(page) => page,
    };
    normalize(requested, page_count, two_up, offset_mode)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn offset_mode_table() {
        let n = |p| normalize(p, 10, true, true);
        assert_eq!(n(1), 1);
        assert_eq!(n(2), 2);
        assert_eq!(n(3), 2);
        assert_eq!(n(4), 4);
        assert_eq!(n(10), 10);
    }

    #[test]
    fn default_pairing_table() {
        let n = |p| normalize(p, 10, true, false);
        assert_eq!(n(1), 1);
        assert_eq!(n(2), 1);
        assert_eq!(n(3), 3);
        assert_eq!(n(4), 3);
        assert_eq!(n(10), 9);
    }

    #[test]
    fn single_mode_only_clamps() {
        assert_eq!(normalize(0, 10, false, true), 1);
        assert_eq!(normalize(4, 10, false, false), 4);
        assert_eq!(normalize(99, 10, false, false), 10);
    }

    #[test]
    fn empty_document_anchors_at_one() {
        for two_up in [false, true] {
            for offset in [false, true] {
                assert_eq!(normalize(5, 0, two_up, offset), 1);
            }
        }
    }

    #[test]
    fn always_in_range_and_idempotent() {
        for page_count in 1..=15 {
            for requested in 0..=page_count + 3 {
                for two_up in [false, true] {
                    for offset in [false, true] {
                        let once = normalize(requested, page_count, two_up, offset);
                        assert!((1..=page_count).contains(&once));
                        assert_eq!(normalize(once, page_count, two_up, offset), once);
                    }
                }
            }
        }
    }

    #[test]
    fn stepping_moves_by_spread() {
        assert_eq!(resolve(Navigation::Next, 1, 12, true, false), 3);
        assert_eq!(resolve(Navigation::Previous, 3, 12, true, false), 1);
        assert_eq!(resolve(Navigation::Next, 4, 12, false, false), 5);
    }

    #[test]
    fn stepping_past_the_end_stays_put() {
        assert_eq!(resolve(Navigation::Next, 11, 12, true, false), 11);
        assert_eq!(resolve(Navigation::Next, 12, 12, true, true), 12);
        assert_eq!(resolve(Navigation::Next, 12, 12, false, false), 12);
    }

    #[test]
    fn stepping_before_the_start_stays_put() {
        assert_eq!(resolve(Navigation::Previous, 1, 12, true, false), 1);
        assert_eq!(resolve(Navigation::Previous, 2, 12, true, true), 1);
        assert_eq!(resolve(Navigation::Previous, 1, 12, false, false), 1);
    }

    #[test]
    fn offset_mode_steps_from_opening_leaf() {
        assert_eq!(resolve(Navigation::Next, 1, 12, true, true), 2);
        assert_eq!(resolve(Navigation::Next, 2, 12, true, true), 4);
    }

    #[test]
    fn jump_is_normalized() {
        assert_eq!(resolve(Navigation::Page(8), 1, 12, true, false), 7);
        assert_eq!(resolve(Navigation::Page(0), 5, 12, true, true), 1);
    }
}
