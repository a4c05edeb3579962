use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use leafview::paged::Navigation;
use leafview::test_utils::test_helpers::SolidBackend;
use leafview::{ViewerConfig, ViewerController};

const WAIT: Duration = Duration::from_secs(5);

fn open_twelve(width: f32, offset_mode: bool) -> ViewerController {
    let mut viewer = ViewerController::new(ViewerConfig {
        container_width: width,
        offset_mode,
        ..ViewerConfig::default()
    });
    viewer
        .load_paged_with(Path::new("twelve.pdf"), Arc::new(SolidBackend::twelve_pages()))
        .unwrap();
    viewer
}

fn visible(viewer: &ViewerController) -> Vec<Option<usize>> {
    viewer.current_slots().iter().map(|slot| slot.page).collect()
}

#[test]
fn walking_a_twelve_page_document_by_spreads() {
    let mut viewer = open_twelve(1000.0, false);
    assert_eq!(visible(&viewer), vec![Some(1), Some(2)]);

    let mut anchors = vec![viewer.anchor()];
    for _ in 0..7 {
        viewer.navigate(Navigation::Next);
        anchors.push(viewer.anchor());
    }
    assert_eq!(anchors, vec![1, 3, 5, 7, 9, 11, 11, 11]);
    assert_eq!(visible(&viewer), vec![Some(11), Some(12)]);
    assert_eq!(viewer.page_range_label(), "Showing 11-12");

    assert!(viewer.wait_idle(WAIT));
    let pages: Vec<_> = viewer
        .surfaces()
        .iter()
        .map(|surface| surface.bitmap.as_ref().map(|bitmap| bitmap.page_num))
        .collect();
    assert_eq!(pages, vec![Some(11), Some(12)]);

    for _ in 0..10 {
        viewer.navigate(Navigation::Previous);
    }
    assert_eq!(viewer.anchor(), 1);
}

#[test]
fn offset_mode_walk() {
    let mut viewer = open_twelve(1000.0, true);
    assert_eq!(visible(&viewer), vec![None, Some(1)]);

    let mut spreads = Vec::new();
    for _ in 0..7 {
        viewer.navigate(Navigation::Next);
        spreads.push(visible(&viewer));
    }
    assert_eq!(spreads[0], vec![Some(2), Some(3)]);
    assert_eq!(spreads[4], vec![Some(10), Some(11)]);
    // 12 sits alone on the left with a trailing blank
    assert_eq!(spreads[5], vec![Some(12), None]);
    assert_eq!(spreads[6], vec![Some(12), None]);
    assert_eq!(viewer.page_range_label(), "Showing 12");
}

#[test]
fn jumping_lands_on_spread_anchors() {
    let mut viewer = open_twelve(1000.0, false);
    for (requested, anchor) in [(8, 7), (7, 7), (12, 11), (0, 1), (99, 11)] {
        viewer.navigate(Navigation::Page(requested));
        assert_eq!(viewer.anchor(), anchor, "jump to {requested}");
    }
}

#[test]
fn resize_across_threshold_keeps_anchor_valid() {
    let mut viewer = open_twelve(700.0, false);
    assert!(!viewer.decision().two_up);
    viewer.navigate(Navigation::Page(6));
    assert_eq!(visible(&viewer), vec![Some(6)]);

    // Widening pairs 6 with its odd partner
    viewer.notify_viewport_resize(1000.0);
    assert!(viewer.decision().two_up);
    assert_eq!(visible(&viewer), vec![Some(5), Some(6)]);

    viewer.set_offset_mode(true);
    assert_eq!(visible(&viewer), vec![Some(4), Some(5)]);

    viewer.notify_viewport_resize(700.0);
    assert_eq!(visible(&viewer), vec![Some(4)]);
    assert!(viewer.wait_idle(WAIT));
    assert_eq!(viewer.surfaces().len(), 1);
}

#[test]
fn scale_follows_viewport() {
    let viewer = open_twelve(1024.0, false);
    let decision = viewer.decision();
    assert!(decision.two_up);
    assert!((decision.scale - 500.0 / 600.0).abs() < 1e-4);

    let viewer = open_twelve(600.0, false);
    let decision = viewer.decision();
    assert!(!decision.two_up);
    assert!((decision.scale - 1.0).abs() < 1e-4);
}
