use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use leafview::paged::spread::build_slots;
use leafview::paged::{JobState, RenderResponse, RenderScheduler, SlotPosition, SpreadSlot};
use leafview::test_utils::test_helpers::{Gate, GatedBackend, SolidBackend, page_color};

const WAIT: Duration = Duration::from_secs(5);

fn gated_scheduler(honor_cancel: bool) -> (RenderScheduler, Gate, SolidBackend) {
    let gate = Gate::new();
    let solid = SolidBackend::twelve_pages();
    let backend = GatedBackend::new(solid.clone(), gate.clone(), honor_cancel);
    let scheduler = RenderScheduler::with_config(Arc::new(backend), PathBuf::from("mem"), 2, 8);
    (scheduler, gate, solid)
}

fn rendered_pages(scheduler: &RenderScheduler) -> Vec<Option<usize>> {
    scheduler
        .surfaces()
        .iter()
        .map(|surface| surface.bitmap.as_ref().map(|bitmap| bitmap.page_num))
        .collect()
}

#[test]
fn late_result_from_superseded_pass_is_never_shown() {
    let (mut scheduler, gate, solid) = gated_scheduler(false);

    let first = scheduler.render_pass(&build_slots(12, 5, true, false), 1.0);
    let mut started = gate.wait_started(2, WAIT);
    started.sort_unstable();
    assert_eq!(started, vec![5, 6]);

    let second = scheduler.render_pass(&build_slots(12, 7, true, false), 1.0);
    assert!(second > first);

    // Page 6 finishes (stale), freeing a worker for the new pass
    gate.release(6);
    gate.release(7);
    gate.release(8);
    assert!(scheduler.wait_idle(WAIT));
    assert_eq!(rendered_pages(&scheduler), vec![Some(7), Some(8)]);

    // Now the superseded page 5 completes, after the current pass did
    gate.release(5);
    let late = loop {
        let response = scheduler
            .response_receiver()
            .recv_timeout(WAIT)
            .expect("page 5 never finished");
        if matches!(response, RenderResponse::Page { page: 5, .. }) {
            break response;
        }
        scheduler.handle_response(response);
    };
    let RenderResponse::Page { generation, .. } = &late else {
        unreachable!()
    };
    assert_eq!(*generation, first);
    assert!(!scheduler.handle_response(late));

    let left = &scheduler.surfaces()[0];
    assert_eq!(left.generation(), second);
    let bitmap = left.bitmap.as_ref().unwrap();
    assert_eq!(bitmap.page_num, 7);
    assert_eq!(bitmap.pixel(0, 0), Some(page_color(7)));

    // The slow rasterizer did finish all four pages
    assert_eq!(solid.render_count(), 4);
}

#[test]
fn cooperative_backend_stops_superseded_jobs() {
    let (mut scheduler, gate, solid) = gated_scheduler(true);

    scheduler.render_pass(&build_slots(12, 1, true, false), 1.0);
    let old_jobs = scheduler.current_jobs();
    assert_eq!(old_jobs.len(), 2);
    gate.wait_started(2, WAIT);

    scheduler.render_pass(&build_slots(12, 3, true, false), 1.0);
    for id in &old_jobs {
        assert_eq!(scheduler.job_state(*id), Some(JobState::Cancelled));
    }

    gate.release(3);
    gate.release(4);
    assert!(scheduler.wait_idle(WAIT));
    assert_eq!(rendered_pages(&scheduler), vec![Some(3), Some(4)]);

    // Only the current pass produced pixels
    assert_eq!(solid.render_count(), 2);
    for id in &old_jobs {
        assert!(matches!(
            scheduler.job_state(*id),
            None | Some(JobState::Cancelled)
        ));
    }
}

#[test]
fn blank_slots_issue_no_jobs() {
    let mut scheduler = RenderScheduler::new(
        Arc::new(SolidBackend::twelve_pages()),
        PathBuf::from("mem"),
    );
    scheduler.render_pass(&build_slots(12, 1, true, true), 0.5);
    assert_eq!(scheduler.current_jobs().len(), 1);

    assert!(scheduler.wait_idle(WAIT));
    assert_eq!(rendered_pages(&scheduler), vec![None, Some(1)]);
    assert_eq!(scheduler.surfaces()[0].position, SlotPosition::Left);
}

#[test]
fn repeated_pass_is_served_from_cache() {
    let solid = SolidBackend::twelve_pages();
    let mut scheduler = RenderScheduler::new(Arc::new(solid.clone()), PathBuf::from("mem"));
    let slots = build_slots(12, 1, true, false);

    scheduler.render_pass(&slots, 0.75);
    assert!(scheduler.wait_idle(WAIT));
    scheduler.render_pass(&slots, 0.75);
    assert!(scheduler.wait_idle(WAIT));
    assert_eq!(rendered_pages(&scheduler), vec![Some(1), Some(2)]);
    assert_eq!(solid.render_count(), 2);

    // A new scale is new work
    scheduler.render_pass(&slots, 0.5);
    assert!(scheduler.wait_idle(WAIT));
    assert_eq!(solid.render_count(), 4);

    scheduler.invalidate_cache();
    scheduler.render_pass(&slots, 0.5);
    assert!(scheduler.wait_idle(WAIT));
    assert_eq!(solid.render_count(), 6);
}

#[test]
fn failed_page_shows_inline_error() {
    let mut scheduler = RenderScheduler::new(
        Arc::new(SolidBackend::twelve_pages()),
        PathBuf::from("mem"),
    );
    scheduler.render_pass(&[SpreadSlot::new(Some(13), SlotPosition::Single)], 1.0);
    assert!(scheduler.wait_idle(WAIT));

    let id = scheduler.current_jobs()[0];
    assert_eq!(scheduler.job_state(id), Some(JobState::Failed));
    let surface = &scheduler.surfaces()[0];
    assert!(!surface.is_rendered());
    assert!(surface.error.as_ref().unwrap().contains("out of range"));
}

#[test]
fn undecided_scale_issues_nothing() {
    let mut scheduler = RenderScheduler::new(
        Arc::new(SolidBackend::twelve_pages()),
        PathBuf::from("mem"),
    );
    scheduler.render_pass(&build_slots(12, 1, false, false), 0.0);
    assert!(scheduler.current_jobs().is_empty());
    assert!(!scheduler.is_rendering());
    assert_eq!(scheduler.surfaces().len(), 1);
}

#[test]
fn cancel_all_clears_surfaces() {
    let (mut scheduler, gate, _) = gated_scheduler(true);
    let first = scheduler.render_pass(&build_slots(12, 1, true, false), 1.0);
    gate.wait_started(2, WAIT);

    scheduler.cancel_all();
    assert!(scheduler.generation() > first);
    assert!(scheduler.surfaces().is_empty());
    assert!(!scheduler.is_rendering());
}
