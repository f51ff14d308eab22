use std::time::Duration;

use pdf_gallery::pdf::{PageBox, Point, PointerKind, RenderSession, SessionConfig, SessionEvent};
use pdf_gallery::test_utils::test_helpers::{FakeEngine, LETTER};

const TIMEOUT: Duration = Duration::from_secs(5);
const DOC: &str = "https://cdn.example.com/catalogue.pdf";
const EPS: f32 = 1e-3;

fn loaded_session() -> RenderSession {
    let engine = FakeEngine::new().with_document(DOC, &[LETTER, LETTER, LETTER]);
    let mut session = RenderSession::new(engine.into_engine());
    session.load(DOC);
    session.wait_until_loaded(TIMEOUT);
    assert_eq!(session.surface_count(), 3);
    session
}

fn page_box(session: &RenderSession, page: usize) -> PageBox {
    PageBox::from_surface(session.surface(page).expect("page rendered"))
}

#[test]
fn test_click_zoom_pan_release() {
    let mut session = loaded_session();
    let page = page_box(&session, 2);
    let click = Point::new(page.width * 0.5, page.height * 0.5);

    assert!(session.pointer_down(2, page, click, PointerKind::Mouse));
    assert!(session.overlay().is_zooming());
    assert_eq!(session.overlay().active_page(), Some(2));

    let events = session.wait_for_overlay(TIMEOUT);
    assert!(events.contains(&SessionEvent::OverlayReady { page: 2 }));

    let overlay = session
        .overlay()
        .gesture()
        .and_then(|g| g.surface())
        .expect("overlay raster")
        .clone();
    assert_eq!((overlay.width_px, overlay.height_px), (1836, 2376));

    let before = session.overlay_placement(page).expect("overlay visible");
    assert!((before.width - 1836.0).abs() < EPS);
    assert!((before.height - 2376.0).abs() < EPS);
    assert!((before.left - -612.0).abs() < EPS);
    assert!((before.top - -792.0).abs() < EPS);

    // the clicked point sits under the pointer on the overlay too
    let under_pointer_x = before.left + 0.5 * before.width;
    let under_pointer_y = before.top + 0.5 * before.height;
    assert!((under_pointer_x - click.x).abs() < EPS);
    assert!((under_pointer_y - click.y).abs() < EPS);

    session.pointer_move(Point::new(click.x + 20.0, click.y + 5.0));
    session.pointer_move(Point::new(click.x + 50.0, click.y + 20.0));
    let after = session.overlay_placement(page).expect("still visible");
    assert!((after.left - before.left - 50.0).abs() < EPS);
    assert!((after.top - before.top - 20.0).abs() < EPS);
    assert!((after.width - before.width).abs() < EPS);

    session.pointer_up();
    assert!(!session.overlay().is_zooming());
    assert!(session.overlay_placement(page).is_none());
}

#[test]
fn test_overlay_hidden_until_raster_arrives() {
    let mut session = loaded_session();
    let page = page_box(&session, 1);

    assert!(session.pointer_down(1, page, Point::new(10.0, 10.0), PointerKind::Pen));
    // nothing has been polled yet, so the raster cannot be attached
    assert!(session.overlay_placement(page).is_none());

    session.wait_for_overlay(TIMEOUT);
    assert!(session.overlay_placement(page).is_some());
}

#[test]
fn test_touch_does_not_zoom() {
    let mut session = loaded_session();
    let page = page_box(&session, 1);

    assert!(!session.pointer_down(1, page, Point::new(10.0, 10.0), PointerKind::Touch));
    assert!(!session.overlay().is_zooming());
}

#[test]
fn test_unrendered_page_does_not_zoom() {
    let mut session = loaded_session();
    let page = page_box(&session, 1);

    assert!(!session.pointer_down(9, page, Point::new(10.0, 10.0), PointerKind::Mouse));
    assert!(!session.overlay().is_zooming());
}

#[test]
fn test_release_before_raster_drops_it() {
    let mut session = loaded_session();
    let page = page_box(&session, 3);

    assert!(session.pointer_down(3, page, Point::new(100.0, 100.0), PointerKind::Mouse));
    session.pointer_up();

    std::thread::sleep(Duration::from_millis(100));
    let events = session.poll_events();
    assert!(!events.iter().any(|e| matches!(e, SessionEvent::OverlayReady { .. })));
    assert!(!session.overlay().is_zooming());
}

#[test]
fn test_magnification_is_independent_of_base_scale() {
    let engine = FakeEngine::new().with_document(DOC, &[LETTER]);
    let config = SessionConfig {
        base_scale: 2.0,
        ..SessionConfig::default()
    };
    let mut session = RenderSession::with_config(engine.into_engine(), config);
    session.load(DOC);
    session.wait_until_loaded(TIMEOUT);

    let page = page_box(&session, 1);
    assert_eq!((page.width, page.height), (1224.0, 1584.0));

    assert!(session.pointer_down(1, page, Point::new(0.0, 0.0), PointerKind::Mouse));
    session.wait_for_overlay(TIMEOUT);

    let placement = session.overlay_placement(page).expect("visible");
    // 3x magnification over a 2x base surface
    assert!((placement.width - 1836.0).abs() < EPS);
    assert!(placement.left.abs() < EPS);
    assert!(placement.top.abs() < EPS);
}

#[test]
fn test_second_gesture_reuses_cached_raster() {
    let mut session = loaded_session();
    let page = page_box(&session, 2);

    assert!(session.pointer_down(2, page, Point::new(50.0, 50.0), PointerKind::Mouse));
    session.wait_for_overlay(TIMEOUT);
    let first = session
        .overlay()
        .gesture()
        .and_then(|g| g.surface())
        .expect("first raster")
        .clone();
    session.pointer_up();

    assert!(session.pointer_down(2, page, Point::new(300.0, 300.0), PointerKind::Mouse));
    session.wait_for_overlay(TIMEOUT);
    let second = session
        .overlay()
        .gesture()
        .and_then(|g| g.surface())
        .expect("second raster")
        .clone();

    assert!(std::sync::Arc::ptr_eq(&first, &second));
}

#[test]
fn test_overlay_matches_displayed_page_during_rescale() {
    let mut session = loaded_session();
    let page = page_box(&session, 1);

    assert!(session.pointer_down(1, page, Point::new(300.0, 400.0), PointerKind::Mouse));
    session.wait_for_overlay(TIMEOUT);
    let raster_width = session
        .overlay()
        .gesture()
        .and_then(|g| g.surface())
        .expect("overlay raster")
        .width_px as f32;

    // the 1.0 surface stays on screen until the 2.0 pass replaces it
    session.set_scale(2.0);
    let displayed = page_box(&session, 1);
    assert_eq!(displayed.width, 612.0);
    let placement = session.overlay_placement(displayed).expect("visible");
    assert!((placement.width - raster_width).abs() < EPS);

    session.wait_until_loaded(TIMEOUT);
    let displayed = page_box(&session, 1);
    assert_eq!(displayed.width, 1224.0);
    let placement = session.overlay_placement(displayed).expect("still visible");
    assert!((placement.width - raster_width).abs() < EPS);
}

#[test]
fn test_zero_scale_config_still_places_overlay() {
    let engine = FakeEngine::new().with_document(DOC, &[LETTER]);
    let config = SessionConfig {
        min_scale: 0.0,
        magnification: 0.0,
        ..SessionConfig::default()
    };
    let mut session = RenderSession::with_config(engine.into_engine(), config);
    session.load_with_scale(DOC, 0.0);
    assert!(session.scale() > 0.0);
    session.wait_until_loaded(TIMEOUT);

    let page = page_box(&session, 1);
    assert!(session.pointer_down(1, page, Point::new(10.0, 10.0), PointerKind::Mouse));
    session.wait_for_overlay(TIMEOUT);

    let raster_width = session
        .overlay()
        .gesture()
        .and_then(|g| g.surface())
        .expect("overlay raster")
        .width_px as f32;
    let placement = session.overlay_placement(page).expect("visible");
    assert!(placement.left.is_finite() && placement.top.is_finite());
    assert!((placement.width - raster_width).abs() < EPS);
}
