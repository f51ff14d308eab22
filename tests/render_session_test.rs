use std::time::{Duration, Instant};

use pdf_gallery::embed::{EmbedTrigger, HeightReporter, PAGE_GAP_PX, content_height};
use pdf_gallery::pdf::{
    MAX_SCALE, MIN_SCALE, PageSize, PageSlot, RenderSession, SessionEvent,
};
use pdf_gallery::test_utils::test_helpers::{FakeEngine, LETTER};

const TIMEOUT: Duration = Duration::from_secs(5);
const DOC: &str = "https://cdn.example.com/brochure.pdf";

fn three_pages() -> FakeEngine {
    FakeEngine::new().with_document(DOC, &[LETTER, LETTER, LETTER])
}

fn loaded_session(engine: FakeEngine) -> RenderSession {
    let mut session = RenderSession::new(engine.into_engine());
    session.load(DOC);
    session.wait_until_loaded(TIMEOUT);
    assert!(!session.is_loading(), "load did not finish in time");
    session
}

fn ready_pages(events: &[SessionEvent]) -> Vec<usize> {
    events
        .iter()
        .filter_map(|e| match e {
            SessionEvent::PageReady { page } => Some(*page),
            _ => None,
        })
        .collect()
}

/// Poll until the first page of the current pass has arrived
fn wait_for_first_page(session: &mut RenderSession) {
    let deadline = Instant::now() + TIMEOUT;
    while session.surface_count() == 0 {
        assert!(Instant::now() < deadline, "no page rendered in time");
        session.poll_events();
        std::thread::sleep(Duration::from_millis(2));
    }
}

#[test]
fn test_renders_every_page_in_order() {
    let mut session = RenderSession::new(three_pages().into_engine());
    session.load(DOC);
    assert!(session.is_loading());

    let events = session.wait_until_loaded(TIMEOUT);

    assert_eq!(events.first(), Some(&SessionEvent::DocumentInfo { page_count: 3 }));
    assert_eq!(ready_pages(&events), vec![1, 2, 3]);
    assert_eq!(
        events.last(),
        Some(&SessionEvent::Loaded {
            page_count: 3,
            rendered: 3
        })
    );

    let pages: Vec<usize> = session.surfaces().map(|(page, _)| page).collect();
    assert_eq!(pages, vec![1, 2, 3]);
    for (page, surface) in session.surfaces() {
        assert_eq!(surface.page, page);
        assert_eq!((surface.width_px, surface.height_px), (612, 792));
        assert_eq!(surface.pixels.len(), 612 * 792 * 3);
    }
}

#[test]
fn test_rescale_is_proportional() {
    let mut session = loaded_session(three_pages());

    session.set_scale(2.0);
    assert!(session.is_loading());
    session.wait_until_loaded(TIMEOUT);

    assert_eq!(session.scale(), 2.0);
    assert_eq!(session.surface_count(), 3);
    for (_, surface) in session.surfaces() {
        assert_eq!((surface.width_px, surface.height_px), (1224, 1584));
        assert_eq!(surface.scale, 2.0);
    }

    session.set_scale(1.0);
    session.zoom_in();
    session.wait_until_loaded(TIMEOUT);
    let surface = session.surface(1).expect("page 1 rendered");
    assert_eq!((surface.width_px, surface.height_px), (765, 990));
}

#[test]
fn test_rescale_keeps_document() {
    let engine = three_pages();
    let recorder = engine.clone();
    let mut session = loaded_session(engine);

    session.zoom_out();
    session.wait_until_loaded(TIMEOUT);
    assert_eq!(recorder.fetches().len(), 1);

    session.reload();
    session.wait_until_loaded(TIMEOUT);
    assert_eq!(recorder.fetches().len(), 2);
}

#[test]
fn test_scale_is_clamped() {
    let mut session = RenderSession::new(three_pages().into_engine());
    session.load_with_scale(DOC, 10.0);
    assert_eq!(session.scale(), MAX_SCALE);
    session.wait_until_loaded(TIMEOUT);

    session.set_scale(0.01);
    assert_eq!(session.scale(), MIN_SCALE);
    session.wait_until_loaded(TIMEOUT);

    let surface = session.surface(1).expect("page 1 rendered");
    assert_eq!((surface.width_px, surface.height_px), (306, 396));
}

#[test]
fn test_unchanged_scale_starts_no_pass() {
    let mut session = loaded_session(three_pages());
    session.set_scale(1.0);
    assert!(!session.is_loading());
}

#[test]
fn test_newer_load_supersedes_slow_one() {
    let slow = "https://cdn.example.com/slow.pdf";
    let fast = "https://cdn.example.com/fast.pdf";
    let small = PageSize::new(100.0, 200.0);
    let engine = FakeEngine::new()
        .with_document(slow, &[LETTER, LETTER, LETTER, LETTER])
        .with_fetch_delay(slow, Duration::from_millis(200))
        .with_document(fast, &[small, small]);

    let mut session = RenderSession::new(engine.into_engine());
    session.load(slow);
    session.load(fast);
    let events = session.wait_until_loaded(TIMEOUT);

    assert_eq!(session.url(), Some(fast));
    assert_eq!(session.page_count(), 2);
    assert_eq!(session.surface_count(), 2);
    for (_, surface) in session.surfaces() {
        assert_eq!((surface.width_px, surface.height_px), (100, 200));
    }
    assert!(
        !events.contains(&SessionEvent::DocumentInfo { page_count: 4 }),
        "stale document leaked into the session"
    );
}

#[test]
fn test_failing_page_does_not_stop_the_pass() {
    let engine = three_pages().with_failing_page(DOC, 2);
    let mut session = RenderSession::new(engine.into_engine());
    session.load(DOC);
    let events = session.wait_until_loaded(TIMEOUT);

    assert!(events.contains(&SessionEvent::PageFailed { page: 2 }));
    assert_eq!(session.page_slot(1), PageSlot::Ready);
    assert_eq!(session.page_slot(2), PageSlot::Failed);
    assert_eq!(session.page_slot(3), PageSlot::Ready);
    assert_eq!(
        events.last(),
        Some(&SessionEvent::Loaded {
            page_count: 3,
            rendered: 2
        })
    );
}

#[test]
fn test_unknown_document_reports_load_failure() {
    let mut session = RenderSession::new(three_pages().into_engine());
    session.load("https://cdn.example.com/missing.pdf");
    let events = session.wait_until_loaded(TIMEOUT);

    assert!(
        events
            .iter()
            .any(|e| matches!(e, SessionEvent::LoadFailed { .. }))
    );
    assert!(!session.is_loading());
    assert_eq!(session.page_count(), 0);
    assert_eq!(session.surface_count(), 0);
}

#[test]
fn test_loading_new_document_clears_old_surfaces() {
    let other = "https://cdn.example.com/other.pdf";
    let engine = three_pages().with_document(other, &[LETTER]);
    let mut session = RenderSession::new(engine.into_engine());

    session.load(DOC);
    session.wait_until_loaded(TIMEOUT);
    assert_eq!(session.surface_count(), 3);

    session.load(other);
    assert_eq!(session.surface_count(), 0);
    assert_eq!(session.page_slot(1), PageSlot::Pending);
    session.wait_until_loaded(TIMEOUT);
    assert_eq!(session.surface_count(), 1);
}

#[test]
fn test_embed_height_follows_rendered_pages() {
    let mut session = RenderSession::new(three_pages().into_engine());
    let mut reporter = HeightReporter::new();

    session.load(DOC);
    session.wait_until_loaded(TIMEOUT);

    let expected = 3 * 792 + 2 * PAGE_GAP_PX;
    assert_eq!(content_height(&session), expected);

    let msg = reporter
        .report_session(EmbedTrigger::Load, &session)
        .expect("load always reports");
    assert_eq!(msg.height, expected);
    assert!(reporter.report_session(EmbedTrigger::Resize, &session).is_none());

    session.set_scale(2.0);
    session.wait_until_loaded(TIMEOUT);
    let msg = reporter
        .report_session(EmbedTrigger::Layout, &session)
        .expect("height changed");
    assert_eq!(msg.height, 3 * 1584 + 2 * PAGE_GAP_PX);
}

#[test]
fn test_rescale_during_pass_leaves_no_old_scale_surface() {
    let engine = FakeEngine::new()
        .with_document(DOC, &[LETTER, LETTER, LETTER, LETTER])
        .with_render_delay(DOC, Duration::from_millis(40));
    let recorder = engine.clone();
    let mut session = RenderSession::new(engine.into_engine());

    session.load(DOC);
    wait_for_first_page(&mut session);
    assert!(session.is_loading());

    session.set_scale(2.0);
    let events = session.wait_until_loaded(TIMEOUT);

    assert_eq!(ready_pages(&events), vec![1, 2, 3, 4]);
    assert_eq!(session.surface_count(), 4);
    for (_, surface) in session.surfaces() {
        assert_eq!(surface.scale, 2.0);
        assert_eq!((surface.width_px, surface.height_px), (1224, 1584));
    }

    // the 1.0 pass stopped early instead of rendering all four pages
    let old_pass = recorder
        .renders()
        .iter()
        .filter(|(_, scale)| *scale == 1.0)
        .count();
    assert!(old_pass < 4, "stale pass rendered {old_pass} pages");
}

#[test]
fn test_new_document_during_pass_leaves_no_old_surface() {
    let other = "https://cdn.example.com/leaflet.pdf";
    let small = PageSize::new(100.0, 200.0);
    let engine = FakeEngine::new()
        .with_document(DOC, &[LETTER, LETTER, LETTER, LETTER])
        .with_render_delay(DOC, Duration::from_millis(40))
        .with_document(other, &[small, small]);
    let mut session = RenderSession::new(engine.into_engine());

    session.load(DOC);
    wait_for_first_page(&mut session);

    session.load(other);
    let events = session.wait_until_loaded(TIMEOUT);

    assert_eq!(ready_pages(&events), vec![1, 2]);
    assert!(!events.contains(&SessionEvent::DocumentInfo { page_count: 4 }));
    assert_eq!(session.page_count(), 2);
    assert_eq!(session.surface_count(), 2);
    for (_, surface) in session.surfaces() {
        assert_eq!((surface.width_px, surface.height_px), (100, 200));
    }

    // nothing from the old document trickles in afterwards
    std::thread::sleep(Duration::from_millis(100));
    assert!(ready_pages(&session.poll_events()).is_empty());
    assert_eq!(session.surface_count(), 2);
}
