//! Render session - owns the worker, the rendered surfaces and the zoom overlay

use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use flume::{Receiver, RecvTimeoutError, Sender};
use log::{debug, info, warn};

use super::cache::OverlayCache;
use super::cancel::{PassId, PassTracker};
use super::engine::RenderEngine;
use super::overlay::{OverlayPlacement, ZoomOverlay};
use super::request::{GestureId, RenderRequest, RenderResponse};
use super::state::{Command, Effect, SessionState};
use super::types::{PageBox, PageSlot, Point, PointerKind, Surface};
use super::worker::render_worker;
use super::zoom::Zoom;
use super::{
    DEFAULT_BASE_SCALE, DEFAULT_OVERLAY_CACHE_SIZE, MAX_SCALE, MIN_SCALE, ZOOM_MAGNIFICATION,
    ZOOM_STEP,
};

/// Tunables for a render session
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SessionConfig {
    pub base_scale: f32,
    pub min_scale: f32,
    pub max_scale: f32,
    pub zoom_step: f32,
    /// Magnification of the click-to-zoom overlay, independent of base scale
    pub magnification: f32,
    pub overlay_cache_size: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            base_scale: DEFAULT_BASE_SCALE,
            min_scale: MIN_SCALE,
            max_scale: MAX_SCALE,
            zoom_step: ZOOM_STEP,
            magnification: ZOOM_MAGNIFICATION,
            overlay_cache_size: DEFAULT_OVERLAY_CACHE_SIZE,
        }
    }
}

/// Something the host may want to react to
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SessionEvent {
    /// Document parsed; page slots exist
    DocumentInfo { page_count: usize },
    /// A base surface was (re)rendered
    PageReady { page: usize },
    /// A page failed to render; its slot stays empty
    PageFailed { page: usize },
    /// A pass finished
    Loaded { page_count: usize, rendered: usize },
    /// Fetching or parsing failed
    LoadFailed { error: String },
    /// The zoom overlay raster for the active gesture arrived
    OverlayReady { page: usize },
    /// The zoom overlay for the active gesture will not show
    OverlayFailed { page: usize },
}

/// One loaded document and everything drawn from it.
///
/// All methods run on the caller's thread; rasterization happens on a single
/// worker thread fed in request order.
pub struct RenderSession {
    state: SessionState,
    overlay: ZoomOverlay,
    surfaces: BTreeMap<usize, Arc<Surface>>,
    failed: BTreeSet<usize>,
    request_tx: Sender<RenderRequest>,
    response_rx: Receiver<RenderResponse>,
    passes: PassTracker,
    current_pass: Option<PassId>,
    loading: bool,
    pass_rendered: usize,
    overlay_failed: Option<GestureId>,
    cache: Arc<Mutex<OverlayCache>>,
}

impl RenderSession {
    /// Create a session with default configuration
    #[must_use]
    pub fn new(engine: Arc<dyn RenderEngine>) -> Self {
        Self::with_config(engine, SessionConfig::default())
    }

    /// Create a session with custom configuration
    #[must_use]
    pub fn with_config(engine: Arc<dyn RenderEngine>, config: SessionConfig) -> Self {
        let cache = Arc::new(Mutex::new(OverlayCache::new(config.overlay_cache_size)));
        let passes = PassTracker::new();

        let (request_tx, request_rx) = flume::unbounded();
        let (response_tx, response_rx) = flume::unbounded();

        let worker_passes = passes.clone();
        let worker_cache = Arc::clone(&cache);
        std::thread::spawn(move || {
            render_worker(engine, request_rx, response_tx, worker_passes, worker_cache);
        });

        let zoom = Zoom::with_bounds(
            config.base_scale,
            config.min_scale,
            config.max_scale,
            config.zoom_step,
        );

        Self {
            state: SessionState::new(zoom),
            overlay: ZoomOverlay::new(config.magnification),
            surfaces: BTreeMap::new(),
            failed: BTreeSet::new(),
            request_tx,
            response_rx,
            passes,
            current_pass: None,
            loading: false,
            pass_rendered: 0,
            overlay_failed: None,
            cache,
        }
    }

    /// Load a document at the current base scale
    pub fn load(&mut self, url: impl Into<String>) {
        self.apply_command(Command::Load {
            url: url.into(),
            scale: None,
        });
    }

    /// Load a document at `scale` (clamped)
    pub fn load_with_scale(&mut self, url: impl Into<String>, scale: f32) {
        self.apply_command(Command::Load {
            url: url.into(),
            scale: Some(scale),
        });
    }

    /// Fetch the current document again
    pub fn reload(&mut self) {
        self.apply_command(Command::Reload);
    }

    pub fn zoom_in(&mut self) {
        self.apply_command(Command::ZoomIn);
    }

    pub fn zoom_out(&mut self) {
        self.apply_command(Command::ZoomOut);
    }

    pub fn set_scale(&mut self, scale: f32) {
        self.apply_command(Command::SetScale(scale));
    }

    /// Apply a command to the session state
    pub fn apply_command(&mut self, cmd: Command) {
        let effects = self.state.apply(cmd);
        self.execute_effects(effects);
    }

    fn execute_effects(&mut self, effects: Vec<Effect>) {
        for effect in effects {
            match effect {
                Effect::ResetSession => {
                    self.surfaces.clear();
                    self.failed.clear();
                    self.overlay.release();
                    self.overlay_failed = None;
                    self.cache
                        .lock()
                        .unwrap_or_else(PoisonError::into_inner)
                        .retain_epoch(self.state.epoch);
                }

                Effect::Rasterize => self.start_pass(),
            }
        }
    }

    fn start_pass(&mut self) {
        let Some(url) = self.state.url.clone() else {
            return;
        };

        let pass = self.passes.begin();
        let scale = self.state.zoom.factor();
        self.current_pass = Some(pass);
        self.loading = true;
        self.pass_rendered = 0;

        info!("Starting pass {pass:?} for {url} at scale {scale}");
        let _ = self.request_tx.send(RenderRequest::Rasterize {
            pass,
            epoch: self.state.epoch,
            url,
            scale,
        });
    }

    /// Current session state
    #[must_use]
    pub fn state(&self) -> &SessionState {
        &self.state
    }

    #[must_use]
    pub fn url(&self) -> Option<&str> {
        self.state.url.as_deref()
    }

    /// Current base scale
    #[must_use]
    pub fn scale(&self) -> f32 {
        self.state.zoom.factor()
    }

    #[must_use]
    pub fn page_count(&self) -> usize {
        self.state.page_count
    }

    /// Whether a pass is still in flight
    #[must_use]
    pub fn is_loading(&self) -> bool {
        self.loading
    }

    #[must_use]
    pub fn surface(&self, page: usize) -> Option<&Arc<Surface>> {
        self.surfaces.get(&page)
    }

    /// Rendered surfaces in ascending page order
    pub fn surfaces(&self) -> impl Iterator<Item = (usize, &Arc<Surface>)> {
        self.surfaces.iter().map(|(page, surface)| (*page, surface))
    }

    #[must_use]
    pub fn surface_count(&self) -> usize {
        self.surfaces.len()
    }

    /// Status of a page slot, for drawing placeholders
    #[must_use]
    pub fn page_slot(&self, page: usize) -> PageSlot {
        if self.surfaces.contains_key(&page) {
            PageSlot::Ready
        } else if self.failed.contains(&page) {
            PageSlot::Failed
        } else {
            PageSlot::Pending
        }
    }

    #[must_use]
    pub fn overlay(&self) -> &ZoomOverlay {
        &self.overlay
    }

    /// Start a zoom gesture over a rendered page.
    ///
    /// Returns false when no gesture started (touch pointer, page not
    /// rendered yet, or no usable page box).
    pub fn pointer_down(
        &mut self,
        page: usize,
        page_box: PageBox,
        pointer: Point,
        kind: PointerKind,
    ) -> bool {
        if !self.surfaces.contains_key(&page) {
            return false;
        }

        let Some(gesture) = self.overlay.press(page, page_box, pointer, kind) else {
            return false;
        };
        self.overlay_failed = None;

        let _ = self.request_tx.send(RenderRequest::Overlay {
            gesture,
            epoch: self.state.epoch,
            page,
            magnification: self.overlay.magnification(),
        });
        true
    }

    pub fn pointer_move(&mut self, pointer: Point) {
        self.overlay.move_to(pointer);
    }

    pub fn pointer_up(&mut self) {
        self.overlay.release();
        self.overlay_failed = None;
    }

    /// Overlay placement relative to the zoomed page, once its raster is ready.
    ///
    /// The ratio uses the scale of the surface currently displayed for the
    /// page, which lags the target scale while a rescale pass is running.
    #[must_use]
    pub fn overlay_placement(&self, page_box: PageBox) -> Option<OverlayPlacement> {
        let displayed_scale = self
            .overlay
            .active_page()
            .and_then(|page| self.surfaces.get(&page))
            .map_or_else(|| self.scale(), |surface| surface.scale);
        self.overlay.placement(page_box, displayed_scale)
    }

    /// Drain finished work without blocking
    pub fn poll_events(&mut self) -> Vec<SessionEvent> {
        let mut events = Vec::new();
        while let Ok(response) = self.response_rx.try_recv() {
            events.extend(self.handle_response(response));
        }
        events
    }

    /// Block until the current pass finishes or `timeout` elapses.
    ///
    /// Returns the events observed while waiting.
    pub fn wait_until_loaded(&mut self, timeout: Duration) -> Vec<SessionEvent> {
        self.wait_while(timeout, |session| session.loading)
    }

    /// Block until the active gesture's overlay is ready or failed
    pub fn wait_for_overlay(&mut self, timeout: Duration) -> Vec<SessionEvent> {
        self.wait_while(timeout, |session| {
            session.overlay.gesture().is_some_and(|g| {
                !g.is_ready() && session.overlay_failed != Some(g.id)
            })
        })
    }

    fn wait_while(
        &mut self,
        timeout: Duration,
        pending: impl Fn(&Self) -> bool,
    ) -> Vec<SessionEvent> {
        let deadline = Instant::now() + timeout;
        let mut events = self.poll_events();

        while pending(&*self) {
            let remaining = deadline.saturating_duration_since(Instant::now());
            match self.response_rx.recv_timeout(remaining) {
                Ok(response) => events.extend(self.handle_response(response)),
                Err(RecvTimeoutError::Timeout) => {
                    warn!("Timed out after {timeout:?} waiting for the render worker");
                    break;
                }
                Err(RecvTimeoutError::Disconnected) => {
                    warn!("Render worker is gone");
                    self.loading = false;
                    break;
                }
            }
        }

        events
    }

    fn handle_response(&mut self, response: RenderResponse) -> Option<SessionEvent> {
        if let Some(pass) = response.pass() {
            if self.current_pass != Some(pass) {
                debug!("Discarding response from stale pass {pass:?}");
                return None;
            }
        }

        match response {
            RenderResponse::DocumentInfo { page_count, .. } => {
                self.apply_command(Command::SetPageCount(page_count));
                self.surfaces.retain(|page, _| *page <= page_count);
                Some(SessionEvent::DocumentInfo { page_count })
            }

            RenderResponse::Page { page, surface, .. } => {
                self.failed.remove(&page);
                self.surfaces.insert(page, surface);
                self.pass_rendered += 1;
                Some(SessionEvent::PageReady { page })
            }

            RenderResponse::PageFailed { page, error, .. } => {
                debug!("Page {page} left unrendered: {error}");
                self.surfaces.remove(&page);
                self.failed.insert(page);
                Some(SessionEvent::PageFailed { page })
            }

            RenderResponse::LoadFailed { error, .. } => {
                self.loading = false;
                Some(SessionEvent::LoadFailed {
                    error: error.to_string(),
                })
            }

            RenderResponse::PassComplete { .. } => {
                self.loading = false;
                info!(
                    "Rendered {}/{} pages at scale {}",
                    self.pass_rendered,
                    self.state.page_count,
                    self.scale()
                );
                Some(SessionEvent::Loaded {
                    page_count: self.state.page_count,
                    rendered: self.pass_rendered,
                })
            }

            RenderResponse::Overlay {
                gesture,
                page,
                surface,
            } => self
                .overlay
                .overlay_ready(gesture, surface)
                .then_some(SessionEvent::OverlayReady { page }),

            RenderResponse::OverlayFailed {
                gesture,
                page,
                error,
            } => {
                debug!("Overlay for page {page} will not show: {error}");
                let active = self.overlay.gesture().is_some_and(|g| g.id == gesture);
                if active {
                    self.overlay_failed = Some(gesture);
                }
                active.then_some(SessionEvent::OverlayFailed { page })
            }
        }
    }

    /// Shutdown the worker
    pub fn shutdown(&self) {
        self.passes.begin();
        let _ = self.request_tx.send(RenderRequest::Shutdown);
    }
}

impl Drop for RenderSession {
    fn drop(&mut self) {
        self.shutdown();
    }
}
