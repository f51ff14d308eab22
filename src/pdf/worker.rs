//! Render worker - runs in a dedicated thread
//!
//! Requests are handled strictly in order, so at most one rasterization pass
//! runs at a time. A pass checks whether it is still current after every
//! step that can take a while (fetch, parse, each page) and stops as soon as
//! a newer pass exists.

use std::sync::{Arc, Mutex, PoisonError};

use flume::{Receiver, Sender};
use log::{debug, info, warn};

use super::cache::{CacheKey, OverlayCache};
use super::cancel::{PassId, PassTracker};
use super::engine::{PageSource, RenderEngine};
use super::request::{DocEpoch, GestureId, RenderFault, RenderRequest, RenderResponse};

struct LoadedDoc {
    epoch: DocEpoch,
    pages: Box<dyn PageSource>,
}

/// Why a pass stopped before rasterizing anything
enum Abort {
    Stale,
    Failed(RenderFault),
}

/// Main worker function
pub fn render_worker(
    engine: Arc<dyn RenderEngine>,
    requests: Receiver<RenderRequest>,
    responses: Sender<RenderResponse>,
    passes: PassTracker,
    cache: Arc<Mutex<OverlayCache>>,
) {
    let mut loaded: Option<LoadedDoc> = None;

    for request in requests {
        match request {
            RenderRequest::Rasterize {
                pass,
                epoch,
                url,
                scale,
            } => {
                if !passes.is_current(pass) {
                    debug!("Skipping superseded pass {pass:?}");
                    continue;
                }

                match ensure_loaded(engine.as_ref(), &mut loaded, epoch, &url, pass, &passes) {
                    Ok(doc) => rasterize_pass(doc, pass, scale, &passes, &responses),
                    Err(Abort::Stale) => debug!("Pass {pass:?} went stale while loading {url}"),
                    Err(Abort::Failed(error)) => {
                        warn!("Failed to load {url}: {error}");
                        let _ = responses.send(RenderResponse::LoadFailed { pass, error });
                    }
                }
            }

            RenderRequest::Overlay {
                gesture,
                epoch,
                page,
                magnification,
            } => {
                handle_overlay_request(
                    loaded.as_ref(),
                    gesture,
                    epoch,
                    page,
                    magnification,
                    &cache,
                    &responses,
                );
            }

            RenderRequest::Shutdown => break,
        }
    }
}

/// Make sure the document for `epoch` is parsed, fetching it if needed
fn ensure_loaded<'a>(
    engine: &dyn RenderEngine,
    loaded: &'a mut Option<LoadedDoc>,
    epoch: DocEpoch,
    url: &str,
    pass: PassId,
    passes: &PassTracker,
) -> Result<&'a LoadedDoc, Abort> {
    let reusable = loaded.as_ref().is_some_and(|doc| doc.epoch == epoch);
    if !reusable {
        *loaded = None;

        let bytes = engine.fetch(url).map_err(Abort::Failed)?;
        if !passes.is_current(pass) {
            return Err(Abort::Stale);
        }

        let pages = engine.open(bytes).map_err(Abort::Failed)?;
        info!("Opened {url}: {} pages", pages.page_count());
        *loaded = Some(LoadedDoc { epoch, pages });

        if !passes.is_current(pass) {
            return Err(Abort::Stale);
        }
    }

    loaded
        .as_ref()
        .ok_or_else(|| Abort::Failed(RenderFault::NoDocument))
}

fn rasterize_pass(
    doc: &LoadedDoc,
    pass: PassId,
    scale: f32,
    passes: &PassTracker,
    responses: &Sender<RenderResponse>,
) {
    let page_count = doc.pages.page_count();
    let _ = responses.send(RenderResponse::DocumentInfo { pass, page_count });

    for page in 1..=page_count {
        let result = doc.pages.render(page, scale);

        if !passes.is_current(pass) {
            debug!("Pass {pass:?} superseded after page {page}");
            return;
        }

        match result {
            Ok(surface) => {
                debug!(
                    "Rendered page {page} at {scale}: {}x{}",
                    surface.width_px, surface.height_px
                );
                let _ = responses.send(RenderResponse::Page {
                    pass,
                    page,
                    surface: Arc::new(surface),
                });
            }
            Err(error) => {
                warn!("Page {page} failed to render: {error}");
                let _ = responses.send(RenderResponse::PageFailed { pass, page, error });
            }
        }
    }

    let _ = responses.send(RenderResponse::PassComplete { pass });
}

fn handle_overlay_request(
    loaded: Option<&LoadedDoc>,
    gesture: GestureId,
    epoch: DocEpoch,
    page: usize,
    magnification: f32,
    cache: &Arc<Mutex<OverlayCache>>,
    responses: &Sender<RenderResponse>,
) {
    let key = CacheKey::new(epoch, page, magnification);

    let cached = cache
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .get(&key);
    if let Some(surface) = cached {
        let _ = responses.send(RenderResponse::Overlay {
            gesture,
            page,
            surface,
        });
        return;
    }

    let Some(doc) = loaded.filter(|doc| doc.epoch == epoch) else {
        let _ = responses.send(RenderResponse::OverlayFailed {
            gesture,
            page,
            error: RenderFault::NoDocument,
        });
        return;
    };

    match doc.pages.render(page, magnification) {
        Ok(surface) => {
            let surface = cache
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .insert(key, surface);
            let _ = responses.send(RenderResponse::Overlay {
                gesture,
                page,
                surface,
            });
        }
        Err(error) => {
            warn!("Overlay for page {page} failed: {error}");
            let _ = responses.send(RenderResponse::OverlayFailed {
                gesture,
                page,
                error,
            });
        }
    }
}
