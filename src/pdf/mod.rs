//! Document rendering infrastructure

mod cache;
mod cancel;
mod engine;
mod overlay;
mod request;
mod session;
mod state;
mod types;
mod worker;
mod zoom;

pub use cache::{CacheKey, OverlayCache};
pub use cancel::{PassId, PassTracker};
#[cfg(feature = "pdf")]
pub use engine::MupdfEngine;
pub use engine::{MAX_DOCUMENT_BYTES, PageSource, RenderEngine, check_page, fetch_document};
pub use overlay::{OverlayPlacement, ZoomGesture, ZoomOverlay, overlay_placement};
pub use request::{DocEpoch, GestureId, RenderFault, RenderRequest, RenderResponse};
pub use session::{RenderSession, SessionConfig, SessionEvent};
pub use state::{Command, Effect, SessionState};
pub use types::*;
pub use zoom::Zoom;

/// Scale pages are rasterized at for normal viewing
pub const DEFAULT_BASE_SCALE: f32 = 1.0;
/// Smallest base scale zoom-out can reach
pub const MIN_SCALE: f32 = 0.5;
/// Largest base scale zoom-in can reach
pub const MAX_SCALE: f32 = 3.0;
/// Base scale change per zoom-in/zoom-out step
pub const ZOOM_STEP: f32 = 0.25;
/// Magnification of the click-to-zoom overlay
pub const ZOOM_MAGNIFICATION: f32 = 3.0;
/// Overlay rasters kept per session
pub const DEFAULT_OVERLAY_CACHE_SIZE: usize = 8;

/// `value` when it is a usable scale or magnification, otherwise `fallback`
pub(crate) fn positive_or(value: f32, fallback: f32) -> f32 {
    if value.is_finite() && value > 0.0 {
        value
    } else {
        fallback
    }
}
