//! Click-to-zoom overlay
//!
//! Pressing a pointer over a page shows a high magnification raster of that
//! page, positioned so the point under the cursor stays where it was.
//! Moving the pointer while held pans the overlay; releasing clears it.

use std::sync::Arc;

use log::debug;

use super::request::GestureId;
use super::{ZOOM_MAGNIFICATION, positive_or};
use super::types::{PageBox, Point, PointerKind, Surface};

/// Where to draw the overlay, relative to the source page's top-left corner
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct OverlayPlacement {
    pub left: f32,
    pub top: f32,
    pub width: f32,
    pub height: f32,
}

impl OverlayPlacement {
    /// Same placement in screen coordinates
    #[must_use]
    pub fn on_screen(self, page_box: PageBox) -> Self {
        Self {
            left: page_box.left + self.left,
            top: page_box.top + self.top,
            ..self
        }
    }
}

/// Compute overlay placement for a page displayed at `base_scale`.
///
/// `origin` is the fractional click position within the page (0..1 on each
/// axis). With zero pan, the point at `origin` lands on the same screen
/// coordinate on the overlay as on the base surface.
#[must_use]
pub fn overlay_placement(
    page_box: PageBox,
    base_scale: f32,
    magnification: f32,
    origin: Point,
    pan: Point,
) -> OverlayPlacement {
    let (w, h) = (page_box.width, page_box.height);
    let ratio = magnification / base_scale;

    OverlayPlacement {
        left: origin.x * w - origin.x * w * ratio + pan.x,
        top: origin.y * h - origin.y * h * ratio + pan.y,
        width: w * ratio,
        height: h * ratio,
    }
}

/// An active press-and-hold gesture
#[derive(Clone, Debug)]
pub struct ZoomGesture {
    pub id: GestureId,
    /// Page being zoomed (1-indexed)
    pub page: usize,
    /// Fractional click position within the page
    pub origin: Point,
    /// Accumulated pan offset
    pub pan: Point,
    last_pointer: Point,
    surface: Option<Arc<Surface>>,
}

impl ZoomGesture {
    /// Whether the high magnification raster has arrived
    #[must_use]
    pub fn is_ready(&self) -> bool {
        self.surface.is_some()
    }

    #[must_use]
    pub fn surface(&self) -> Option<&Arc<Surface>> {
        self.surface.as_ref()
    }
}

/// Zoom interaction state: idle, or exactly one active gesture
#[derive(Debug)]
pub struct ZoomOverlay {
    magnification: f32,
    active: Option<ZoomGesture>,
    next_gesture: u64,
}

impl ZoomOverlay {
    /// Overlay at `magnification`, or the default one if that is not positive
    #[must_use]
    pub fn new(magnification: f32) -> Self {
        Self {
            magnification: positive_or(magnification, ZOOM_MAGNIFICATION),
            active: None,
            next_gesture: 1,
        }
    }

    #[must_use]
    pub fn magnification(&self) -> f32 {
        self.magnification
    }

    #[must_use]
    pub fn is_zooming(&self) -> bool {
        self.active.is_some()
    }

    #[must_use]
    pub fn gesture(&self) -> Option<&ZoomGesture> {
        self.active.as_ref()
    }

    #[must_use]
    pub fn active_page(&self) -> Option<usize> {
        self.active.as_ref().map(|g| g.page)
    }

    /// Current pan offset, (0, 0) when idle
    #[must_use]
    pub fn pan(&self) -> Point {
        self.active.as_ref().map(|g| g.pan).unwrap_or_default()
    }

    /// Start a gesture over `page`.
    ///
    /// Returns the new gesture id, or `None` for touch pointers and pages
    /// without a usable displayed size.
    pub fn press(
        &mut self,
        page: usize,
        page_box: PageBox,
        pointer: Point,
        kind: PointerKind,
    ) -> Option<GestureId> {
        if !kind.supports_zoom() || page_box.width <= 0.0 || page_box.height <= 0.0 {
            return None;
        }

        let origin = Point::new(
            ((pointer.x - page_box.left) / page_box.width).clamp(0.0, 1.0),
            ((pointer.y - page_box.top) / page_box.height).clamp(0.0, 1.0),
        );

        let id = GestureId(self.next_gesture);
        self.next_gesture += 1;
        debug!(
            "Zoom press on page {page} at ({:.3}, {:.3})",
            origin.x, origin.y
        );

        self.active = Some(ZoomGesture {
            id,
            page,
            origin,
            pan: Point::default(),
            last_pointer: pointer,
            surface: None,
        });
        Some(id)
    }

    /// Pan by the pointer displacement since the last sample
    pub fn move_to(&mut self, pointer: Point) {
        if let Some(gesture) = self.active.as_mut() {
            gesture.pan += pointer - gesture.last_pointer;
            gesture.last_pointer = pointer;
        }
    }

    /// End the gesture. Always returns to idle.
    pub fn release(&mut self) {
        if let Some(gesture) = self.active.take() {
            debug!("Zoom release on page {}", gesture.page);
        }
    }

    /// Attach a finished raster. Ignored unless `gesture` is still active.
    pub fn overlay_ready(&mut self, gesture: GestureId, surface: Arc<Surface>) -> bool {
        match self.active.as_mut() {
            Some(active) if active.id == gesture => {
                active.surface = Some(surface);
                true
            }
            _ => {
                debug!("Dropping overlay for finished gesture {gesture:?}");
                false
            }
        }
    }

    /// Overlay placement relative to the page, once the raster is ready
    #[must_use]
    pub fn placement(&self, page_box: PageBox, base_scale: f32) -> Option<OverlayPlacement> {
        let gesture = self.active.as_ref().filter(|g| g.is_ready())?;
        Some(overlay_placement(
            page_box,
            base_scale,
            self.magnification,
            gesture.origin,
            gesture.pan,
        ))
    }
}
