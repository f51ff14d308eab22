//! Core types for document rendering

/// Native page size in document units (PDF points)
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PageSize {
    pub width: f32,
    pub height: f32,
}

impl PageSize {
    #[must_use]
    pub const fn new(width: f32, height: f32) -> Self {
        Self { width, height }
    }

    /// Pixel dimensions of this page rasterized at `scale`
    #[must_use]
    pub fn scaled(self, scale: f32) -> (u32, u32) {
        (
            (self.width * scale).round().max(1.0) as u32,
            (self.height * scale).round().max(1.0) as u32,
        )
    }
}

/// Rasterized page image.
///
/// Contains RGB pixel data (3 bytes per pixel) plus the page number and the
/// scale it was rendered at. Base surfaces and overlay surfaces share this type.
#[derive(Clone)]
pub struct Surface {
    /// Raw RGB pixel data (3 bytes per pixel: R, G, B)
    pub pixels: Vec<u8>,
    /// Image width in pixels
    pub width_px: u32,
    /// Image height in pixels
    pub height_px: u32,
    /// Page number (1-indexed)
    pub page: usize,
    /// Scale factor used for rendering
    pub scale: f32,
}

impl Surface {
    /// Convert to an `image` buffer for encoding
    #[must_use]
    pub fn to_rgb_image(&self) -> Option<image::RgbImage> {
        image::RgbImage::from_raw(self.width_px, self.height_px, self.pixels.clone())
    }
}

impl std::fmt::Debug for Surface {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Surface")
            .field("page", &self.page)
            .field("width_px", &self.width_px)
            .field("height_px", &self.height_px)
            .field("scale", &self.scale)
            .finish_non_exhaustive()
    }
}

/// Screen-space point in CSS/device pixels
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    #[must_use]
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

impl std::ops::Sub for Point {
    type Output = Point;

    fn sub(self, rhs: Point) -> Point {
        Point::new(self.x - rhs.x, self.y - rhs.y)
    }
}

impl std::ops::AddAssign for Point {
    fn add_assign(&mut self, rhs: Point) {
        self.x += rhs.x;
        self.y += rhs.y;
    }
}

/// Displayed bounding box of a page surface on screen
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PageBox {
    pub left: f32,
    pub top: f32,
    pub width: f32,
    pub height: f32,
}

impl PageBox {
    #[must_use]
    pub const fn new(left: f32, top: f32, width: f32, height: f32) -> Self {
        Self {
            left,
            top,
            width,
            height,
        }
    }

    /// Box for a surface drawn at the origin with its pixel size
    #[must_use]
    pub fn from_surface(surface: &Surface) -> Self {
        Self::new(0.0, 0.0, surface.width_px as f32, surface.height_px as f32)
    }
}

/// Status of one page slot in a render session
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PageSlot {
    /// Not rendered yet; hosts show a placeholder
    Pending,
    /// A surface is available
    Ready,
    /// Rendering this page failed in the latest pass
    Failed,
}

/// Kind of pointing device that produced an event
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PointerKind {
    Mouse,
    Pen,
    Touch,
}

impl PointerKind {
    /// Touch-class devices do not get click-to-zoom
    #[must_use]
    pub fn supports_zoom(self) -> bool {
        !matches!(self, Self::Touch)
    }
}
