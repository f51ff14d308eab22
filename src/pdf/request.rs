//! Render request and response types

use std::sync::Arc;

use super::cancel::PassId;
use super::types::Surface;

/// Identifier of a zoom gesture (one press-and-hold)
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct GestureId(pub u64);

/// Identifier of a loaded document, bumped on every URL load
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct DocEpoch(pub u64);

/// Request sent to the render worker
#[derive(Debug)]
pub enum RenderRequest {
    /// Rasterize every page of the document at `scale`.
    ///
    /// The worker reuses the parsed document when `epoch` matches the one it
    /// holds; otherwise it fetches and parses `url` first.
    Rasterize {
        pass: PassId,
        epoch: DocEpoch,
        url: String,
        scale: f32,
    },

    /// Rasterize one page at high magnification for the zoom overlay
    Overlay {
        gesture: GestureId,
        epoch: DocEpoch,
        page: usize,
        magnification: f32,
    },

    /// Shutdown the worker
    Shutdown,
}

/// Errors from the render pipeline
#[derive(Debug, thiserror::Error)]
pub enum RenderFault {
    #[cfg(feature = "pdf")]
    #[error("PDF engine: {0}")]
    Pdf(#[from] mupdf::error::Error),

    #[error("fetch {url}: {detail}")]
    Fetch { url: String, detail: String },

    #[error("page {page} out of range (document has {page_count} pages)")]
    PageOutOfRange { page: usize, page_count: usize },

    #[error("no document loaded")]
    NoDocument,

    #[error("{detail}")]
    Generic { detail: String },
}

impl RenderFault {
    pub fn generic(msg: impl Into<String>) -> Self {
        Self::Generic { detail: msg.into() }
    }

    pub fn fetch(url: &str, detail: impl ToString) -> Self {
        Self::Fetch {
            url: url.to_string(),
            detail: detail.to_string(),
        }
    }
}

/// Response from the render worker
#[derive(Debug)]
pub enum RenderResponse {
    /// Document fetched and parsed
    DocumentInfo { pass: PassId, page_count: usize },

    /// Rendered base surface
    Page {
        pass: PassId,
        page: usize,
        surface: Arc<Surface>,
    },

    /// One page failed; the pass continues
    PageFailed {
        pass: PassId,
        page: usize,
        error: RenderFault,
    },

    /// Fetch or parse failed; the pass is over
    LoadFailed { pass: PassId, error: RenderFault },

    /// All pages of the pass were attempted
    PassComplete { pass: PassId },

    /// High magnification raster for a zoom gesture
    Overlay {
        gesture: GestureId,
        page: usize,
        surface: Arc<Surface>,
    },

    /// Overlay raster failed; the overlay never shows for this gesture
    OverlayFailed {
        gesture: GestureId,
        page: usize,
        error: RenderFault,
    },
}

impl RenderResponse {
    /// Pass this response belongs to, if it is part of a base pass
    #[must_use]
    pub fn pass(&self) -> Option<PassId> {
        match self {
            Self::DocumentInfo { pass, .. }
            | Self::Page { pass, .. }
            | Self::PageFailed { pass, .. }
            | Self::LoadFailed { pass, .. }
            | Self::PassComplete { pass } => Some(*pass),
            Self::Overlay { .. } | Self::OverlayFailed { .. } => None,
        }
    }
}
