//! Render session state management

use super::request::DocEpoch;
use super::zoom::Zoom;

/// Current state of a render session
#[derive(Clone, Debug)]
pub struct SessionState {
    /// URL of the loaded document
    pub url: Option<String>,

    /// Base display scale
    pub zoom: Zoom,

    /// Total page count, 0 until the document is parsed
    pub page_count: usize,

    /// Bumped every time a document is (re)loaded
    pub epoch: DocEpoch,
}

impl SessionState {
    #[must_use]
    pub fn new(zoom: Zoom) -> Self {
        Self {
            url: None,
            zoom,
            page_count: 0,
            epoch: DocEpoch(0),
        }
    }

    /// Apply a command and return resulting effects
    #[must_use]
    pub fn apply(&mut self, cmd: Command) -> Vec<Effect> {
        match cmd {
            Command::Load { url, scale } => {
                if let Some(scale) = scale {
                    self.zoom.set(scale);
                }
                self.url = Some(url);
                self.start_document()
            }

            Command::Reload => {
                if self.url.is_some() {
                    self.start_document()
                } else {
                    vec![]
                }
            }

            Command::SetScale(scale) => {
                let changed = self.zoom.set(scale);
                self.rescale_effects(changed)
            }

            Command::ZoomIn => {
                let changed = self.zoom.step_in();
                self.rescale_effects(changed)
            }

            Command::ZoomOut => {
                let changed = self.zoom.step_out();
                self.rescale_effects(changed)
            }

            Command::SetPageCount(count) => {
                self.page_count = count;
                vec![]
            }
        }
    }

    fn start_document(&mut self) -> Vec<Effect> {
        self.epoch = DocEpoch(self.epoch.0 + 1);
        self.page_count = 0;
        vec![Effect::ResetSession, Effect::Rasterize]
    }

    fn rescale_effects(&self, changed: bool) -> Vec<Effect> {
        if changed && self.url.is_some() {
            vec![Effect::Rasterize]
        } else {
            vec![]
        }
    }
}

/// Commands that modify session state
#[derive(Clone, Debug)]
pub enum Command {
    /// Load a document, optionally with a new base scale
    Load { url: String, scale: Option<f32> },
    /// Fetch the current document again
    Reload,
    /// Set the base scale (clamped)
    SetScale(f32),
    /// Step the base scale up
    ZoomIn,
    /// Step the base scale down
    ZoomOut,
    /// Update the page count
    SetPageCount(usize),
}

/// Effects produced by state changes
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Effect {
    /// Drop surfaces, failures and any zoom gesture of the previous document
    ResetSession,
    /// Start a new rasterization pass at the current scale
    Rasterize,
}
