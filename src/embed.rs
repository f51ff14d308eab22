//! Content-height notifications for an embedding host page

use serde::{Deserialize, Serialize};

use crate::pdf::RenderSession;

pub const HEIGHT_MESSAGE_TYPE: &str = "pdf-gallery:height";
/// Vertical gap between stacked pages, in pixels
pub const PAGE_GAP_PX: u32 = 8;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EmbedTrigger {
    Load,
    Layout,
    Resize,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeightMessage {
    #[serde(rename = "type")]
    pub kind: String,
    pub height: u32,
}

impl HeightMessage {
    pub fn new(height: u32) -> Self {
        Self {
            kind: HEIGHT_MESSAGE_TYPE.to_string(),
            height,
        }
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| {
            format!(r#"{{"type":"{HEIGHT_MESSAGE_TYPE}","height":{}}}"#, self.height)
        })
    }
}

/// Height of all rendered pages stacked with [`PAGE_GAP_PX`] between them
pub fn content_height(session: &RenderSession) -> u32 {
    let mut height = 0u32;
    let mut pages = 0u32;
    for (_, surface) in session.surfaces() {
        height = height.saturating_add(surface.height_px);
        pages += 1;
    }
    height.saturating_add(pages.saturating_sub(1) * PAGE_GAP_PX)
}

/// Emits a height message only when the height actually changed
#[derive(Debug, Default)]
pub struct HeightReporter {
    last: Option<u32>,
}

impl HeightReporter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn last_height(&self) -> Option<u32> {
        self.last
    }

    pub fn report(&mut self, trigger: EmbedTrigger, height: u32) -> Option<HeightMessage> {
        if trigger != EmbedTrigger::Load && self.last == Some(height) {
            return None;
        }
        log::trace!("Reporting height {height} on {trigger:?}");
        self.last = Some(height);
        Some(HeightMessage::new(height))
    }

    pub fn report_session(
        &mut self,
        trigger: EmbedTrigger,
        session: &RenderSession,
    ) -> Option<HeightMessage> {
        self.report(trigger, content_height(session))
    }
}
