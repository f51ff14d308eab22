pub mod capabilities;
pub mod embed;
pub mod gallery;
pub mod panic_handler;
pub mod pdf;
pub mod ratings;
pub mod settings;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

pub use capabilities::Capabilities;
pub use gallery::{Gallery, GalleryBackend, GalleryItem, GallerySettings};
pub use pdf::{RenderSession, SessionConfig, SessionEvent};
pub use ratings::{Rating, RatingSummary, RatingsClient};
