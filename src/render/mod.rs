//! Page rendering for visual verification.
//!
//! [`PageRenderer`] turns the leading pages of a document into PNG images. The
//! [`RenderService`] on top of it caches rendered documents (a document often appears
//! in several candidate pairs) and keeps each pair under the service's payload limit.

pub mod config;
pub mod error;
pub mod renderer;
pub mod service;
pub mod types;


pub use config::RenderConfig;
pub use error::{RenderError, RenderResult};
#[cfg(any(test, feature = "mock"))]
pub use renderer::MockRenderer;
pub use renderer::{PageRenderer, PdftoppmRenderer};
pub use service::{RenderService, RenderedPair};
pub use types::{PageImage, RenderSettings, payload_bytes};
