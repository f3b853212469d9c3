use crate::constants::{
    DEFAULT_MAX_IMAGE_DIM, DEFAULT_MAX_PAYLOAD_BYTES, DEFAULT_RENDER_DPI,
    DEFAULT_RENDER_FALLBACK_DPI, DEFAULT_RENDER_PAGES,
};

use super::types::RenderSettings;

/// Bytes of rendered pages kept in memory across pairs.
pub const DEFAULT_RENDER_CACHE_BYTES: u64 = 256 * 1024 * 1024;

#[derive(Debug, Clone, PartialEq)]
pub struct RenderConfig {
    pub pages: u32,
    pub dpi: u32,
    /// Resolution for the single retry when a pair is over the payload limit.
    pub fallback_dpi: u32,
    pub max_dim: u32,
    /// Hard limit for both documents of a pair combined.
    pub max_payload_bytes: usize,
    pub cache_bytes: u64,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            pages: DEFAULT_RENDER_PAGES,
            dpi: DEFAULT_RENDER_DPI,
            fallback_dpi: DEFAULT_RENDER_FALLBACK_DPI,
            max_dim: DEFAULT_MAX_IMAGE_DIM,
            max_payload_bytes: DEFAULT_MAX_PAYLOAD_BYTES,
            cache_bytes: DEFAULT_RENDER_CACHE_BYTES,
        }
    }
}

impl RenderConfig {
    pub fn primary(&self) -> RenderSettings {
        RenderSettings {
            pages: self.pages,
            dpi: self.dpi,
            max_dim: self.max_dim,
        }
    }

    /// Step-down settings. The edge cap shrinks in proportion to the resolution.
    pub fn fallback(&self) -> RenderSettings {
        let dpi = self.fallback_dpi.max(1);
        let scaled = u64::from(self.max_dim) * u64::from(dpi) / u64::from(self.dpi.max(1));
        RenderSettings {
            pages: self.pages,
            dpi,
            max_dim: (scaled as u32).clamp(1, self.max_dim.max(1)),
        }
    }

    /// `true` if a step-down would change anything.
    pub fn has_fallback(&self) -> bool {
        self.fallback_dpi < self.dpi
    }
}
