use std::path::Path;
use std::sync::Arc;

use moka::sync::Cache;
use tracing::{debug, instrument};

use super::config::RenderConfig;
use super::error::{RenderError, RenderResult};
use super::renderer::PageRenderer;
use super::types::{PageImage, RenderSettings, payload_bytes};

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct RenderKey {
    path: String,
    settings: RenderSettings,
}

/// Both sides of a pair, ready to send.
#[derive(Debug, Clone)]
pub struct RenderedPair {
    pub left: Arc<Vec<PageImage>>,
    pub right: Arc<Vec<PageImage>>,
    /// Resolution actually used.
    pub dpi: u32,
}

impl RenderedPair {
    pub fn payload_bytes(&self) -> usize {
        payload_bytes(&self.left) + payload_bytes(&self.right)
    }
}

/// Cached, size-bounded rendering of candidate pairs.
pub struct RenderService<R: PageRenderer> {
    renderer: Arc<R>,
    config: RenderConfig,
    cache: Cache<RenderKey, Arc<Vec<PageImage>>>,
}

impl<R: PageRenderer> std::fmt::Debug for RenderService<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RenderService")
            .field("config", &self.config)
            .field("cached_documents", &self.cache.entry_count())
            .finish_non_exhaustive()
    }
}

impl<R: PageRenderer> RenderService<R> {
    pub fn new(renderer: Arc<R>, config: RenderConfig) -> Self {
        let cache = Cache::builder()
            .weigher(|_key: &RenderKey, images: &Arc<Vec<PageImage>>| -> u32 {
                payload_bytes(images).try_into().unwrap_or(u32::MAX)
            })
            .max_capacity(config.cache_bytes)
            .build();
        Self {
            renderer,
            config,
            cache,
        }
    }

    pub fn config(&self) -> &RenderConfig {
        &self.config
    }

    pub fn renderer(&self) -> &Arc<R> {
        &self.renderer
    }

    /// Renders one document, reusing an earlier render with the same settings.
    pub async fn render(
        &self,
        path: &Path,
        settings: &RenderSettings,
    ) -> RenderResult<Arc<Vec<PageImage>>> {
        let key = RenderKey {
            path: path.to_string_lossy().into_owned(),
            settings: *settings,
        };
        if let Some(images) = self.cache.get(&key) {
            return Ok(images);
        }

        let images = Arc::new(self.renderer.render(path, settings).await?);
        if images.is_empty() {
            return Err(RenderError::NoPages {
                path: path.to_path_buf(),
            });
        }
        self.cache.insert(key, Arc::clone(&images));
        Ok(images)
    }

    async fn render_both(
        &self,
        left: &Path,
        right: &Path,
        settings: &RenderSettings,
    ) -> RenderResult<RenderedPair> {
        let (l, r) = tokio::try_join!(self.render(left, settings), self.render(right, settings))?;
        Ok(RenderedPair {
            left: l,
            right: r,
            dpi: settings.dpi,
        })
    }

    /// Renders both documents of a pair within the payload limit.
    ///
    /// An oversized pair is re-rendered once at the fallback resolution; if it is still
    /// too large the pair fails with [`RenderError::Oversized`].
    #[instrument(skip(self), fields(left = %left.display(), right = %right.display()))]
    pub async fn render_pair(&self, left: &Path, right: &Path) -> RenderResult<RenderedPair> {
        let limit = self.config.max_payload_bytes;

        let pair = self
            .render_both(left, right, &self.config.primary())
            .await?;
        let bytes = pair.payload_bytes();
        if bytes <= limit {
            return Ok(pair);
        }

        if !self.config.has_fallback() {
            return Err(RenderError::Oversized { bytes, limit });
        }

        let fallback = self.config.fallback();
        debug!(
            bytes,
            limit,
            fallback_dpi = fallback.dpi,
            "Payload over limit, stepping down resolution"
        );

        let pair = self.render_both(left, right, &fallback).await?;
        let bytes = pair.payload_bytes();
        if bytes > limit {
            return Err(RenderError::Oversized { bytes, limit });
        }
        Ok(pair)
    }

    pub fn cached_documents(&self) -> u64 {
        self.cache.entry_count()
    }
}
