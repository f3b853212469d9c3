//! Page renderers.
//!
//! `PdftoppmRenderer` shells out to poppler's `pdftoppm`. `MockRenderer` produces
//! synthetic images for tests.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::debug;

use super::error::{RenderError, RenderResult};
use super::types::{PageImage, RenderSettings};

const RENDER_TIMEOUT: Duration = Duration::from_secs(120);
const OUTPUT_PREFIX: &str = "page";

#[async_trait]
/// Renders the leading pages of a document.
pub trait PageRenderer: Send + Sync + 'static {
    /// Returns up to `settings.pages` images in page order.
    async fn render(&self, path: &Path, settings: &RenderSettings) -> RenderResult<Vec<PageImage>>;
}

/// `pdftoppm` from `PATH` (or an explicit binary).
#[derive(Debug, Clone)]
pub struct PdftoppmRenderer {
    program: PathBuf,
    timeout: Duration,
}

impl PdftoppmRenderer {
    pub fn new() -> Self {
        Self {
            program: PathBuf::from("pdftoppm"),
            timeout: RENDER_TIMEOUT,
        }
    }

    pub fn with_program<P: Into<PathBuf>>(mut self, program: P) -> Self {
        self.program = program.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    fn args(path: &Path, out_prefix: &Path, settings: &RenderSettings) -> Vec<String> {
        vec![
            "-png".to_string(),
            "-r".to_string(),
            settings.dpi.to_string(),
            "-scale-to".to_string(),
            settings.max_dim.to_string(),
            "-f".to_string(),
            "1".to_string(),
            "-l".to_string(),
            settings.pages.max(1).to_string(),
            path.to_string_lossy().to_string(),
            out_prefix.to_string_lossy().to_string(),
        ]
    }
}

impl Default for PdftoppmRenderer {
    fn default() -> Self {
        Self::new()
    }
}

/// Page number from a `pdftoppm` output name such as `page-01.png`.
fn page_number(file_name: &str) -> Option<u32> {
    let stem = file_name.strip_suffix(".png")?;
    let (_, digits) = stem.rsplit_once('-')?;
    digits.parse().ok()
}

/// Collects rendered pages from `dir`, ordered by page number.
async fn collect_pages(dir: &Path) -> RenderResult<Vec<PageImage>> {
    let mut numbered = Vec::new();
    let mut entries = tokio::fs::read_dir(dir).await?;
    while let Some(entry) = entries.next_entry().await? {
        let name = entry.file_name().to_string_lossy().into_owned();
        if let Some(page) = page_number(&name) {
            numbered.push((page, entry.path()));
        }
    }
    numbered.sort_by_key(|(page, _)| *page);

    let mut images = Vec::with_capacity(numbered.len());
    for (page, path) in numbered {
        images.push(PageImage::new(page, tokio::fs::read(path).await?));
    }
    Ok(images)
}

#[async_trait]
impl PageRenderer for PdftoppmRenderer {
    async fn render(&self, path: &Path, settings: &RenderSettings) -> RenderResult<Vec<PageImage>> {
        let out_dir = tempfile::TempDir::new()?;
        let args = Self::args(path, &out_dir.path().join(OUTPUT_PREFIX), settings);

        let mut cmd = Command::new(&self.program);
        cmd.args(&args)
            .kill_on_drop(true)
            .stdout(Stdio::null())
            .stderr(Stdio::piped());

        let child = cmd.spawn().map_err(|e| RenderError::Spawn {
            reason: format!("{}: {e}", self.program.display()),
        })?;

        let output = match tokio::time::timeout(self.timeout, child.wait_with_output()).await {
            Ok(res) => res?,
            Err(_) => {
                return Err(RenderError::Timeout {
                    path: path.to_path_buf(),
                    timeout: self.timeout,
                });
            }
        };

        if !output.status.success() {
            return Err(RenderError::Failed {
                path: path.to_path_buf(),
                reason: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        let images = collect_pages(out_dir.path()).await?;
        if images.is_empty() {
            return Err(RenderError::NoPages {
                path: path.to_path_buf(),
            });
        }

        debug!(
            path = %path.display(),
            pages = images.len(),
            dpi = settings.dpi,
            "Pages rendered"
        );
        Ok(images)
    }
}

#[cfg(any(test, feature = "mock"))]
pub use mock::MockRenderer;

#[cfg(any(test, feature = "mock"))]
mod mock {
    use std::collections::{HashMap, HashSet};
    use std::path::Path;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use parking_lot::RwLock;

    use super::PageRenderer;
    use crate::render::error::{RenderError, RenderResult};
    use crate::render::types::{PageImage, RenderSettings};

    const PNG_SIGNATURE: [u8; 8] = PageImage::PNG_SIGNATURE;

    /// Synthetic renderer keyed by file name.
    ///
    /// Each page image is `bytes_per_dpi * dpi` bytes, so payload size tracks the
    /// requested resolution. Unknown files render a single page.
    #[derive(Debug)]
    pub struct MockRenderer {
        pages: RwLock<HashMap<String, u32>>,
        failures: RwLock<HashSet<String>>,
        bytes_per_dpi: usize,
        calls: AtomicUsize,
    }

    impl Default for MockRenderer {
        fn default() -> Self {
            Self {
                pages: RwLock::new(HashMap::new()),
                failures: RwLock::new(HashSet::new()),
                bytes_per_dpi: 100,
                calls: AtomicUsize::new(0),
            }
        }
    }

    impl MockRenderer {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn with_pages(self, file_name: &str, pages: u32) -> Self {
            self.pages.write().insert(file_name.to_string(), pages);
            self
        }

        pub fn with_failure(self, file_name: &str) -> Self {
            self.failures.write().insert(file_name.to_string());
            self
        }

        pub fn with_bytes_per_dpi(mut self, bytes: usize) -> Self {
            self.bytes_per_dpi = bytes;
            self
        }

        pub fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl PageRenderer for MockRenderer {
        async fn render(
            &self,
            path: &Path,
            settings: &RenderSettings,
        ) -> RenderResult<Vec<PageImage>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let name = path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();

            if self.failures.read().contains(&name) {
                return Err(RenderError::Failed {
                    path: path.to_path_buf(),
                    reason: "scripted failure".to_string(),
                });
            }

            let available = self.pages.read().get(&name).copied().unwrap_or(1);
            let size = (self.bytes_per_dpi * settings.dpi as usize).max(PNG_SIGNATURE.len());

            Ok((1..=available.min(settings.pages))
                .map(|page| {
                    let mut png = vec![0u8; size];
                    png[..PNG_SIGNATURE.len()].copy_from_slice(&PNG_SIGNATURE);
                    PageImage::new(page, png)
                })
                .collect())
        }
    }
}
