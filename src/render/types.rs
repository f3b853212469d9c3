use std::fmt;

/// One rendered page.
#[derive(Clone, PartialEq, Eq)]
pub struct PageImage {
    /// 1-based page number.
    pub page: u32,
    pub png: Vec<u8>,
}

impl PageImage {
    pub const MEDIA_TYPE: &'static str = "image/png";
    pub const PNG_SIGNATURE: [u8; 8] = [0x89, b'P', b'N', b'G', b'\r', b'\n', 0x1a, b'\n'];

    pub fn new(page: u32, png: Vec<u8>) -> Self {
        Self { page, png }
    }

    pub fn len(&self) -> usize {
        self.png.len()
    }

    pub fn is_empty(&self) -> bool {
        self.png.is_empty()
    }

    /// Width and height from the PNG `IHDR` chunk, if the bytes carry one.
    pub fn dimensions(&self) -> Option<(u32, u32)> {
        let header = self.png.get(..24)?;
        if header[..8] != Self::PNG_SIGNATURE || &header[12..16] != b"IHDR" {
            return None;
        }
        let width = u32::from_be_bytes(header[16..20].try_into().ok()?);
        let height = u32::from_be_bytes(header[20..24].try_into().ok()?);
        Some((width, height))
    }
}

impl fmt::Debug for PageImage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PageImage")
            .field("page", &self.page)
            .field("bytes", &self.png.len())
            .finish()
    }
}

/// What to render and at which resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RenderSettings {
    /// Leading pages to render.
    pub pages: u32,
    pub dpi: u32,
    /// Longest image edge in pixels.
    pub max_dim: u32,
}

/// Total encoded size of a set of pages.
pub fn payload_bytes(images: &[PageImage]) -> usize {
    images.iter().map(PageImage::len).sum()
}
