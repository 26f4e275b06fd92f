use serde::{Deserialize, Serialize};

/// A point in canvas pixel space (origin top-left, y grows downward)
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct CanvasPosition {
    pub x: f64,
    pub y: f64,
}

impl CanvasPosition {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// A rectangle in PDF point space (origin bottom-left, y grows upward)
///
/// `page` is 1-based. `None` means the first page.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PdfPosition {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page: Option<u32>,
}

impl PdfPosition {
    pub const fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
            page: None,
        }
    }

    /// Target a specific 1-based page
    pub fn on_page(mut self, page: u32) -> Self {
        self.page = Some(page);
        self
    }

    /// Effective 1-based page number
    pub fn page_number(&self) -> u32 {
        self.page.unwrap_or(1)
    }
}

/// Fixed on-screen footprint of the signature image, in pixels
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SignatureSize {
    pub width: f64,
    pub height: f64,
}

impl SignatureSize {
    /// Size the signing UI renders the signature preview at
    pub const DEFAULT: SignatureSize = SignatureSize {
        width: 400.0,
        height: 150.0,
    };

    pub const fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }
}

impl Default for SignatureSize {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// Top-left corner of the drag container in client coordinates
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ContainerOrigin {
    pub left: f64,
    pub top: f64,
}

/// Where inside the dragged item the pointer grabbed it
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct GrabOffset {
    pub x: f64,
    pub y: f64,
}

/// Backing-store size of a page rasterized at `scale`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RenderedPage {
    pub width_px: f64,
    pub height_px: f64,
    pub scale: f64,
}

/// Durable layout of a placed signature as the signature store keeps it
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignatureRecord {
    pub pos_x: f64,
    pub pos_y: f64,
    pub width: f64,
    pub height: f64,
    pub page_number: u32,
}

impl From<PdfPosition> for SignatureRecord {
    fn from(pos: PdfPosition) -> Self {
        Self {
            pos_x: pos.x,
            pos_y: pos.y,
            width: pos.width,
            height: pos.height,
            page_number: pos.page_number(),
        }
    }
}

impl From<SignatureRecord> for PdfPosition {
    fn from(record: SignatureRecord) -> Self {
        Self {
            x: record.pos_x,
            y: record.pos_y,
            width: record.width,
            height: record.height,
            page: Some(record.page_number),
        }
    }
}
