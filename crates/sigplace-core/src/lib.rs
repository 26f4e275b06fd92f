//! Signature placement core logic
//!
//! Maps a signature dropped on a rendered page canvas to the page's PDF
//! coordinate space, and stamps the signature image into the document.
//!
//! ```text
//! canvas (px, top-left)  --coords-->  PDF (pt, bottom-left)  --embed-->  signed PDF
//! ```

pub mod coords;
pub mod embed;
pub mod error;
pub mod image;
pub mod parser;
pub mod preview;

#[cfg(test)]
mod testutil;

pub use coords::{
    canvas_to_pdf, clamp_position, pdf_to_canvas, relative_position, rendered_page_size,
};
pub use embed::{embed_signature, EmbedOptions, PageFallback, SignatureEmbedder};
pub use error::{ErrorKind, Result, SignPlaceError};
pub use parser::PdfDocument;
pub use preview::{render_page, PageRaster, PixelRect};
pub use shared_types::{
    CanvasPosition, ContainerOrigin, GrabOffset, PdfPosition, RenderedPage, SignatureRecord,
    SignatureSize,
};
