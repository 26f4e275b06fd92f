//! Types shared between the placement core and its callers

pub mod types;

pub use types::{
    CanvasPosition, ContainerOrigin, GrabOffset, PdfPosition, RenderedPage, SignatureRecord,
    SignatureSize,
};
