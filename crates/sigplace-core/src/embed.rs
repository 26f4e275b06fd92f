//! Stamp a raster signature onto a PDF page
//!
//! Every call starts from the caller's original bytes and returns a fresh
//! buffer, so stamping the same document twice never accumulates images.

use lopdf::{dictionary, Dictionary, Document, Object, ObjectId, Stream};
use serde::{Deserialize, Serialize};
use shared_types::PdfPosition;
use tracing::{debug, instrument, warn};

use crate::error::{Result, SignPlaceError};
use crate::image::SignatureImage;
use crate::parser::{inherited_attribute, page_dict, resolve, PdfDocument};

/// What to do when a position targets a page the document does not have
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PageFallback {
    /// Stamp the first page instead
    #[default]
    FirstPage,
    /// Fail with `PageOutOfRange`
    Reject,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbedOptions {
    pub page_fallback: PageFallback,
    /// Flate-compress the image streams
    pub compress: bool,
    /// Prefix for the XObject resource name
    pub resource_prefix: String,
}

impl Default for EmbedOptions {
    fn default() -> Self {
        Self {
            page_fallback: PageFallback::FirstPage,
            compress: true,
            resource_prefix: "SigIm".to_string(),
        }
    }
}

/// Embeds signature images into PDF documents
#[derive(Debug, Clone, Default)]
pub struct SignatureEmbedder {
    options: EmbedOptions,
}

impl SignatureEmbedder {
    pub fn new(options: EmbedOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &EmbedOptions {
        &self.options
    }

    /// Draw the PNG in `data_url` onto the page and rectangle in `position`
    ///
    /// Inputs are checked in order: document, rectangle, options, page,
    /// image. The first failure is returned.
    #[instrument(skip_all, fields(page = position.page_number(), input_bytes = pdf_bytes.len()))]
    pub fn embed(&self, pdf_bytes: &[u8], data_url: &str, position: &PdfPosition) -> Result<Vec<u8>> {
        let mut pdf = PdfDocument::from_bytes(pdf_bytes)?;
        validate_rect(position)?;
        validate_prefix(&self.options.resource_prefix)?;
        let page_id = self.resolve_page(&pdf, position.page)?;

        let image = SignatureImage::from_data_url(data_url)?;
        debug!(
            width = image.width,
            height = image.height,
            has_alpha = image.alpha.is_some(),
            "decoded signature image"
        );

        let doc = pdf.doc_mut();
        let image_id = image.add_to_document(doc, self.options.compress)?;
        let name = attach_xobject(doc, page_id, image_id, &self.options.resource_prefix)?;
        append_draw_operations(doc, page_id, &name, position)?;

        let output = pdf.save_to_bytes()?;
        debug!(output_bytes = output.len(), resource = %name, "signature embedded");
        Ok(output)
    }

    /// Apply several placements in order, each on top of the previous output
    pub fn embed_all(&self, pdf_bytes: &[u8], placements: &[(&str, PdfPosition)]) -> Result<Vec<u8>> {
        if placements.is_empty() {
            PdfDocument::from_bytes(pdf_bytes)?;
            return Ok(pdf_bytes.to_vec());
        }

        let mut current = pdf_bytes.to_vec();
        for (data_url, position) in placements {
            current = self.embed(&current, data_url, position)?;
        }
        Ok(current)
    }

    fn resolve_page(&self, pdf: &PdfDocument, page: Option<u32>) -> Result<ObjectId> {
        let requested = page.unwrap_or(1);
        if requested == 0 {
            return Err(SignPlaceError::InvalidArgument(
                "page numbers are 1-based, got 0".to_string(),
            ));
        }

        if let Some(id) = pdf.page_id(requested) {
            return Ok(id);
        }

        let page_count = pdf.page_count();
        match self.options.page_fallback {
            PageFallback::Reject => Err(SignPlaceError::PageOutOfRange {
                page: requested,
                page_count,
            }),
            PageFallback::FirstPage => {
                warn!(
                    requested,
                    page_count, "signature page out of range, stamping page 1"
                );
                // get_pages() is keyed by page number, so the first key is page 1
                pdf.doc()
                    .get_pages()
                    .values()
                    .next()
                    .copied()
                    .ok_or_else(|| {
                        SignPlaceError::MalformedDocument("document has no pages".to_string())
                    })
            }
        }
    }
}

/// Embed with default options (lenient page fallback, compressed image)
pub fn embed_signature(pdf_bytes: &[u8], data_url: &str, position: &PdfPosition) -> Result<Vec<u8>> {
    SignatureEmbedder::default().embed(pdf_bytes, data_url, position)
}

fn validate_rect(position: &PdfPosition) -> Result<()> {
    let values = [position.x, position.y, position.width, position.height];
    if values.iter().any(|v| !v.is_finite()) {
        return Err(SignPlaceError::InvalidArgument(format!(
            "signature rectangle must be finite, got {:?}",
            values
        )));
    }
    if position.width <= 0.0 || position.height <= 0.0 {
        return Err(SignPlaceError::InvalidArgument(format!(
            "signature size must be positive, got {}x{}",
            position.width, position.height
        )));
    }
    Ok(())
}

/// Resource names are written raw after `/`, so only regular characters
/// are allowed.
fn validate_prefix(prefix: &str) -> Result<()> {
    let regular = |c: char| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.');
    if prefix.is_empty() || !prefix.chars().all(regular) {
        return Err(SignPlaceError::InvalidArgument(format!(
            "resource prefix {:?} must be non-empty ASCII letters, digits, '_', '-' or '.'",
            prefix
        )));
    }
    Ok(())
}

/// Register `image_id` in the page's XObject resources under a fresh name
///
/// Resources that are inherited or shared by reference are copied into a
/// page-local dictionary first so no other page is modified.
fn attach_xobject(
    doc: &mut Document,
    page_id: ObjectId,
    image_id: ObjectId,
    prefix: &str,
) -> Result<String> {
    let mut resources = effective_resources(doc, page_id)?;

    let mut xobjects = match resources.get(b"XObject") {
        Ok(obj) => match resolve(doc, obj)? {
            Object::Dictionary(dict) => dict.clone(),
            _ => {
                return Err(SignPlaceError::MalformedDocument(
                    "XObject resources are not a dictionary".to_string(),
                ))
            }
        },
        Err(_) => Dictionary::new(),
    };

    let name = (1u32..)
        .map(|n| format!("{}{}", prefix, n))
        .find(|candidate| !xobjects.has(candidate.as_bytes()))
        .unwrap_or_else(|| prefix.to_string());

    xobjects.set(name.as_bytes().to_vec(), Object::Reference(image_id));
    resources.set("XObject", Object::Dictionary(xobjects));

    page_dict_mut(doc, page_id)?.set("Resources", Object::Dictionary(resources));
    Ok(name)
}

/// The page's resources as a direct dictionary, following /Parent inheritance
fn effective_resources(doc: &Document, page_id: ObjectId) -> Result<Dictionary> {
    match inherited_attribute(doc, page_id, b"Resources")? {
        Some(obj) => match resolve(doc, obj)? {
            Object::Dictionary(resources) => Ok(resources.clone()),
            _ => Err(SignPlaceError::MalformedDocument(
                "page resources are not a dictionary".to_string(),
            )),
        },
        None => Ok(Dictionary::new()),
    }
}

fn page_dict_mut(doc: &mut Document, page_id: ObjectId) -> Result<&mut Dictionary> {
    doc.get_object_mut(page_id)
        .and_then(Object::as_dict_mut)
        .map_err(|e| SignPlaceError::MalformedDocument(format!("page is not a dictionary: {}", e)))
}

/// Append `q w 0 0 h x y cm /Name Do Q` to the page
///
/// Existing content is wrapped in `q ... Q` so a CTM it leaves behind
/// cannot shift the signature.
fn append_draw_operations(
    doc: &mut Document,
    page_id: ObjectId,
    name: &str,
    position: &PdfPosition,
) -> Result<()> {
    let existing = existing_contents(doc, page_id)?;

    let draw = format!(
        "q\n{} 0 0 {} {} {} cm\n/{} Do\nQ\n",
        fmt_num(position.width),
        fmt_num(position.height),
        fmt_num(position.x),
        fmt_num(position.y),
        name
    );

    let mut contents = Vec::with_capacity(existing.len() + 2);
    if existing.is_empty() {
        contents.push(Object::Reference(
            doc.add_object(Stream::new(dictionary! {}, draw.into_bytes())),
        ));
    } else {
        let open = doc.add_object(Stream::new(dictionary! {}, b"q\n".to_vec()));
        // Leading newline: the previous stream may end mid-token
        let close = doc.add_object(Stream::new(
            dictionary! {},
            format!("\nQ\n{}", draw).into_bytes(),
        ));
        contents.push(Object::Reference(open));
        contents.extend(existing);
        contents.push(Object::Reference(close));
    }

    page_dict_mut(doc, page_id)?.set("Contents", Object::Array(contents));
    Ok(())
}

/// References to the page's current content streams, in order
fn existing_contents(doc: &Document, page_id: ObjectId) -> Result<Vec<Object>> {
    let dict = page_dict(doc, page_id)?;
    let contents = match dict.get(b"Contents") {
        Ok(obj) => obj,
        Err(_) => return Ok(Vec::new()),
    };

    match contents {
        Object::Reference(id) => match doc.get_object(*id) {
            Ok(Object::Array(arr)) => Ok(arr.clone()),
            Ok(Object::Stream(_)) => Ok(vec![Object::Reference(*id)]),
            _ => Err(SignPlaceError::MalformedDocument(
                "page contents reference is neither a stream nor an array".to_string(),
            )),
        },
        Object::Array(arr) => Ok(arr.clone()),
        _ => Err(SignPlaceError::MalformedDocument(
            "page contents are neither a stream nor an array".to_string(),
        )),
    }
}

/// Format a number for a content stream: fixed 4 decimals, trailing zeros trimmed
fn fmt_num(value: f64) -> String {
    let s = format!("{:.4}", value);
    let s = s.trim_end_matches('0').trim_end_matches('.');
    match s {
        "" | "-" | "-0" => "0".to_string(),
        other => other.to_string(),
    }
}
