//! PDF parsing using lopdf

use std::collections::HashSet;

use lopdf::{Dictionary, Document, Object, ObjectId};

use crate::error::{Result, SignPlaceError};

/// US Letter, used when no MediaBox can be found
pub const DEFAULT_MEDIA_BOX: [f64; 4] = [0.0, 0.0, 612.0, 792.0];

/// Readers accept a header anywhere in the first KiB
const HEADER_WINDOW: usize = 1024;

/// Wrapper around lopdf::Document for page-oriented operations
pub struct PdfDocument {
    doc: Document,
}

impl PdfDocument {
    /// Parse a PDF from raw bytes. The input is only read.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.is_empty() {
            return Err(SignPlaceError::MalformedDocument("empty input".to_string()));
        }
        let window = &bytes[..bytes.len().min(HEADER_WINDOW)];
        if !window.windows(5).any(|w| w == b"%PDF-") {
            return Err(SignPlaceError::MalformedDocument(
                "missing %PDF- header".to_string(),
            ));
        }

        let doc = Document::load_mem(bytes)
            .map_err(|e| SignPlaceError::MalformedDocument(format!("PDF parse error: {}", e)))?;
        if doc.get_pages().is_empty() {
            return Err(SignPlaceError::MalformedDocument(
                "document has no pages".to_string(),
            ));
        }
        Ok(Self { doc })
    }

    /// Get the number of pages
    pub fn page_count(&self) -> usize {
        self.doc.get_pages().len()
    }

    /// Get page object ID for a given page number (1-indexed)
    pub fn page_id(&self, page_num: u32) -> Option<ObjectId> {
        self.doc.get_pages().get(&page_num).copied()
    }

    /// Get page dimensions (MediaBox) as [x, y, width, height]
    pub fn page_dimensions(&self, page_num: u32) -> Result<[f64; 4]> {
        let page_id = self.page_id(page_num).ok_or(SignPlaceError::PageOutOfRange {
            page: page_num,
            page_count: self.page_count(),
        })?;
        media_box(&self.doc, page_id)
    }

    pub fn doc(&self) -> &Document {
        &self.doc
    }

    /// Get mutable access to the internal document
    pub fn doc_mut(&mut self) -> &mut Document {
        &mut self.doc
    }

    /// Save the document to bytes
    pub fn save_to_bytes(&mut self) -> Result<Vec<u8>> {
        let mut buffer = Vec::new();
        self.doc
            .save_to(&mut buffer)
            .map_err(|e| SignPlaceError::Serialization(format!("Failed to save PDF: {}", e)))?;
        Ok(buffer)
    }
}

/// MediaBox of a page as [x, y, width, height], inherited through /Parent
pub(crate) fn media_box(doc: &Document, page_id: ObjectId) -> Result<[f64; 4]> {
    match inherited_attribute(doc, page_id, b"MediaBox")? {
        Some(obj) => parse_rect(doc, obj),
        None => Ok(DEFAULT_MEDIA_BOX),
    }
}

/// Look up an inheritable page attribute on the page or its /Parent chain
///
/// A chain that revisits a node is reported as malformed.
pub(crate) fn inherited_attribute<'a>(
    doc: &'a Document,
    page_id: ObjectId,
    key: &[u8],
) -> Result<Option<&'a Object>> {
    let mut visited = HashSet::new();
    let mut current = Some(page_id);
    while let Some(id) = current {
        if !visited.insert(id) {
            return Err(SignPlaceError::MalformedDocument(format!(
                "page tree cycle through object {:?}",
                id
            )));
        }
        let dict = page_dict(doc, id)?;
        if let Ok(obj) = dict.get(key) {
            return Ok(Some(obj));
        }
        current = dict.get(b"Parent").and_then(Object::as_reference).ok();
    }
    Ok(None)
}

pub(crate) fn page_dict(doc: &Document, id: ObjectId) -> Result<&Dictionary> {
    doc.get_object(id)
        .and_then(Object::as_dict)
        .map_err(|e| {
            SignPlaceError::MalformedDocument(format!("page {:?} is not a dictionary: {}", id, e))
        })
}

/// Follow references until a direct object is reached
pub(crate) fn resolve<'a>(doc: &'a Document, mut obj: &'a Object) -> Result<&'a Object> {
    // Bounded so a reference cycle cannot spin forever
    for _ in 0..32 {
        match obj {
            Object::Reference(id) => {
                obj = doc.get_object(*id).map_err(|e| {
                    SignPlaceError::MalformedDocument(format!("Failed to resolve reference: {}", e))
                })?;
            }
            _ => return Ok(obj),
        }
    }
    Err(SignPlaceError::MalformedDocument(
        "reference chain too deep".to_string(),
    ))
}

/// Parse a PDF rectangle array into [x, y, width, height]
fn parse_rect(doc: &Document, obj: &Object) -> Result<[f64; 4]> {
    let arr = resolve(doc, obj)?
        .as_array()
        .map_err(|_| SignPlaceError::MalformedDocument("MediaBox is not an array".to_string()))?;

    if arr.len() != 4 {
        return Err(SignPlaceError::MalformedDocument(format!(
            "MediaBox has {} elements, expected 4",
            arr.len()
        )));
    }

    let mut values = [0.0f64; 4];
    for (i, obj) in arr.iter().enumerate() {
        values[i] = extract_number(doc, obj)?;
    }

    // Convert from [x1, y1, x2, y2] to [x, y, width, height]
    Ok([
        values[0].min(values[2]),
        values[1].min(values[3]),
        (values[2] - values[0]).abs(),
        (values[3] - values[1]).abs(),
    ])
}

/// Extract a number from a PDF object
pub(crate) fn extract_number(doc: &Document, obj: &Object) -> Result<f64> {
    match resolve(doc, obj)? {
        Object::Integer(i) => Ok(*i as f64),
        Object::Real(r) => Ok(*r as f64),
        _ => Err(SignPlaceError::MalformedDocument(
            "Expected number in rectangle".to_string(),
        )),
    }
}
