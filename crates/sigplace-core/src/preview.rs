//! Placement preview rasterizer
//!
//! Renders which device pixels of a page are covered by image XObjects at a
//! given scale, in the same top-left pixel space the signing canvas uses.
//! Only image footprints are rasterized; text and vector paint are ignored.

use std::collections::HashSet;
use std::sync::OnceLock;

use lopdf::content::{Content, Operation};
use lopdf::{Dictionary, Document, Object, ObjectId};
use serde::Serialize;
use tracing::debug;

use crate::coords::check_scale;
use crate::error::{Result, SignPlaceError};
use crate::parser::{extract_number, inherited_attribute, media_box, resolve, PdfDocument};

/// Environment variable overriding the pixel budget for a single render
pub const MAX_PIXELS_ENV: &str = "SIGPLACE_MAX_RASTER_PIXELS";

static LIMITS: OnceLock<RasterLimits> = OnceLock::new();

/// Deepest Form XObject nesting followed before giving up
const MAX_FORM_DEPTH: usize = 16;

/// Content operations walked per render, across all nested forms
const OPERATION_BUDGET: usize = 1_000_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RasterLimits {
    pub max_pixels: u64,
}

impl RasterLimits {
    pub const DEFAULT_MAX_PIXELS: u64 = 40_000_000;

    fn from_env() -> Self {
        let max_pixels = std::env::var(MAX_PIXELS_ENV)
            .ok()
            .and_then(|v| v.trim().parse::<u64>().ok())
            .filter(|&n| n > 0)
            .unwrap_or(Self::DEFAULT_MAX_PIXELS);
        debug!(max_pixels, "raster limits initialized");
        Self { max_pixels }
    }
}

/// Process-wide raster limits, read from the environment on first use
pub fn limits() -> &'static RasterLimits {
    LIMITS.get_or_init(RasterLimits::from_env)
}

/// Integer pixel rectangle, top-left origin
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PixelRect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl PixelRect {
    pub fn right(&self) -> u32 {
        self.x + self.width
    }

    pub fn bottom(&self) -> u32 {
        self.y + self.height
    }
}

/// Coverage mask of one rendered page
#[derive(Debug, Clone)]
pub struct PageRaster {
    pub width: u32,
    pub height: u32,
    pub scale: f64,
    /// One entry per image draw, in paint order
    pub placements: Vec<PixelRect>,
    coverage: Vec<bool>,
}

impl PageRaster {
    fn new(width: u32, height: u32, scale: f64) -> Self {
        Self {
            width,
            height,
            scale,
            placements: Vec::new(),
            coverage: vec![false; width as usize * height as usize],
        }
    }

    pub fn is_covered(&self, x: u32, y: u32) -> bool {
        if x >= self.width || y >= self.height {
            return false;
        }
        self.coverage[y as usize * self.width as usize + x as usize]
    }

    pub fn covered_pixels(&self) -> usize {
        self.coverage.iter().filter(|&&c| c).count()
    }

    /// Smallest rectangle containing every covered pixel
    pub fn covered_bounds(&self) -> Option<PixelRect> {
        let width = self.width as usize;
        let mut bounds: Option<(usize, usize, usize, usize)> = None;
        for (i, _) in self.coverage.iter().enumerate().filter(|(_, &c)| c) {
            let (x, y) = (i % width, i / width);
            bounds = Some(match bounds {
                None => (x, y, x, y),
                Some((x0, y0, x1, y1)) => (x0.min(x), y0.min(y), x1.max(x), y1.max(y)),
            });
        }
        bounds.map(|(x0, y0, x1, y1)| PixelRect {
            x: x0 as u32,
            y: y0 as u32,
            width: (x1 - x0 + 1) as u32,
            height: (y1 - y0 + 1) as u32,
        })
    }

    /// Mark every pixel whose center lies inside the device-space box
    fn fill(&mut self, left: f64, top: f64, right: f64, bottom: f64) {
        let to_col = |v: f64, max: u32| (v - 0.5).ceil().clamp(0.0, max as f64) as u32;
        let (x0, x1) = (to_col(left, self.width), to_col(right, self.width));
        let (y0, y1) = (to_col(top, self.height), to_col(bottom, self.height));
        if x0 >= x1 || y0 >= y1 {
            return;
        }

        for y in y0..y1 {
            let row = y as usize * self.width as usize;
            self.coverage[row + x0 as usize..row + x1 as usize].fill(true);
        }
        self.placements.push(PixelRect {
            x: x0,
            y: y0,
            width: x1 - x0,
            height: y1 - y0,
        });
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
struct Matrix {
    a: f64,
    b: f64,
    c: f64,
    d: f64,
    e: f64,
    f: f64,
}

impl Matrix {
    fn identity() -> Self {
        Self {
            a: 1.0,
            b: 0.0,
            c: 0.0,
            d: 1.0,
            e: 0.0,
            f: 0.0,
        }
    }

    /// `self` applied first, then `rhs`
    fn concat(self, rhs: Self) -> Self {
        Self {
            a: self.a * rhs.a + self.b * rhs.c,
            b: self.a * rhs.b + self.b * rhs.d,
            c: self.c * rhs.a + self.d * rhs.c,
            d: self.c * rhs.b + self.d * rhs.d,
            e: self.e * rhs.a + self.f * rhs.c + rhs.e,
            f: self.e * rhs.b + self.f * rhs.d + rhs.f,
        }
    }

    fn transform_point(self, x: f64, y: f64) -> (f64, f64) {
        (
            self.a * x + self.c * y + self.e,
            self.b * x + self.d * y + self.f,
        )
    }

    /// Bounding box of the unit square as (left, bottom, right, top)
    fn unit_square_bounds(self) -> (f64, f64, f64, f64) {
        let corners = [
            self.transform_point(0.0, 0.0),
            self.transform_point(1.0, 0.0),
            self.transform_point(0.0, 1.0),
            self.transform_point(1.0, 1.0),
        ];
        corners.iter().fold(
            (f64::INFINITY, f64::INFINITY, f64::NEG_INFINITY, f64::NEG_INFINITY),
            |(l, b, r, t), &(x, y)| (l.min(x), b.min(y), r.max(x), t.max(y)),
        )
    }

    fn from_array(doc: &Document, obj: &Object) -> Option<Self> {
        let arr = resolve(doc, obj).ok()?.as_array().ok()?;
        if arr.len() != 6 {
            return None;
        }
        let mut v = [0.0; 6];
        for (slot, item) in v.iter_mut().zip(arr) {
            *slot = extract_number(doc, item).ok()?;
        }
        Some(Self {
            a: v[0],
            b: v[1],
            c: v[2],
            d: v[3],
            e: v[4],
            f: v[5],
        })
    }
}

/// Maps user space to device pixels for one page
struct Device {
    origin_x: f64,
    top: f64,
    scale: f64,
}

struct Walker<'a> {
    doc: &'a Document,
    device: Device,
    raster: PageRaster,
    /// Forms currently being walked; its size is the nesting depth
    visited_forms: HashSet<ObjectId>,
    operations_left: usize,
}

/// Rasterize the image footprints of `page` (1-based) at `scale`
///
/// The raster is `ceil(width * scale)` by `ceil(height * scale)` pixels,
/// which is the backing-store size of a canvas rendered at that scale.
pub fn render_page(pdf_bytes: &[u8], page: u32, scale: f64) -> Result<PageRaster> {
    check_scale(scale)?;
    if page == 0 {
        return Err(SignPlaceError::InvalidArgument(
            "page numbers are 1-based, got 0".to_string(),
        ));
    }

    let pdf = PdfDocument::from_bytes(pdf_bytes)?;
    let page_id = pdf.page_id(page).ok_or(SignPlaceError::PageOutOfRange {
        page,
        page_count: pdf.page_count(),
    })?;
    let doc = pdf.doc();

    let [mx, my, mw, mh] = media_box(doc, page_id)?;
    let width = (mw * scale).ceil();
    let height = (mh * scale).ceil();
    let max_pixels = limits().max_pixels;
    if width * height > max_pixels as f64 {
        return Err(SignPlaceError::InvalidArgument(format!(
            "render of {}x{} pixels exceeds the limit of {}",
            width, height, max_pixels
        )));
    }

    let resources = page_resources(doc, page_id)?;
    let bytes = doc
        .get_page_content(page_id)
        .map_err(|e| SignPlaceError::MalformedDocument(format!("page content: {}", e)))?;
    let content = Content::decode(&bytes)
        .map_err(|e| SignPlaceError::MalformedDocument(format!("content stream: {}", e)))?;

    let mut walker = Walker {
        doc,
        device: Device {
            origin_x: mx,
            top: my + mh,
            scale,
        },
        raster: PageRaster::new(width as u32, height as u32, scale),
        visited_forms: HashSet::new(),
        operations_left: OPERATION_BUDGET,
    };
    walker.run(&content.operations, &resources, Matrix::identity())?;

    debug!(
        page,
        width = walker.raster.width,
        height = walker.raster.height,
        images = walker.raster.placements.len(),
        "rendered page preview"
    );
    Ok(walker.raster)
}

impl Walker<'_> {
    fn run(&mut self, operations: &[Operation], resources: &Dictionary, base: Matrix) -> Result<()> {
        let mut ctm = base;
        let mut stack: Vec<Matrix> = Vec::new();

        for op in operations {
            self.operations_left = self.operations_left.checked_sub(1).ok_or_else(|| {
                SignPlaceError::MalformedDocument(format!(
                    "page content exceeds {} operations",
                    OPERATION_BUDGET
                ))
            })?;
            match op.operator.as_str() {
                "q" => stack.push(ctm),
                "Q" => {
                    if let Some(prev) = stack.pop() {
                        ctm = prev;
                    }
                }
                "cm" => {
                    if let Some(m) = op_matrix(op) {
                        ctm = m.concat(ctm);
                    }
                }
                "Do" => {
                    let name = match op.operands.first().and_then(|o| o.as_name().ok()) {
                        Some(name) => name,
                        None => continue,
                    };
                    if let Some(id) = xobject_id(self.doc, resources, name) {
                        self.draw_xobject(id, resources, ctm)?;
                    }
                }
                _ => {}
            }
        }
        Ok(())
    }

    fn draw_xobject(&mut self, id: ObjectId, parent: &Dictionary, ctm: Matrix) -> Result<()> {
        let doc = self.doc;
        let stream = match doc.get_object(id).and_then(Object::as_stream) {
            Ok(stream) => stream,
            Err(_) => return Ok(()),
        };
        let subtype = stream
            .dict
            .get(b"Subtype")
            .and_then(Object::as_name)
            .unwrap_or(&b""[..]);

        match subtype {
            b"Image" => {
                let (l, b, r, t) = ctm.unit_square_bounds();
                let d = &self.device;
                let left = (l - d.origin_x) * d.scale;
                let right = (r - d.origin_x) * d.scale;
                let top = (d.top - t) * d.scale;
                let bottom = (d.top - b) * d.scale;
                self.raster.fill(left, top, right, bottom);
            }
            b"Form" => {
                if self.visited_forms.len() >= MAX_FORM_DEPTH {
                    return Err(SignPlaceError::MalformedDocument(format!(
                        "form XObjects nested deeper than {}",
                        MAX_FORM_DEPTH
                    )));
                }
                if !self.visited_forms.insert(id) {
                    return Ok(());
                }
                // Unfiltered streams have nothing to decompress
                let bytes = stream
                    .decompressed_content()
                    .unwrap_or_else(|_| stream.content.clone());
                let content = Content::decode(&bytes).map_err(|e| {
                    SignPlaceError::MalformedDocument(format!("form content stream: {}", e))
                })?;
                let resources = match stream.dict.get(b"Resources") {
                    Ok(obj) => match resolve(doc, obj)? {
                        Object::Dictionary(dict) => dict.clone(),
                        _ => parent.clone(),
                    },
                    Err(_) => parent.clone(),
                };
                let form_matrix = stream
                    .dict
                    .get(b"Matrix")
                    .ok()
                    .and_then(|m| Matrix::from_array(doc, m))
                    .unwrap_or_else(Matrix::identity);

                self.run(&content.operations, &resources, form_matrix.concat(ctm))?;
                self.visited_forms.remove(&id);
            }
            _ => {}
        }
        Ok(())
    }
}

fn page_resources(doc: &Document, page_id: ObjectId) -> Result<Dictionary> {
    match inherited_attribute(doc, page_id, b"Resources")? {
        Some(obj) => match resolve(doc, obj)? {
            Object::Dictionary(resources) => Ok(resources.clone()),
            _ => Ok(Dictionary::new()),
        },
        None => Ok(Dictionary::new()),
    }
}

fn xobject_id(doc: &Document, resources: &Dictionary, name: &[u8]) -> Option<ObjectId> {
    let xobjects = resolve(doc, resources.get(b"XObject").ok()?).ok()?;
    xobjects.as_dict().ok()?.get(name).ok()?.as_reference().ok()
}

fn op_matrix(op: &Operation) -> Option<Matrix> {
    if op.operands.len() != 6 {
        return None;
    }
    let mut v = [0.0; 6];
    for (slot, obj) in v.iter_mut().zip(&op.operands) {
        *slot = match obj {
            Object::Integer(i) => *i as f64,
            Object::Real(r) => *r as f64,
            _ => return None,
        };
    }
    Some(Matrix {
        a: v[0],
        b: v[1],
        c: v[2],
        d: v[3],
        e: v[4],
        f: v[5],
    })
}
