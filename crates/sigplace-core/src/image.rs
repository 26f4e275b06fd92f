//! Signature image decoding
//!
//! Signatures arrive as `data:image/png;base64,...` URLs produced by the
//! signing canvas. They are decoded to 8-bit RGB samples plus an optional
//! alpha plane, which map directly onto a PDF image XObject and its SMask.

use std::io::Write;

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use flate2::{write::ZlibEncoder, Compression};
use lopdf::{dictionary, Document, Object, ObjectId, Stream};

use crate::error::{Result, SignPlaceError};

const PNG_MAGIC: [u8; 8] = [0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A];

/// A decoded raster signature
#[derive(Debug, Clone, PartialEq)]
pub struct SignatureImage {
    pub width: u32,
    pub height: u32,
    /// Interleaved 8-bit RGB samples, row-major
    pub rgb: Vec<u8>,
    /// 8-bit alpha plane, `None` when every pixel is opaque
    pub alpha: Option<Vec<u8>>,
}

impl SignatureImage {
    /// Decode a `data:image/png;base64,<payload>` URL
    pub fn from_data_url(data_url: &str) -> Result<Self> {
        let png = decode_data_url(data_url)?;
        Self::from_png(&png)
    }

    /// Decode raw PNG bytes
    pub fn from_png(bytes: &[u8]) -> Result<Self> {
        if !bytes.starts_with(&PNG_MAGIC) {
            return Err(SignPlaceError::InvalidImageData(
                "payload is not a PNG image".to_string(),
            ));
        }

        let mut decoder = png::Decoder::new(bytes);
        // Palette and low bit depths expand to 8 bits, 16-bit samples are stripped
        decoder.set_transformations(png::Transformations::EXPAND | png::Transformations::STRIP_16);
        let mut reader = decoder
            .read_info()
            .map_err(|e| SignPlaceError::InvalidImageData(format!("PNG header: {}", e)))?;
        let mut buf = vec![0; reader.output_buffer_size()];
        let info = reader
            .next_frame(&mut buf)
            .map_err(|e| SignPlaceError::InvalidImageData(format!("PNG data: {}", e)))?;

        if info.width == 0 || info.height == 0 {
            return Err(SignPlaceError::InvalidImageData(
                "PNG has zero dimensions".to_string(),
            ));
        }

        let pixel_count = info.width as usize * info.height as usize;
        let mut rgb = Vec::with_capacity(pixel_count * 3);
        let mut alpha = Vec::with_capacity(pixel_count);

        // Rows can carry padding beyond width * channels
        let channels = match info.color_type {
            png::ColorType::Grayscale => 1,
            png::ColorType::GrayscaleAlpha => 2,
            png::ColorType::Rgb => 3,
            png::ColorType::Rgba => 4,
            png::ColorType::Indexed => {
                return Err(SignPlaceError::InvalidImageData(
                    "indexed PNG was not expanded".to_string(),
                ))
            }
        };
        let row_bytes = info.width as usize * channels;
        for row in buf.chunks(info.line_size).take(info.height as usize) {
            for px in row[..row_bytes].chunks_exact(channels) {
                match channels {
                    1 => {
                        rgb.extend_from_slice(&[px[0], px[0], px[0]]);
                        alpha.push(255);
                    }
                    2 => {
                        rgb.extend_from_slice(&[px[0], px[0], px[0]]);
                        alpha.push(px[1]);
                    }
                    3 => {
                        rgb.extend_from_slice(px);
                        alpha.push(255);
                    }
                    _ => {
                        rgb.extend_from_slice(&px[..3]);
                        alpha.push(px[3]);
                    }
                }
            }
        }

        let alpha = if alpha.iter().all(|&a| a == 255) {
            None
        } else {
            Some(alpha)
        };

        Ok(Self {
            width: info.width,
            height: info.height,
            rgb,
            alpha,
        })
    }

    /// Add this image (and its soft mask) to `doc` as image XObjects
    pub fn add_to_document(&self, doc: &mut Document, compress: bool) -> Result<ObjectId> {
        let smask_id = match &self.alpha {
            Some(alpha) => {
                let stream = image_stream(self.width, self.height, "DeviceGray", alpha, compress)?;
                Some(doc.add_object(stream))
            }
            None => None,
        };

        let mut stream = image_stream(self.width, self.height, "DeviceRGB", &self.rgb, compress)?;
        if let Some(id) = smask_id {
            stream.dict.set("SMask", Object::Reference(id));
        }
        Ok(doc.add_object(stream))
    }
}

/// Extract and base64-decode the payload of a data URL
pub fn decode_data_url(data_url: &str) -> Result<Vec<u8>> {
    let (header, payload) = data_url.split_once(',').ok_or_else(|| {
        SignPlaceError::InvalidImageData("not a data URL: missing ','".to_string())
    })?;

    let meta = header.trim().strip_prefix("data:").ok_or_else(|| {
        SignPlaceError::InvalidImageData("not a data URL: missing 'data:' scheme".to_string())
    })?;
    let mut params = meta.split(';');
    let media_type = params.next().unwrap_or("").trim();
    if !media_type.is_empty() && !media_type.eq_ignore_ascii_case("image/png") {
        return Err(SignPlaceError::InvalidImageData(format!(
            "unsupported media type '{}'",
            media_type
        )));
    }
    if !params.any(|p| p.trim().eq_ignore_ascii_case("base64")) {
        return Err(SignPlaceError::InvalidImageData(
            "data URL is not base64-encoded".to_string(),
        ));
    }

    let compact: String = payload.chars().filter(|c| !c.is_ascii_whitespace()).collect();
    BASE64
        .decode(compact.as_bytes())
        .map_err(|e| SignPlaceError::InvalidImageData(format!("base64: {}", e)))
}

fn image_stream(
    width: u32,
    height: u32,
    color_space: &str,
    samples: &[u8],
    compress: bool,
) -> Result<Stream> {
    let mut dict = dictionary! {
        "Type" => "XObject",
        "Subtype" => "Image",
        "Width" => width as i64,
        "Height" => height as i64,
        "ColorSpace" => color_space,
        "BitsPerComponent" => 8,
    };

    let content = if compress {
        let compression_err =
            |e: std::io::Error| SignPlaceError::Serialization(format!("image compression: {}", e));
        let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(samples).map_err(compression_err)?;
        let data = encoder.finish().map_err(compression_err)?;
        dict.set("Filter", "FlateDecode");
        data
    } else {
        samples.to_vec()
    };

    let mut stream = Stream::new(dict, content);
    // Already encoded (or deliberately raw)
    stream.allows_compression = false;
    Ok(stream)
}
