//! PDF loading and embedded-image extraction using lopdf.
//!
//! Used for page counting and as the rendering fallback when `pdftoppm` is unavailable:
//! scanned invoices are usually one full-page image per page.

use image::{DynamicImage, GenericImageView, ImageBuffer, Rgba};
use lopdf::{Document, Object, ObjectId};
use tracing::{debug, trace};

use crate::error::RasterError;

/// A loaded PDF document.
pub struct PdfDocument {
    document: Document,
}

impl PdfDocument {
    /// Load a PDF from bytes, decrypting documents protected by an empty password.
    pub fn load(data: &[u8]) -> Result<Self, RasterError> {
        let mut document =
            Document::load_mem(data).map_err(|e| RasterError::Parse(e.to_string()))?;

        if document.is_encrypted() {
            if document.decrypt("").is_err() {
                return Err(RasterError::Encrypted);
            }
            debug!("Decrypted PDF with empty password");
        }

        if document.get_pages().is_empty() {
            return Err(RasterError::NoPages);
        }

        debug!("Loaded PDF with {} pages", document.get_pages().len());
        Ok(Self { document })
    }

    pub fn page_count(&self) -> u32 {
        self.document.get_pages().len() as u32
    }

    /// Largest embedded image on a page (1-indexed), if any.
    pub fn page_image(&self, page: u32) -> Option<DynamicImage> {
        let doc = &self.document;
        let page_id = *doc.get_pages().get(&page)?;
        let resources = self.page_resources(page_id)?;
        let xobjects = resources.get(b"XObject").ok()?;
        let Ok((_, Object::Dictionary(xobj_dict))) = doc.dereference(xobjects) else {
            return None;
        };

        let largest = xobj_dict
            .iter()
            .filter_map(|(_, obj_ref)| doc.dereference(obj_ref).ok())
            .filter_map(|(_, obj)| self.decode_image(obj))
            .max_by_key(|img| {
                let (w, h) = img.dimensions();
                u64::from(w) * u64::from(h)
            });

        if largest.is_none() {
            trace!("No decodable image XObject on page {}", page);
        }
        largest
    }

    fn decode_image(&self, obj: &Object) -> Option<DynamicImage> {
        let Object::Stream(stream) = obj else {
            return None;
        };
        let dict = &stream.dict;

        if dict.get(b"Subtype").ok()?.as_name().ok()? != b"Image" {
            return None;
        }

        let width = dict.get(b"Width").ok()?.as_i64().ok()? as u32;
        let height = dict.get(b"Height").ok()?.as_i64().ok()? as u32;
        trace!("Found image object: {}x{}", width, height);

        let filter = dict.get(b"Filter").ok().and_then(|f| match f {
            Object::Name(name) => Some(name.as_slice()),
            Object::Array(arr) => arr.first().and_then(|o| o.as_name().ok()),
            _ => None,
        });

        match filter {
            Some(b"DCTDecode") => {
                return image::load_from_memory_with_format(
                    &stream.content,
                    image::ImageFormat::Jpeg,
                )
                .ok();
            }
            Some(b"JPXDecode") | Some(b"CCITTFaxDecode") | Some(b"JBIG2Decode") => {
                trace!("Unsupported image filter");
                return None;
            }
            _ => {}
        }

        let data = stream
            .decompressed_content()
            .unwrap_or_else(|_| stream.content.clone());

        let color_space = dict
            .get(b"ColorSpace")
            .ok()
            .and_then(|o| match o {
                Object::Name(name) => Some(name.as_slice()),
                Object::Array(arr) => arr.first().and_then(|o| o.as_name().ok()),
                Object::Reference(r) => self
                    .document
                    .get_object(*r)
                    .ok()
                    .and_then(|o| o.as_name().ok()),
                _ => None,
            })
            .unwrap_or(b"DeviceRGB");

        let bits = dict
            .get(b"BitsPerComponent")
            .ok()
            .and_then(|o| o.as_i64().ok())
            .unwrap_or(8);

        if bits != 8 {
            trace!("Unsupported bits per component: {}", bits);
            return None;
        }

        raw_to_image(&data, width, height, color_space)
    }

    /// Resources dictionary for a page, following inheritance up the page tree.
    fn page_resources(&self, node_id: ObjectId) -> Option<lopdf::Dictionary> {
        let doc = &self.document;
        let Object::Dictionary(dict) = doc.get_object(node_id).ok()? else {
            return None;
        };

        if let Ok(resources) = dict.get(b"Resources") {
            if let Ok((_, Object::Dictionary(res_dict))) = doc.dereference(resources) {
                return Some(res_dict.clone());
            }
        }

        match dict.get(b"Parent") {
            Ok(Object::Reference(parent_id)) => self.page_resources(*parent_id),
            _ => None,
        }
    }
}

fn raw_to_image(data: &[u8], width: u32, height: u32, color_space: &[u8]) -> Option<DynamicImage> {
    let pixels = (width as usize) * (height as usize);
    let mut rgba = Vec::with_capacity(pixels * 4);

    match color_space {
        b"DeviceRGB" | b"RGB" if data.len() >= pixels * 3 => {
            for chunk in data[..pixels * 3].chunks_exact(3) {
                rgba.extend_from_slice(&[chunk[0], chunk[1], chunk[2], 255]);
            }
        }
        b"DeviceGray" | b"G" if data.len() >= pixels => {
            for &gray in &data[..pixels] {
                rgba.extend_from_slice(&[gray, gray, gray, 255]);
            }
        }
        _ => {
            trace!(
                "Could not decode image: data_len={}, colorspace={:?}",
                data.len(),
                String::from_utf8_lossy(color_space)
            );
            return None;
        }
    }

    ImageBuffer::<Rgba<u8>, _>::from_raw(width, height, rgba).map(DynamicImage::ImageRgba8)
}
