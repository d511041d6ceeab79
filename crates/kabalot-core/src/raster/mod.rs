//! Document rasterization: input files to ordered page images.

mod pdf;

pub use pdf::PdfDocument;

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::process::Command;

use image::DynamicImage;
use tempfile::TempDir;
use tracing::{debug, info, warn};

use crate::error::{KabalotError, RasterError, Result};
use crate::models::config::RasterConfig;

/// Declared input type, derived from the file extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentKind {
    /// Multi-page document (PDF).
    Paginated,
    /// Single raster image.
    Image,
}

impl DocumentKind {
    /// Classify a file by extension, rejecting anything else.
    pub fn classify(path: &Path) -> Result<Self> {
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("")
            .to_lowercase();

        match extension.as_str() {
            "pdf" => Ok(DocumentKind::Paginated),
            "jpg" | "jpeg" | "png" | "webp" | "tif" | "tiff" | "bmp" | "gif" => {
                Ok(DocumentKind::Image)
            }
            _ => Err(KabalotError::UnsupportedFormat {
                path: path.to_path_buf(),
                extension,
            }),
        }
    }
}

/// One rendered page, alive only until it has been sent for extraction.
#[derive(Debug, Clone)]
pub struct PageImage {
    /// Zero-based page index.
    pub index: usize,
    /// File the page came from.
    pub source: PathBuf,
    pub image: DynamicImage,
}

/// Turns PDFs and images into page images.
pub struct DocumentRasterizer {
    config: RasterConfig,
}

impl DocumentRasterizer {
    pub fn new(config: RasterConfig) -> Self {
        Self { config }
    }

    /// Rasterize a document into pages, in page order.
    pub fn rasterize(&self, path: &Path) -> Result<Vec<PageImage>> {
        let kind = DocumentKind::classify(path)?;
        debug!(file = %path.display(), ?kind, "Rasterizing");

        let images = match kind {
            DocumentKind::Paginated => self.rasterize_pdf(path)?,
            DocumentKind::Image => vec![image::open(path).map_err(RasterError::from)?],
        };

        info!(file = %path.display(), pages = images.len(), "Rasterized document");

        Ok(images
            .into_iter()
            .enumerate()
            .map(|(index, image)| PageImage {
                index,
                source: path.to_path_buf(),
                image,
            })
            .collect())
    }

    fn rasterize_pdf(&self, path: &Path) -> std::result::Result<Vec<DynamicImage>, RasterError> {
        let data = std::fs::read(path)?;
        let document = PdfDocument::load(&data)?;
        let page_count = document.page_count();

        if let Some(pages) = self.render_with_pdftoppm(path, page_count)? {
            return Ok(pages);
        }

        warn!(
            renderer = %self.config.pdftoppm.display(),
            "Page renderer not found, falling back to embedded page images"
        );
        (1..=page_count)
            .map(|page| {
                document
                    .page_image(page)
                    .ok_or(RasterError::NoImage { page })
            })
            .collect()
    }

    /// Render every page with `pdftoppm` into a scratch directory.
    ///
    /// Returns `Ok(None)` when the renderer is not installed. The scratch directory is removed
    /// when this function returns, whatever the outcome.
    fn render_with_pdftoppm(
        &self,
        path: &Path,
        page_count: u32,
    ) -> std::result::Result<Option<Vec<DynamicImage>>, RasterError> {
        let scratch = match &self.config.scratch_dir {
            Some(dir) => TempDir::with_prefix_in("kabalot-pages-", dir)?,
            None => TempDir::with_prefix("kabalot-pages-")?,
        };
        let prefix = scratch.path().join("page");

        let output = match Command::new(&self.config.pdftoppm)
            .arg("-r")
            .arg(self.config.render_dpi.to_string())
            .arg("-png")
            .arg(path)
            .arg(&prefix)
            .output()
        {
            Ok(output) => output,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(RasterError::Renderer(stderr.trim().to_string()));
        }

        let mut rendered: Vec<(u32, PathBuf)> = std::fs::read_dir(scratch.path())?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter_map(|p| rendered_page_number(&p).map(|n| (n, p)))
            .collect();
        rendered.sort_by_key(|(n, _)| *n);

        if rendered.len() != page_count as usize {
            return Err(RasterError::Renderer(format!(
                "expected {} pages, renderer produced {}",
                page_count,
                rendered.len()
            )));
        }

        let pages = rendered
            .iter()
            .map(|(_, p)| image::open(p))
            .collect::<std::result::Result<Vec<_>, _>>()?;

        debug!(pages = pages.len(), dpi = self.config.render_dpi, "Rendered PDF pages");
        Ok(Some(pages))
    }
}

/// Page number from a `pdftoppm` output name such as `page-03.png`.
fn rendered_page_number(path: &Path) -> Option<u32> {
    if path.extension()?.to_str()? != "png" {
        return None;
    }
    let stem = path.file_stem()?.to_str()?;
    stem.rsplit('-').next()?.parse().ok()
}
