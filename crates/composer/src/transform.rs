//! Percent space <-> page space conversion
//!
//! Percent space has its origin at the top-left with both axes in 0..=100;
//! page space has its origin at the bottom-left in the page's native units.

use crate::document::DocumentHandle;
use crate::schema::{PageGeometry, PercentRect, PixelRect};
use crate::{ComposeError, Result};

/// Convert a percent-space point to page space
pub fn percent_to_pixel(percent_x: f64, percent_y: f64, page: &PageGeometry) -> (f64, f64) {
    let x = percent_x / 100.0 * page.width;
    let y = page.height - percent_y / 100.0 * page.height;
    (x, y)
}

/// Convert a page-space point back to percent space
pub fn pixel_to_percent(pixel_x: f64, pixel_y: f64, page: &PageGeometry) -> (f64, f64) {
    let x = pixel_x / page.width * 100.0;
    let y = (page.height - pixel_y) / page.height * 100.0;
    (x, y)
}

/// Page geometry snapshot of one document
#[derive(Debug, Clone, Default)]
pub struct CoordinateTransformer {
    pages: Vec<PageGeometry>,
}

impl CoordinateTransformer {
    pub fn new(pages: Vec<PageGeometry>) -> Self {
        Self { pages }
    }

    /// Capture the geometry of every page the document reports
    pub fn from_document<D: DocumentHandle + ?Sized>(doc: &D) -> Self {
        let pages = (0..doc.page_count())
            .map_while(|index| doc.page_geometry(index))
            .collect();
        Self { pages }
    }

    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    pub fn geometry(&self, page_index: usize) -> Result<PageGeometry> {
        self.pages
            .get(page_index)
            .copied()
            .ok_or(ComposeError::InvalidPage {
                index: page_index,
                page_count: self.pages.len(),
            })
    }

    pub fn to_pixel(&self, page_index: usize, percent_x: f64, percent_y: f64) -> Result<(f64, f64)> {
        let page = self.geometry(page_index)?;
        Ok(percent_to_pixel(percent_x, percent_y, &page))
    }

    pub fn to_percent(&self, page_index: usize, pixel_x: f64, pixel_y: f64) -> Result<(f64, f64)> {
        let page = self.geometry(page_index)?;
        Ok(pixel_to_percent(pixel_x, pixel_y, &page))
    }

    /// Convert a percent box to page space
    ///
    /// The returned rectangle's `y` is the flipped top edge, i.e. the box
    /// spans `y - height ..= y` in page space.
    pub fn box_to_pixel(&self, page_index: usize, rect: &PercentRect) -> Result<PixelRect> {
        let page = self.geometry(page_index)?;
        let (x, y) = percent_to_pixel(rect.x, rect.y, &page);
        Ok(PixelRect::new(
            x,
            y,
            rect.width / 100.0 * page.width,
            rect.height / 100.0 * page.height,
        ))
    }
}
