use crate::constants::{cm_to_mm, cm_to_pt};
use crate::types::{LabelError, Result};
use printpdf::*;

use super::{LabelSheet, PlacedLabel};

/// Nominal image resolution; the transform scales to the exact cell size.
const IMAGE_DPI: f32 = 300.0;

/// Write the sheet as a multi-page PDF, one A4 page per sheet page.
pub fn render_pdf_bytes(sheet: &LabelSheet) -> Result<Vec<u8>> {
    let mut doc = PdfDocument::new("Box labels");
    let page_width = Mm(cm_to_mm(sheet.page.width_cm));
    let page_height = Mm(cm_to_mm(sheet.page.height_cm));
    let page_height_pt = cm_to_pt(sheet.page.height_cm);

    let mut pages = Vec::with_capacity(sheet.pages.len());
    for page in &sheet.pages {
        let mut ops = Vec::with_capacity(page.labels.len());
        for placed in &page.labels {
            ops.push(place_label(&mut doc, placed, page_height_pt)?);
        }
        pages.push(PdfPage::new(page_width, page_height, ops));
    }

    doc.pages.extend(pages);

    let mut warnings = Vec::new();
    let bytes = doc.save(&PdfSaveOptions::default(), &mut warnings);
    if !warnings.is_empty() {
        log::debug!("PDF writer reported {} warning(s)", warnings.len());
    }
    Ok(bytes)
}

fn place_label(doc: &mut PdfDocument, placed: &PlacedLabel, page_height_pt: f32) -> Result<Op> {
    let bitmap = &placed.bitmap;
    let (width_px, height_px) = (bitmap.width(), bitmap.height());
    if width_px == 0 || height_px == 0 {
        return Err(LabelError::Pdf(format!(
            "label for slot {} has no pixels",
            placed.slot
        )));
    }

    let raw = RawImage {
        pixels: RawImageData::U8(bitmap.to_rgb().into_raw()),
        width: width_px as usize,
        height: height_px as usize,
        data_format: RawImageFormat::RGB8,
        tag: Vec::new(),
    };
    let id = doc.add_image(&raw);

    // Natural size at IMAGE_DPI, then scaled onto the fitted rect
    let natural_w_pt = width_px as f32 / IMAGE_DPI * 72.0;
    let natural_h_pt = height_px as f32 / IMAGE_DPI * 72.0;
    let fitted = placed.fitted;

    // PDF origin is bottom-left
    let x_pt = cm_to_pt(fitted.x);
    let y_pt = page_height_pt - cm_to_pt(fitted.bottom());

    Ok(Op::UseXobject {
        id,
        transform: XObjectTransform {
            translate_x: Some(Pt(x_pt)),
            translate_y: Some(Pt(y_pt)),
            scale_x: Some(cm_to_pt(fitted.width) / natural_w_pt),
            scale_y: Some(cm_to_pt(fitted.height) / natural_h_pt),
            dpi: Some(IMAGE_DPI),
            rotate: None,
        },
    })
}
