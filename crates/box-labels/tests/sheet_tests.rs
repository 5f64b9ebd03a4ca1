use box_labels::*;
use lopdf::content::Content;
use lopdf::{Document, Object};
use std::sync::Arc;

fn microapp() -> LabelPreset {
    PresetRegistry::builtin()
        .resolve(DEFAULT_PRESET_ID)
        .unwrap()
        .clone()
}

fn items(count: usize) -> Vec<PrintableItem> {
    (0..count)
        .map(|i| PrintableItem::new(format!("id-{i}"), format!("BOX-{:03}", i + 1)))
        .collect()
}

async fn sheet_for(count: usize, start_offset: usize) -> LabelSheet {
    let preset = microapp();
    let options = PrintOptions {
        qr_fallback_base_url: Some("https://boxes.example".to_string()),
        ..Default::default()
    };
    let pipeline = LabelPipeline::new(
        Arc::new(SurfaceRasterizer::default()),
        QrResolver::default().with_fallback_base_url(options.qr_fallback_base_url.clone()),
    )
    .with_options(&options);
    let batch = pipeline
        .generate(&preset, &items(count), start_offset)
        .await
        .unwrap();
    assemble(&preset, batch).unwrap()
}

fn count_images(doc: &Document) -> usize {
    doc.objects
        .values()
        .filter(|object| match object {
            Object::Stream(stream) => stream
                .dict
                .get(b"Subtype")
                .and_then(|subtype| subtype.as_name())
                .is_ok_and(|name| name == b"Image"),
            _ => false,
        })
        .count()
}

#[tokio::test]
async fn test_pdf_has_one_page_per_sheet_page() {
    let sheet = sheet_for(30, 0).await;
    assert_eq!(sheet.page_count(), 2);
    assert_eq!(sheet.label_count(), 30);

    let bytes = sheet::render_pdf_bytes(&sheet).unwrap();
    let doc = Document::load_mem(&bytes).unwrap();
    assert_eq!(doc.get_pages().len(), 2);
    assert_eq!(count_images(&doc), 30);
}

/// Combined transform of every `cm` operator on the page
fn page_ctm(doc: &Document, page_id: lopdf::ObjectId) -> [f32; 6] {
    let content = Content::decode(&doc.get_page_content(page_id).unwrap()).unwrap();
    content
        .operations
        .iter()
        .filter(|op| op.operator == "cm")
        .fold([1.0, 0.0, 0.0, 1.0, 0.0, 0.0], |ctm, op| {
            let m: Vec<f32> = op.operands.iter().map(|o| o.as_float().unwrap()).collect();
            [
                m[0] * ctm[0] + m[1] * ctm[2],
                m[0] * ctm[1] + m[1] * ctm[3],
                m[2] * ctm[0] + m[3] * ctm[2],
                m[2] * ctm[1] + m[3] * ctm[3],
                m[4] * ctm[0] + m[5] * ctm[2] + ctm[4],
                m[4] * ctm[1] + m[5] * ctm[3] + ctm[5],
            ]
        })
}

#[tokio::test]
async fn test_pdf_places_label_at_slot_cell() {
    // Slot 7 on the 8x3 sheet is row 2, col 1
    let sheet = sheet_for(1, 7).await;
    let bytes = sheet::render_pdf_bytes(&sheet).unwrap();
    let doc = Document::load_mem(&bytes).unwrap();
    let page_id = *doc.get_pages().get(&1).unwrap();

    let [a, b, c, d, e, f] = page_ctm(&doc, page_id);
    let pt = constants::cm_to_pt;
    let page_height = pt(constants::A4_HEIGHT_CM);

    assert!(b.abs() < 1e-3 && c.abs() < 1e-3, "label must not be rotated");
    // Left edge at x = 1.2 + 1 * (6.05 + 0.2) = 7.45cm
    assert!((e - pt(7.45)).abs() < 0.5, "x = {e}");
    // Top edge at y = 2.35 + 2 * (2.96 + 0.2) = 8.67cm from the top of the page
    assert!((f + d - (page_height - pt(8.67))).abs() < 0.5, "top = {}", f + d);
    // Scaled to the label size, never past the cell
    assert!((a - pt(6.05)).abs() < 0.5, "width = {a}");
    assert!(d > 0.0 && d <= pt(2.96) + 0.1, "height = {d}");
    assert!(f >= page_height - pt(8.67 + 2.96) - 0.1, "bottom = {f}");
}

#[tokio::test]
async fn test_save_pdf_to_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("labels.pdf");

    let sheet = sheet_for(3, 5).await;
    assert_eq!(sheet.page_count(), 1);
    sheet.save(&path, OutputFormat::Pdf, false).await.unwrap();

    let doc = Document::load(&path).unwrap();
    assert_eq!(doc.get_pages().len(), 1);
}

#[tokio::test]
async fn test_html_uses_same_placement() {
    let sheet = sheet_for(25, 0).await;
    let html = sheet::render_html(&sheet, true).unwrap();

    assert!(html.contains("@page { size: A4; margin: 0; }"));
    assert_eq!(html.matches("<section class=\"page\"").count(), 2);
    assert_eq!(html.matches("<img class=\"label\"").count(), 25);
    assert!(html.contains("object-fit: contain"));
    assert!(html.contains("window.onload = () => window.print();"));

    // Slot 7 is row 2, col 1
    let cell = layout::slot_rect_cm(&sheet.preset, 2, 1);
    assert!(html.contains(&format!("left: {}cm; top: {}cm;", cell.x, cell.y)));

    let quiet = sheet::render_html(&sheet, false).unwrap();
    assert!(!quiet.contains("window.print"));
}

#[tokio::test]
async fn test_html_markup_is_complete() {
    let sheet = sheet_for(3, 0).await;
    let html = sheet::render_html(&sheet, false).unwrap();

    assert!(html.starts_with("<!DOCTYPE html>"));
    assert!(html.ends_with("</body>\n</html>\n"));
    // One element per line: section open, three labels, section close
    let body: Vec<&str> = html
        .lines()
        .skip_while(|line| *line != "<body>")
        .skip(1)
        .take_while(|line| *line != "</body>")
        .collect();
    assert_eq!(body.len(), 5);
    assert_eq!(body[0], r#"<section class="page" data-page="1">"#);
    assert!(body[1..4].iter().all(|line| line.starts_with("<img class=\"label\"")));
    assert_eq!(body[4], "</section>");
}

#[tokio::test]
async fn test_labels_fill_their_cells() {
    let sheet = sheet_for(4, 0).await;
    for placed in sheet.labels() {
        // Bitmaps follow the preset aspect ratio, so contain leaves no margin
        assert!((placed.fitted.width - placed.cell.width).abs() < 0.05);
        assert!((placed.fitted.height - placed.cell.height).abs() < 0.05);
    }
}

#[test]
fn test_nothing_to_print() {
    let batch = RasterBatch {
        pages: 1,
        bitmaps: Vec::new(),
        failures: vec![LabelFailure {
            slot: 0,
            item_id: "id-0".to_string(),
            stage: FailureStage::Rasterize,
            reason: "boom".to_string(),
        }],
    };
    assert!(matches!(
        assemble(&microapp(), batch),
        Err(LabelError::NothingToPrint)
    ));
}
