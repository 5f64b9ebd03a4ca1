use crate::types::Result;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;

use super::LabelSheet;

/// Self-contained print page: one A4 section per sheet page, labels as
/// absolutely positioned data-URL images.
pub fn render_html(sheet: &LabelSheet, auto_print: bool) -> Result<String> {
    let page = sheet.page;
    let mut html = format!(
        r#"<!DOCTYPE html>
<html>
<head>
<meta charset="utf-8">
<title>Box labels</title>
<style>
@page {{ size: A4; margin: 0; }}
html, body {{ margin: 0; padding: 0; }}
.page {{ position: relative; width: {w}cm; height: {h}cm; overflow: hidden; page-break-after: always; }}
.page:last-child {{ page-break-after: auto; }}
.label {{ position: absolute; object-fit: contain; }}
</style>
</head>
<body>
"#,
        w = page.width_cm,
        h = page.height_cm,
    );

    for sheet_page in &sheet.pages {
        html.push_str(&format!(
            "<section class=\"page\" data-page=\"{}\">\n",
            sheet_page.index + 1
        ));
        for placed in &sheet_page.labels {
            let png = STANDARD.encode(placed.bitmap.to_png_bytes()?);
            let cell = placed.cell;
            html.push_str(&format!(
                r#"<img class="label" alt="{alt}" data-slot="{slot}" style="left: {x}cm; top: {y}cm; width: {w}cm; height: {h}cm;" src="data:image/png;base64,{png}">"#,
                alt = escape_attr(&placed.bitmap.item_id),
                slot = placed.slot,
                x = cell.x,
                y = cell.y,
                w = cell.width,
                h = cell.height,
            ));
            html.push('\n');
        }
        html.push_str("</section>\n");
    }

    if auto_print {
        html.push_str("<script>window.onload = () => window.print();</script>\n");
    }
    html.push_str("</body>\n</html>\n");
    Ok(html)
}

fn escape_attr(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('"', "&quot;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}
