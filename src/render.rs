//! PDF renderer – takes a [`LayoutConfig`] and produces PDF bytes using
//! `printpdf` (v0.8 ops-based API).

use std::collections::{BTreeSet, HashMap};

use printpdf::*;

use crate::fonts::FontFace;
use crate::images::ImageStore;
use crate::layout_config::{LayoutBox, LayoutConfig};
use crate::pdf::PdfError;
use crate::style::FontFamily;

/// Points to millimetres.
const MM_PER_PT: f32 = 0.352778;

/// A printpdf XObject together with the pixel dimensions of the source image.
struct ImageResource {
    xobj_id: XObjectId,
    px_width: u32,
    px_height: u32,
}

/// Render a LayoutConfig into PDF bytes.
///
/// Image bytes come from `images`; an image the store does not hold, or
/// whose bytes printpdf rejects, is skipped with a warning.
pub fn render_pdf(config: &LayoutConfig, images: &ImageStore) -> Result<Vec<u8>, PdfError> {
    let page_w = Mm(config.page_width_pt * MM_PER_PT);
    let page_h = Mm(config.page_height_pt * MM_PER_PT);

    let mut doc = PdfDocument::new(&config.title);

    // ── Pre-register all images ────────────────────────────────────────────
    let srcs: BTreeSet<&str> = config
        .pages
        .iter()
        .flat_map(|p| p.boxes.iter())
        .filter_map(|b| b.image.as_ref().map(|i| i.src.as_str()))
        .collect();

    let mut image_resources: HashMap<String, ImageResource> = HashMap::new();
    let mut img_warnings: Vec<PdfWarnMsg> = Vec::new();

    for src in srcs {
        let Some(loaded) = images.get(src) else {
            log::warn!("Skipping image {src}: not loaded");
            continue;
        };
        let raw = match RawImage::decode_from_bytes(&loaded.bytes, &mut img_warnings) {
            Ok(r) => r,
            Err(e) => {
                log::warn!("Skipping image: PDF encode error: {e}");
                continue;
            }
        };
        let xobj_id = doc.add_image(&raw);
        image_resources.insert(
            src.to_string(),
            ImageResource {
                xobj_id,
                px_width: loaded.width_px,
                px_height: loaded.height_px,
            },
        );
    }

    // ── Render pages ──────────────────────────────────────────────────────
    let mut pages: Vec<PdfPage> = config
        .pages
        .iter()
        .map(|page_layout| {
            let mut ops = Vec::new();
            for lbox in &page_layout.boxes {
                render_box(&mut ops, lbox, config.page_height_pt, &image_resources);
            }
            PdfPage::new(page_w, page_h, ops)
        })
        .collect();

    if pages.is_empty() {
        pages.push(PdfPage::new(page_w, page_h, Vec::new()));
    }

    doc.with_pages(pages);
    // Raw operators are only emitted by `write_text`.
    let options = PdfSaveOptions {
        secure: false,
        ..PdfSaveOptions::default()
    };
    let bytes = doc.save(&options, &mut Vec::new());
    if bytes.is_empty() {
        return Err(PdfError::EmptyOutput);
    }
    Ok(bytes)
}

/// Encode text for the builtin fonts, which use WinAnsiEncoding (one byte
/// per glyph). Characters outside Windows-1252 become `?`.
pub(crate) fn encode_win_ansi(s: &str) -> Vec<u8> {
    s.chars()
        .map(|c| match c {
            '\u{20AC}' => 0x80, // euro
            '\u{201A}' => 0x82, // single low-9 quote
            '\u{201E}' => 0x84, // double low-9 quote
            '\u{2026}' => 0x85, // ellipsis
            '\u{2018}' => 0x91, // left single quote
            '\u{2019}' => 0x92, // right single quote
            '\u{201C}' => 0x93, // left double quote
            '\u{201D}' => 0x94, // right double quote
            '\u{2022}' => 0x95, // bullet
            '\u{2013}' => 0x96, // en-dash
            '\u{2014}' => 0x97, // em-dash
            '\u{2122}' => 0x99, // trademark
            '\u{00A0}' => 0x20, // non-breaking space -> space
            c if (c as u32) < 256 => c as u8,
            _ => b'?',
        })
        .collect()
}

fn builtin_font(face: FontFace) -> BuiltinFont {
    match (face.family, face.bold, face.italic) {
        (FontFamily::SansSerif, false, false) => BuiltinFont::Helvetica,
        (FontFamily::SansSerif, true, false) => BuiltinFont::HelveticaBold,
        (FontFamily::SansSerif, false, true) => BuiltinFont::HelveticaOblique,
        (FontFamily::SansSerif, true, true) => BuiltinFont::HelveticaBoldOblique,
        (FontFamily::Serif, false, false) => BuiltinFont::TimesRoman,
        (FontFamily::Serif, true, false) => BuiltinFont::TimesBold,
        (FontFamily::Serif, false, true) => BuiltinFont::TimesItalic,
        (FontFamily::Serif, true, true) => BuiltinFont::TimesBoldItalic,
        (FontFamily::Monospace, false, false) => BuiltinFont::Courier,
        (FontFamily::Monospace, true, false) => BuiltinFont::CourierBold,
        (FontFamily::Monospace, false, true) => BuiltinFont::CourierOblique,
        (FontFamily::Monospace, true, true) => BuiltinFont::CourierBoldOblique,
    }
}

fn pdf_color(c: [f32; 4]) -> Color {
    Color::Rgb(Rgb {
        r: c[0],
        g: c[1],
        b: c[2],
        icc_profile: None,
    })
}

fn point(x: f32, y: f32) -> LinePoint {
    LinePoint {
        p: Point { x: Pt(x), y: Pt(y) },
        bezier: false,
    }
}

/// Filled rectangle; `top` is in PDF coordinates (origin bottom-left).
fn fill_rect(ops: &mut Vec<Op>, color: [f32; 4], x: f32, top: f32, width: f32, height: f32) {
    if width <= 0.0 || height <= 0.0 {
        return;
    }
    ops.push(Op::SetFillColor {
        col: pdf_color(color),
    });
    let bottom = top - height;
    ops.push(Op::DrawPolygon {
        polygon: Polygon {
            rings: vec![PolygonRing {
                points: vec![
                    point(x, bottom),
                    point(x + width, bottom),
                    point(x + width, top),
                    point(x, top),
                ],
            }],
            mode: PaintMode::Fill,
            winding_order: WindingOrder::NonZero,
        },
    });
}

fn stroke_line(ops: &mut Vec<Op>, color: [f32; 4], thickness: f32, x1: f32, x2: f32, y: f32) {
    ops.push(Op::SetOutlineThickness { pt: Pt(thickness) });
    ops.push(Op::SetOutlineColor {
        col: pdf_color(color),
    });
    ops.push(Op::DrawLine {
        line: Line {
            points: vec![point(x1, y), point(x2, y)],
            is_closed: false,
        },
    });
}

fn write_text(ops: &mut Vec<Op>, text: &str, font: BuiltinFont, size: f32, color: [f32; 4], x: f32, y: f32) {
    ops.push(Op::StartTextSection);
    ops.push(Op::SetTextCursor {
        pos: Point { x: Pt(x), y: Pt(y) },
    });
    ops.push(Op::SetFontSizeBuiltinFont {
        size: Pt(size),
        font,
    });
    ops.push(Op::SetFillColor {
        col: pdf_color(color),
    });
    // printpdf only takes builtin-font text as a UTF-8 `String`, so the glyph
    // bytes go out as a raw `Tj`; the empty write registers the font resource.
    ops.push(Op::WriteTextBuiltinFont {
        items: Vec::new(),
        font,
    });
    ops.push(Op::Unknown {
        key: "Tj".to_string(),
        value: vec![DictItem::String {
            data: encode_win_ansi(text),
            literal: false,
        }],
    });
    ops.push(Op::EndTextSection);
}

/// Render one LayoutBox into PDF ops.
fn render_box(
    ops: &mut Vec<Op>,
    lbox: &LayoutBox,
    page_height: f32,
    images: &HashMap<String, ImageResource>,
) {
    // PDF coordinate system: origin at bottom-left.
    // Our layout uses origin at top-left. Convert:
    let pdf_y = page_height - lbox.y;

    if let Some(bg) = lbox.background_color {
        fill_rect(ops, bg, lbox.x, pdf_y, lbox.width, lbox.height);
    }

    // Borders are drawn as strips inside the border box.
    let b = &lbox.borders;
    if let Some(top) = b.top {
        fill_rect(ops, top.color, lbox.x, pdf_y, lbox.width, top.width);
    }
    if let Some(bottom) = b.bottom {
        let y = pdf_y - lbox.height + bottom.width;
        fill_rect(ops, bottom.color, lbox.x, y, lbox.width, bottom.width);
    }
    if let Some(left) = b.left {
        fill_rect(ops, left.color, lbox.x, pdf_y, left.width, lbox.height);
    }
    if let Some(right) = b.right {
        let x = lbox.x + lbox.width - right.width;
        fill_rect(ops, right.color, x, pdf_y, right.width, lbox.height);
    }

    if let Some(text) = &lbox.text {
        for tline in &text.lines {
            let line_top = pdf_y - tline.y_offset;
            let baseline = line_top - tline.baseline;
            for frag in &tline.fragments {
                if frag.text.is_empty() {
                    continue;
                }
                let x = lbox.x + tline.x_offset + frag.x;
                if let Some(bg) = frag.background {
                    fill_rect(ops, bg, x - 1.0, line_top, frag.width + 2.0, tline.height);
                }
                write_text(
                    ops,
                    &frag.text,
                    builtin_font(frag.font),
                    frag.font_size,
                    frag.color,
                    x,
                    baseline,
                );
                let thickness = (frag.font_size / 18.0).max(0.5);
                if frag.underline {
                    let y = baseline - frag.font_size * 0.1;
                    stroke_line(ops, frag.color, thickness, x, x + frag.width, y);
                }
                if frag.strike {
                    let y = baseline + frag.font_size * 0.3;
                    stroke_line(ops, frag.color, thickness, x, x + frag.width, y);
                }
            }
        }
    }

    if let Some(marker) = &lbox.marker {
        write_text(
            ops,
            &marker.text,
            builtin_font(marker.font),
            marker.font_size,
            marker.color,
            marker.x_end - marker.width,
            page_height - marker.baseline_y,
        );
    }

    // Image – embed from pre-registered XObject
    if let Some(img) = &lbox.image {
        if let Some(res) = images.get(&img.src) {
            // translate_y = bottom edge of image in PDF coordinates.
            let img_bottom_y = pdf_y - img.y_offset - img.height;

            // At dpi=72 printpdf renders 1 px = 1 pt, so
            // scale = desired_pt / px_dim.
            let scale_x = img.width / res.px_width.max(1) as f32;
            let scale_y = img.height / res.px_height.max(1) as f32;

            ops.push(Op::UseXobject {
                id: res.xobj_id.clone(),
                transform: XObjectTransform {
                    translate_x: Some(Pt(lbox.x + img.x_offset)),
                    translate_y: Some(Pt(img_bottom_y)),
                    dpi: Some(72.0),
                    scale_x: Some(scale_x),
                    scale_y: Some(scale_y),
                    rotate: None,
                },
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout_config::{
        BorderStyle, ImageContent, PageLayout, TextContent, TextFragment, TextLine,
    };

    fn fragment(text: &str, underline: bool) -> TextFragment {
        TextFragment {
            text: text.to_string(),
            x: 0.0,
            width: 40.0,
            font: FontFace::default(),
            font_size: 12.0,
            color: [0.0, 0.0, 0.0, 1.0],
            underline,
            strike: false,
            background: Some([0.9, 0.9, 0.9, 1.0]),
        }
    }

    #[test]
    fn render_empty_page() {
        let config = LayoutConfig::a4();
        let bytes = render_pdf(&config, &ImageStore::default()).unwrap();
        assert!(bytes.len() > 100, "PDF should have content");
        // PDF magic number
        assert_eq!(&bytes[0..5], b"%PDF-");
    }

    #[test]
    fn render_decorated_text() {
        let mut config = LayoutConfig::a4();
        let mut b = LayoutBox::new(40.0, 40.0, 200.0, 30.0);
        b.background_color = Some([1.0, 1.0, 0.9, 1.0]);
        b.borders.left = Some(BorderStyle {
            width: 3.0,
            color: [0.8, 0.8, 0.8, 1.0],
        });
        b.text = Some(TextContent {
            lines: vec![TextLine {
                x_offset: 0.0,
                y_offset: 0.0,
                height: 14.4,
                baseline: 11.0,
                fragments: vec![fragment("caf\u{e9} \u{2014} ok", true)],
            }],
        });
        b.image = Some(ImageContent {
            src: "missing.png".into(),
            x_offset: 0.0,
            y_offset: 0.0,
            width: 10.0,
            height: 10.0,
        });
        config.pages.push(PageLayout {
            page_index: 0,
            boxes: vec![b],
        });
        let bytes = render_pdf(&config, &ImageStore::default()).unwrap();
        assert_eq!(&bytes[0..5], b"%PDF-");
    }

    #[test]
    fn win_ansi_encoding() {
        let encoded = encode_win_ansi("a\u{2022}\u{e9}\u{4e2d}");
        assert_eq!(encoded, vec![b'a', 0x95, 0xE9, b'?']);
    }

    #[test]
    fn text_is_shown_as_win_ansi_bytes() {
        let mut ops = Vec::new();
        write_text(
            &mut ops,
            "caf\u{e9}",
            BuiltinFont::Helvetica,
            12.0,
            [0.0, 0.0, 0.0, 1.0],
            40.0,
            700.0,
        );
        assert!(ops.iter().any(|op| matches!(
            op,
            Op::WriteTextBuiltinFont { items, font: BuiltinFont::Helvetica } if items.is_empty()
        )));
        let shown: Vec<&[DictItem]> = ops
            .iter()
            .filter_map(|op| match op {
                Op::Unknown { key, value } if key == "Tj" => Some(value.as_slice()),
                _ => None,
            })
            .collect();
        assert_eq!(shown.len(), 1);
        match shown[0] {
            [DictItem::String { data, literal }] => {
                assert!(!literal);
                assert_eq!(data.as_slice(), b"caf\xE9");
            }
            other => panic!("unexpected Tj operands: {other:?}"),
        }
    }

    #[test]
    fn font_selection() {
        let mut face = FontFace::default();
        assert!(matches!(builtin_font(face), BuiltinFont::Helvetica));
        face.family = FontFamily::Monospace;
        face.bold = true;
        assert!(matches!(builtin_font(face), BuiltinFont::CourierBold));
    }
}
