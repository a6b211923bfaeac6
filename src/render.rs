//! Item rendering: turns one content item into a fixed-size PDF page-set.
//!
//! Layout is deliberately simple: A4 pages, greedy character-count wrapping at
//! 80 columns (no glyph metrics), and a fixed 20 pt line advance. Images are
//! centered and scaled to the printable area. Text is shown with a bundled
//! DejaVu Sans embedded as a Type0/Identity-H font, so Cyrillic and other
//! non-Latin content renders correctly.

use std::collections::BTreeSet;

use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Document, Object, ObjectId, Stream, StringFormat};
use tracing::warn;
use ttf_parser::{Face, GlyphId};

use crate::session::ContentItem;

/// A4 page size in points.
pub const PAGE_WIDTH: f32 = 595.28;
pub const PAGE_HEIGHT: f32 = 841.89;

/// Maximum characters per wrapped line.
pub const WRAP_WIDTH: usize = 80;

const FONT_SIZE: f32 = 12.0;
const LINE_HEIGHT: f32 = 20.0;
const TEXT_MARGIN_X: f32 = 40.0;
const TEXT_TOP: f32 = PAGE_HEIGHT - 50.0;
const TEXT_BOTTOM: f32 = 50.0;

/// Margin around the printable area for images, per side.
const IMAGE_MARGIN: f32 = 40.0;

/// Bundled page font. DejaVu Sans carries Latin, Cyrillic, and Turkic glyph
/// coverage for every supported interface language.
const FONT_DATA: &[u8] = include_bytes!("../assets/fonts/DejaVuSans.ttf");
const FONT_NAME: &str = "DejaVuSans";

/// Errors while generating a page-set for a single item. Failures stay
/// contained to the item; the compiler skips it and continues.
#[derive(Debug, Clone)]
pub enum RenderError {
    /// The bundled font could not be parsed.
    Font(String),
    /// A page content stream could not be encoded.
    Content(String),
    /// The finished document could not be serialized.
    Write(String),
}

impl std::fmt::Display for RenderError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RenderError::Font(msg) => write!(f, "font error: {msg}"),
            RenderError::Content(msg) => write!(f, "content encoding error: {msg}"),
            RenderError::Write(msg) => write!(f, "document write error: {msg}"),
        }
    }
}

impl std::error::Error for RenderError {}

/// Greedily wrap source text at [`WRAP_WIDTH`] characters.
///
/// The text is split on explicit line breaks first; each source line is then
/// wrapped on word boundaries, with words longer than the width hard-broken.
/// Blank source lines produce no output lines.
pub fn wrap_lines(content: &str) -> Vec<String> {
    let mut lines = Vec::new();
    for source_line in content.split('\n') {
        let mut current = String::new();
        let mut current_len = 0usize;
        for word in source_line.split_whitespace() {
            let word_len = word.chars().count();
            if current_len == 0 {
                if word_len <= WRAP_WIDTH {
                    current.push_str(word);
                    current_len = word_len;
                } else {
                    current_len = hard_break(word, &mut lines, &mut current);
                }
            } else if current_len + 1 + word_len <= WRAP_WIDTH {
                current.push(' ');
                current.push_str(word);
                current_len += 1 + word_len;
            } else {
                lines.push(std::mem::take(&mut current));
                if word_len <= WRAP_WIDTH {
                    current.push_str(word);
                    current_len = word_len;
                } else {
                    current_len = hard_break(word, &mut lines, &mut current);
                }
            }
        }
        if current_len > 0 {
            lines.push(current);
        }
    }
    lines
}

/// Split an over-long word into full-width chunks, keeping the remainder as
/// the new current line. Returns the remainder's length.
fn hard_break(word: &str, lines: &mut Vec<String>, current: &mut String) -> usize {
    let chars: Vec<char> = word.chars().collect();
    let mut start = 0;
    while chars.len() - start > WRAP_WIDTH {
        lines.push(chars[start..start + WRAP_WIDTH].iter().collect());
        start += WRAP_WIDTH;
    }
    *current = chars[start..].iter().collect();
    current.chars().count()
}

/// Lay wrapped lines out on pages, breaking when the cursor would cross the
/// bottom margin. Always yields at least one page, even for empty input.
pub fn paginate(lines: Vec<String>) -> Vec<Vec<String>> {
    let mut pages = Vec::new();
    let mut current = Vec::new();
    let mut y = TEXT_TOP;
    for line in lines {
        if y < TEXT_BOTTOM {
            pages.push(std::mem::take(&mut current));
            y = TEXT_TOP;
        }
        current.push(line);
        y -= LINE_HEIGHT;
    }
    pages.push(current);
    pages
}

/// Scale factor that places an image of `image_w` x `image_h` into the
/// printable area. Oversized images shrink to fit; images smaller than 80 %
/// of the fit are enlarged to that 80 % mark; anything in between keeps
/// scale 1 so small images are not stretched across the page.
pub fn fit_scale(image_w: f32, image_h: f32, area_w: f32, area_h: f32) -> f32 {
    let shrink = (area_w / image_w).min(area_h / image_h);
    if shrink < 1.0 {
        shrink
    } else {
        let enlarge = (area_w * 0.8 / image_w).min(area_h * 0.8 / image_h);
        if enlarge > 1.0 {
            enlarge
        } else {
            1.0
        }
    }
}

/// Render one content item into a standalone PDF holding its page-set.
/// Every item yields at least one page.
pub fn render_item(item: &ContentItem) -> Result<Vec<u8>, RenderError> {
    let mut builder = PageSetBuilder::new()?;
    match item {
        ContentItem::Text { content } => {
            for page_lines in paginate(wrap_lines(content)) {
                builder.push_text_page(&page_lines, TEXT_TOP)?;
            }
        }
        ContentItem::Image { content } => {
            push_image_page(&mut builder, content)?;
        }
    }
    builder.finish()
}

/// Add a single page carrying the image, or a fallback error line when the
/// image cannot be decoded. One bad image must not abort the whole item.
fn push_image_page(builder: &mut PageSetBuilder, data: &[u8]) -> Result<(), RenderError> {
    let decoded = match image::load_from_memory(data) {
        Ok(decoded) => decoded,
        Err(e) => {
            warn!(error = %e, "image failed to decode, substituting error page");
            let line = format!("Error displaying image: {e}");
            return builder.push_text_page(&[line], PAGE_HEIGHT / 2.0);
        }
    };

    let rgb = decoded.to_rgb8();
    let (width, height) = rgb.dimensions();
    let area_w = PAGE_WIDTH - 2.0 * IMAGE_MARGIN;
    let area_h = PAGE_HEIGHT - 2.0 * IMAGE_MARGIN;
    let scale = fit_scale(width as f32, height as f32, area_w, area_h);
    let draw_w = width as f32 * scale;
    let draw_h = height as f32 * scale;
    let x = (PAGE_WIDTH - draw_w) / 2.0;
    let y = (PAGE_HEIGHT - draw_h) / 2.0;

    let image_id = builder.doc.add_object(Stream::new(
        dictionary! {
            "Type" => "XObject",
            "Subtype" => "Image",
            "Width" => width as i64,
            "Height" => height as i64,
            "ColorSpace" => "DeviceRGB",
            "BitsPerComponent" => 8,
        },
        rgb.into_raw(),
    ));

    let ops = vec![
        Operation::new("q", vec![]),
        Operation::new(
            "cm",
            vec![
                Object::Real(draw_w),
                Object::Real(0.0),
                Object::Real(0.0),
                Object::Real(draw_h),
                Object::Real(x),
                Object::Real(y),
            ],
        ),
        Operation::new("Do", vec!["Im1".into()]),
        Operation::new("Q", vec![]),
    ];
    builder.push_page(ops, Some(image_id))
}

/// Incrementally builds a single-item PDF: shared embedded font, one page per
/// `push_page`, standard Pages/Catalog wiring on `finish`.
///
/// Text is shown through a composite (Type0) font with Identity-H encoding:
/// each character is mapped to its glyph id and emitted as a two-byte code,
/// and the TrueType program is embedded whole. Glyph ids seen during layout
/// are collected so the width array covers exactly the glyphs in use.
struct PageSetBuilder {
    doc: Document,
    pages_id: ObjectId,
    font_id: ObjectId,
    face: Face<'static>,
    used_glyphs: BTreeSet<u16>,
    page_ids: Vec<ObjectId>,
}

impl PageSetBuilder {
    fn new() -> Result<Self, RenderError> {
        let face = Face::parse(FONT_DATA, 0).map_err(|e| RenderError::Font(e.to_string()))?;
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        let font_id = doc.new_object_id();
        Ok(Self {
            doc,
            pages_id,
            font_id,
            face,
            used_glyphs: BTreeSet::new(),
            page_ids: Vec::new(),
        })
    }

    /// Map one line of text to big-endian glyph id pairs, recording every
    /// glyph used. Characters outside the font fall back to '?', then to
    /// glyph 0 (.notdef).
    fn encode_line(&mut self, line: &str) -> Vec<u8> {
        let mut encoded = Vec::with_capacity(line.len() * 2);
        for c in line.chars() {
            let glyph = self
                .face
                .glyph_index(c)
                .or_else(|| self.face.glyph_index('?'))
                .unwrap_or(GlyphId(0));
            self.used_glyphs.insert(glyph.0);
            encoded.extend_from_slice(&glyph.0.to_be_bytes());
        }
        encoded
    }

    fn push_text_page(&mut self, lines: &[String], start_y: f32) -> Result<(), RenderError> {
        let mut ops = Vec::new();
        let mut y = start_y;
        for line in lines {
            let encoded = self.encode_line(line);
            ops.push(Operation::new("BT", vec![]));
            ops.push(Operation::new("Tf", vec!["F1".into(), FONT_SIZE.into()]));
            ops.push(Operation::new(
                "Td",
                vec![Object::Real(TEXT_MARGIN_X), Object::Real(y)],
            ));
            ops.push(Operation::new(
                "Tj",
                vec![Object::String(encoded, StringFormat::Hexadecimal)],
            ));
            ops.push(Operation::new("ET", vec![]));
            y -= LINE_HEIGHT;
        }
        self.push_page(ops, None)
    }

    fn push_page(
        &mut self,
        operations: Vec<Operation>,
        image: Option<ObjectId>,
    ) -> Result<(), RenderError> {
        let content = Content { operations };
        let encoded = content
            .encode()
            .map_err(|e| RenderError::Content(e.to_string()))?;
        let content_id = self.doc.add_object(Stream::new(dictionary! {}, encoded));

        let mut resources = dictionary! {
            "Font" => dictionary! { "F1" => self.font_id },
        };
        if let Some(image_id) = image {
            resources.set("XObject", dictionary! { "Im1" => image_id });
        }
        let resources_id = self.doc.add_object(resources);

        let page_id = self.doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => self.pages_id,
            "Contents" => content_id,
            "MediaBox" => vec![
                0.into(),
                0.into(),
                Object::Real(PAGE_WIDTH),
                Object::Real(PAGE_HEIGHT),
            ],
            "Resources" => resources_id,
        });
        self.page_ids.push(page_id);
        Ok(())
    }

    /// Build the embedded font object graph: the TrueType program, the CID
    /// font descriptor with metrics scaled to the 1000-unit glyph space, and
    /// the Type0 wrapper under Identity-H.
    fn build_font(&mut self) {
        let units_per_em = self.face.units_per_em() as f32;
        let to_glyph_space = 1000.0 / units_per_em;
        let scaled = |value: i16| ((value as f32) * to_glyph_space).round() as i64;

        let font_file_id = self.doc.add_object(Stream::new(
            dictionary! { "Length1" => FONT_DATA.len() as i64 },
            FONT_DATA.to_vec(),
        ));

        let bbox = self.face.global_bounding_box();
        let cap_height = self
            .face
            .capital_height()
            .unwrap_or(self.face.ascender());
        let descriptor_id = self.doc.add_object(dictionary! {
            "Type" => "FontDescriptor",
            "FontName" => FONT_NAME,
            "Flags" => 32,
            "FontBBox" => vec![
                scaled(bbox.x_min).into(),
                scaled(bbox.y_min).into(),
                scaled(bbox.x_max).into(),
                scaled(bbox.y_max).into(),
            ],
            "ItalicAngle" => 0,
            "Ascent" => scaled(self.face.ascender()),
            "Descent" => scaled(self.face.descender()),
            "CapHeight" => scaled(cap_height),
            "StemV" => 80,
            "FontFile2" => font_file_id,
        });

        let mut widths: Vec<Object> = Vec::with_capacity(self.used_glyphs.len() * 2);
        for &glyph in &self.used_glyphs {
            let advance = self
                .face
                .glyph_hor_advance(GlyphId(glyph))
                .unwrap_or(0) as f32;
            widths.push((glyph as i64).into());
            widths.push(vec![Object::Integer(
                (advance * to_glyph_space).round() as i64
            )]
            .into());
        }

        let cid_font_id = self.doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "CIDFontType2",
            "BaseFont" => FONT_NAME,
            "CIDSystemInfo" => dictionary! {
                "Registry" => Object::string_literal("Adobe"),
                "Ordering" => Object::string_literal("Identity"),
                "Supplement" => 0,
            },
            "FontDescriptor" => descriptor_id,
            "DW" => 1000,
            "W" => widths,
            "CIDToGIDMap" => "Identity",
        });

        self.doc.objects.insert(
            self.font_id,
            Object::Dictionary(dictionary! {
                "Type" => "Font",
                "Subtype" => "Type0",
                "BaseFont" => FONT_NAME,
                "Encoding" => "Identity-H",
                "DescendantFonts" => vec![Object::Reference(cid_font_id)],
            }),
        );
    }

    fn finish(mut self) -> Result<Vec<u8>, RenderError> {
        self.build_font();
        let kids: Vec<Object> = self
            .page_ids
            .iter()
            .map(|id| Object::Reference(*id))
            .collect();
        self.doc.objects.insert(
            self.pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => kids,
                "Count" => self.page_ids.len() as i64,
            }),
        );
        let catalog_id = self.doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => self.pages_id,
        });
        self.doc.trailer.set("Root", catalog_id);
        self.doc.compress();

        let mut buffer = Vec::new();
        self.doc
            .save_to(&mut buffer)
            .map_err(|e| RenderError::Write(e.to_string()))?;
        Ok(buffer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // 38 lines fit between the top cursor start and the bottom margin.
    const LINES_PER_PAGE: usize = 38;

    fn page_count(pdf: &[u8]) -> usize {
        Document::load_mem(pdf).unwrap().get_pages().len()
    }

    fn resolve<'a>(doc: &'a Document, object: &'a Object) -> &'a Object {
        match object {
            Object::Reference(id) => doc.get_object(*id).unwrap(),
            other => other,
        }
    }

    /// The F1 font dictionary of the document's first page.
    fn first_page_font(doc: &Document) -> &lopdf::Dictionary {
        let (_, page_id) = doc.get_pages().into_iter().next().unwrap();
        let page = doc.get_object(page_id).unwrap().as_dict().unwrap();
        let resources = resolve(doc, page.get(b"Resources").unwrap())
            .as_dict()
            .unwrap();
        let fonts = resolve(doc, resources.get(b"Font").unwrap())
            .as_dict()
            .unwrap();
        resolve(doc, fonts.get(b"F1").unwrap()).as_dict().unwrap()
    }

    #[test]
    fn wrap_respects_width() {
        let word = "abcde ".repeat(30);
        for line in wrap_lines(&word) {
            assert!(line.chars().count() <= WRAP_WIDTH);
        }
    }

    #[test]
    fn wrap_splits_on_line_breaks() {
        let lines = wrap_lines("first\nsecond");
        assert_eq!(lines, vec!["first".to_string(), "second".to_string()]);
    }

    #[test]
    fn wrap_drops_blank_lines() {
        assert!(wrap_lines("").is_empty());
        assert_eq!(wrap_lines("a\n\n\nb").len(), 2);
    }

    #[test]
    fn wrap_hard_breaks_long_words() {
        let long = "x".repeat(200);
        let lines = wrap_lines(&long);
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0].len(), WRAP_WIDTH);
        assert_eq!(lines[1].len(), WRAP_WIDTH);
        assert_eq!(lines[2].len(), 40);
    }

    #[test]
    fn paginate_empty_input_yields_one_page() {
        let pages = paginate(Vec::new());
        assert_eq!(pages.len(), 1);
        assert!(pages[0].is_empty());
    }

    #[test]
    fn paginate_fills_pages_to_capacity() {
        let line = "line".to_string();
        assert_eq!(paginate(vec![line.clone(); LINES_PER_PAGE]).len(), 1);
        assert_eq!(paginate(vec![line.clone(); LINES_PER_PAGE + 1]).len(), 2);
        assert_eq!(paginate(vec![line; LINES_PER_PAGE * 3]).len(), 3);
    }

    #[test]
    fn fit_scale_shrinks_oversized_images() {
        let scale = fit_scale(200.0, 100.0, 100.0, 100.0);
        assert_eq!(scale, 0.5);
        assert!(200.0 * scale <= 100.0 && 100.0 * scale <= 100.0);
    }

    #[test]
    fn fit_scale_enlarges_small_images_to_eighty_percent() {
        let scale = fit_scale(50.0, 50.0, 100.0, 100.0);
        assert!((scale - 1.6).abs() < 1e-6);
        assert!(scale > 1.0);
    }

    #[test]
    fn fit_scale_leaves_near_fit_images_alone() {
        // Between 80 % and 100 % of the printable fit.
        let scale = fit_scale(90.0, 90.0, 100.0, 100.0);
        assert_eq!(scale, 1.0);
    }

    #[test]
    fn empty_text_renders_exactly_one_page() {
        let pdf = render_item(&ContentItem::Text {
            content: String::new(),
        })
        .unwrap();
        assert_eq!(page_count(&pdf), 1);
    }

    #[test]
    fn long_text_paginates_by_line_capacity() {
        let content = vec!["line"; LINES_PER_PAGE * 2 + 1].join("\n");
        let pdf = render_item(&ContentItem::Text { content }).unwrap();
        assert_eq!(page_count(&pdf), 3);
    }

    #[test]
    fn text_pages_use_an_embedded_unicode_font() {
        let pdf = render_item(&ContentItem::Text {
            content: "Сәлем әлем, привет, сәлеметсіз бе".to_string(),
        })
        .unwrap();
        let doc = Document::load_mem(&pdf).unwrap();

        let font = first_page_font(&doc);
        assert_eq!(font.get(b"Subtype").unwrap().as_name().unwrap(), b"Type0");
        assert_eq!(
            font.get(b"Encoding").unwrap().as_name().unwrap(),
            b"Identity-H"
        );

        let descendants = font.get(b"DescendantFonts").unwrap().as_array().unwrap();
        let cid_font = resolve(&doc, &descendants[0]).as_dict().unwrap();
        assert_eq!(
            cid_font.get(b"Subtype").unwrap().as_name().unwrap(),
            b"CIDFontType2"
        );
        let descriptor = resolve(&doc, cid_font.get(b"FontDescriptor").unwrap())
            .as_dict()
            .unwrap();
        // The TrueType program must travel with the document.
        assert!(descriptor.get(b"FontFile2").is_ok());
    }

    #[test]
    fn cyrillic_glyphs_are_mapped_not_raw_bytes() {
        let mut builder = PageSetBuilder::new().unwrap();
        let encoded = builder.encode_line("Сәлем");
        // Two bytes per character, and none of the glyph ids is the raw
        // UTF-8 byte sequence or .notdef.
        assert_eq!(encoded.len(), 2 * "Сәлем".chars().count());
        for pair in encoded.chunks(2) {
            let glyph = u16::from_be_bytes([pair[0], pair[1]]);
            assert_ne!(glyph, 0);
        }
    }

    #[test]
    fn valid_image_renders_one_page() {
        let mut png = Vec::new();
        let img = image::RgbImage::from_pixel(16, 16, image::Rgb([120, 30, 30]));
        image::DynamicImage::ImageRgb8(img)
            .write_to(&mut std::io::Cursor::new(&mut png), image::ImageFormat::Png)
            .unwrap();

        let pdf = render_item(&ContentItem::Image { content: png }).unwrap();
        assert_eq!(page_count(&pdf), 1);
    }

    #[test]
    fn undecodable_image_still_renders_a_page() {
        let pdf = render_item(&ContentItem::Image {
            content: vec![0xde, 0xad, 0xbe, 0xef],
        })
        .unwrap();
        assert_eq!(page_count(&pdf), 1);
    }
}
