//! End-to-end pipeline tests: items in, one merged PDF out.

use std::io::Cursor;

use lopdf::Document;
use pagebinder::compile::compile_items;
use pagebinder::session::ContentItem;

fn png_bytes(width: u32, height: u32) -> Vec<u8> {
    let img = image::RgbImage::from_pixel(width, height, image::Rgb([10, 120, 200]));
    let mut out = Cursor::new(Vec::new());
    image::DynamicImage::ImageRgb8(img)
        .write_to(&mut out, image::ImageFormat::Png)
        .unwrap();
    out.into_inner()
}

fn page_count(pdf: &[u8]) -> usize {
    Document::load_mem(pdf).unwrap().get_pages().len()
}

#[test]
fn mixed_items_merge_into_one_document() {
    let forty_lines = (1..=40)
        .map(|n| format!("line {n}"))
        .collect::<Vec<_>>()
        .join("\n");
    let items = vec![
        ContentItem::Text {
            content: forty_lines,
        },
        ContentItem::Image {
            content: png_bytes(320, 240),
        },
        ContentItem::Text {
            content: "closing note".to_string(),
        },
    ];

    let pdf = compile_items(&items).unwrap();
    // 40 lines paginate to two pages at 38 lines a page, plus one image page
    // and one final text page.
    assert_eq!(page_count(&pdf), 4);
}

#[test]
fn undecodable_image_still_produces_a_page() {
    let items = vec![
        ContentItem::Image {
            content: vec![0u8; 64],
        },
        ContentItem::Text {
            content: "after the broken image".to_string(),
        },
    ];

    let pdf = compile_items(&items).unwrap();
    assert_eq!(page_count(&pdf), 2);
}

#[test]
fn single_empty_text_item_yields_one_page() {
    let items = vec![ContentItem::Text {
        content: String::new(),
    }];
    let pdf = compile_items(&items).unwrap();
    assert_eq!(page_count(&pdf), 1);
}

#[test]
fn cyrillic_text_keeps_its_embedded_font_through_the_merge() {
    let items = vec![
        ContentItem::Text {
            content: "Сәлеметсіз бе, бұл бірінші жазба".to_string(),
        },
        ContentItem::Image {
            content: png_bytes(64, 64),
        },
    ];
    let pdf = compile_items(&items).unwrap();
    let doc = Document::load_mem(&pdf).unwrap();
    assert_eq!(doc.get_pages().len(), 2);

    // The text page's font must survive the merge as a composite font with
    // its TrueType program attached.
    let (_, page_id) = doc.get_pages().into_iter().next().unwrap();
    let page = doc.get_object(page_id).unwrap().as_dict().unwrap();
    let resources = deref(&doc, page.get(b"Resources").unwrap())
        .as_dict()
        .unwrap();
    let fonts = deref(&doc, resources.get(b"Font").unwrap())
        .as_dict()
        .unwrap();
    let font = deref(&doc, fonts.get(b"F1").unwrap()).as_dict().unwrap();
    assert_eq!(font.get(b"Subtype").unwrap().as_name().unwrap(), b"Type0");
    assert_eq!(
        font.get(b"Encoding").unwrap().as_name().unwrap(),
        b"Identity-H"
    );
}

fn deref<'a>(doc: &'a Document, object: &'a lopdf::Object) -> &'a lopdf::Object {
    match object {
        lopdf::Object::Reference(id) => doc.get_object(*id).unwrap(),
        other => other,
    }
}

#[test]
fn large_image_is_scaled_onto_its_page() {
    let items = vec![ContentItem::Image {
        content: png_bytes(2000, 3000),
    }];
    let pdf = compile_items(&items).unwrap();
    assert_eq!(page_count(&pdf), 1);
}
