//! Document compilation: renders every pending item and merges the resulting
//! page-sets, in arrival order, into one PDF.
//!
//! Malformed inputs are contained: an item that fails to render, or a
//! page-set that fails to parse during the merge, is logged and skipped so a
//! partial-but-valid document is still produced from the rest.

use std::collections::BTreeMap;

use lopdf::{Document, Object, ObjectId};
use tracing::warn;

use crate::render;
use crate::session::ContentItem;

#[derive(Debug, Clone)]
pub enum CompileError {
    /// Every input was skipped; there is nothing to deliver.
    Empty,
    /// The merged document could not be serialized.
    Write(String),
}

impl std::fmt::Display for CompileError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CompileError::Empty => write!(f, "no page-sets survived compilation"),
            CompileError::Write(msg) => write!(f, "document write error: {msg}"),
        }
    }
}

impl std::error::Error for CompileError {}

/// Render all items and merge their page-sets. Callers are expected to have
/// rejected an empty item list before getting here; `CompileError::Empty`
/// from a non-empty list means generation failed for every item.
pub fn compile_items(items: &[ContentItem]) -> Result<Vec<u8>, CompileError> {
    let mut page_sets = Vec::with_capacity(items.len());
    for (index, item) in items.iter().enumerate() {
        match render::render_item(item) {
            Ok(bytes) => page_sets.push(bytes),
            Err(e) => warn!(item = index, error = %e, "skipping item that failed to render"),
        }
    }
    merge_page_sets(&page_sets)
}

/// Merge page-set PDFs into a single document, preserving input order.
/// Page-sets that fail to parse are skipped.
pub fn merge_page_sets(page_sets: &[Vec<u8>]) -> Result<Vec<u8>, CompileError> {
    let mut documents = Vec::with_capacity(page_sets.len());
    for (index, bytes) in page_sets.iter().enumerate() {
        match Document::load_mem(bytes) {
            Ok(doc) => documents.push(doc),
            Err(e) => {
                warn!(page_set = index, error = %e, "skipping page-set that failed to parse")
            }
        }
    }
    if documents.is_empty() {
        return Err(CompileError::Empty);
    }

    // Renumber each document into a disjoint id range so pages keep their
    // arrival order when collected into the id-ordered map below.
    let mut max_id = 1;
    let mut documents_pages: BTreeMap<ObjectId, Object> = BTreeMap::new();
    let mut documents_objects: BTreeMap<ObjectId, Object> = BTreeMap::new();
    let mut merged = Document::with_version("1.5");

    for mut doc in documents {
        doc.renumber_objects_with(max_id);
        max_id = doc.max_id + 1;
        for (_, object_id) in doc.get_pages() {
            if let Ok(object) = doc.get_object(object_id) {
                documents_pages.insert(object_id, object.to_owned());
            }
        }
        documents_objects.extend(doc.objects);
    }

    let mut catalog_object: Option<(ObjectId, Object)> = None;
    let mut pages_object: Option<(ObjectId, Object)> = None;

    for (object_id, object) in documents_objects.iter() {
        match dict_type(object) {
            Some(b"Catalog") => {
                let id = catalog_object.map(|(id, _)| id).unwrap_or(*object_id);
                catalog_object = Some((id, object.clone()));
            }
            Some(b"Pages") => {
                if let Ok(dict) = object.as_dict() {
                    let mut dict = dict.clone();
                    if let Some((_, ref existing)) = pages_object {
                        if let Ok(existing) = existing.as_dict() {
                            dict.extend(existing);
                        }
                    }
                    let id = pages_object.map(|(id, _)| id).unwrap_or(*object_id);
                    pages_object = Some((id, Object::Dictionary(dict)));
                }
            }
            // Page objects are re-attached below; outlines are dropped.
            Some(b"Page") | Some(b"Outlines") | Some(b"Outline") => {}
            _ => {
                merged.objects.insert(*object_id, object.clone());
            }
        }
    }

    let (pages_id, pages_dict) = match pages_object {
        Some(pages) => pages,
        None => return Err(CompileError::Empty),
    };
    let (catalog_id, catalog_dict) = match catalog_object {
        Some(catalog) => catalog,
        None => return Err(CompileError::Empty),
    };

    for (object_id, object) in documents_pages.iter() {
        if let Ok(dict) = object.as_dict() {
            let mut dict = dict.clone();
            dict.set("Parent", pages_id);
            merged.objects.insert(*object_id, Object::Dictionary(dict));
        }
    }

    if let Ok(dict) = pages_dict.as_dict() {
        let mut dict = dict.clone();
        dict.set("Count", documents_pages.len() as i64);
        dict.set(
            "Kids",
            documents_pages
                .keys()
                .map(|id| Object::Reference(*id))
                .collect::<Vec<_>>(),
        );
        merged.objects.insert(pages_id, Object::Dictionary(dict));
    }

    if let Ok(dict) = catalog_dict.as_dict() {
        let mut dict = dict.clone();
        dict.set("Pages", pages_id);
        dict.remove(b"Outlines");
        merged.objects.insert(catalog_id, Object::Dictionary(dict));
    }

    merged.trailer.set("Root", catalog_id);
    merged.max_id = merged.objects.len() as u32;
    merged.renumber_objects();
    merged.compress();

    let mut buffer = Vec::new();
    merged
        .save_to(&mut buffer)
        .map_err(|e| CompileError::Write(e.to_string()))?;
    Ok(buffer)
}

fn dict_type(object: &Object) -> Option<&[u8]> {
    object
        .as_dict()
        .ok()
        .and_then(|dict| dict.get(b"Type").ok())
        .and_then(|value| value.as_name().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text_item(content: &str) -> ContentItem {
        ContentItem::Text {
            content: content.to_string(),
        }
    }

    fn page_count(pdf: &[u8]) -> usize {
        Document::load_mem(pdf).unwrap().get_pages().len()
    }

    #[test]
    fn compiles_one_page_per_text_item() {
        let items = vec![text_item("alpha"), text_item("beta"), text_item("gamma")];
        let merged = compile_items(&items).unwrap();
        assert_eq!(page_count(&merged), 3);
    }

    #[test]
    fn corrupted_page_set_is_skipped_not_fatal() {
        let good_a = render::render_item(&text_item("first")).unwrap();
        let good_b = render::render_item(&text_item("second")).unwrap();
        let bad = b"%PDF-not really".to_vec();

        let merged = merge_page_sets(&[good_a, bad, good_b]).unwrap();
        assert_eq!(page_count(&merged), 2);
    }

    #[test]
    fn all_inputs_skipped_yields_empty() {
        let result = merge_page_sets(&[vec![1, 2, 3], vec![4, 5, 6]]);
        assert!(matches!(result, Err(CompileError::Empty)));
    }

    #[test]
    fn no_page_sets_yields_empty() {
        assert!(matches!(merge_page_sets(&[]), Err(CompileError::Empty)));
    }

    #[test]
    fn merged_output_is_parseable() {
        let items = vec![text_item("one"), text_item("two")];
        let merged = compile_items(&items).unwrap();
        let doc = Document::load_mem(&merged).unwrap();
        assert_eq!(doc.get_pages().len(), 2);
    }
}
