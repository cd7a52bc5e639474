//! In-process PDF transforms built on lopdf: page append (merge), per-page
//! extraction (split), and page counting.
//!
//! These are CPU-bound and synchronous; handlers run them on
//! `tokio::task::spawn_blocking`.

use anyhow::{Context, Result, bail};
use lopdf::{Document, Object, ObjectId};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::services::staging::StagingStore;

pub fn page_count(path: &Path) -> Result<usize> {
    let doc = Document::load(path).context("failed to parse PDF")?;
    Ok(doc.get_pages().len())
}

/// Append the pages of every input, in input order, into one output document.
///
/// Each source document's objects are renumbered into a disjoint id range,
/// pages are re-parented under a single Pages node, and bookkeeping objects
/// (Outlines) are dropped rather than stitched together.
pub fn merge_documents(inputs: &[PathBuf], output: &Path) -> Result<()> {
    if inputs.is_empty() {
        bail!("no input documents");
    }

    let mut max_id = 1;
    let mut pages: BTreeMap<ObjectId, Object> = BTreeMap::new();
    let mut objects: BTreeMap<ObjectId, Object> = BTreeMap::new();

    for input in inputs {
        let mut doc = Document::load(input).context("failed to parse PDF")?;
        doc.renumber_objects_with(max_id);
        max_id = doc.max_id + 1;

        for (_, object_id) in doc.get_pages() {
            let page = doc
                .get_object(object_id)
                .context("page object missing")?
                .to_owned();
            pages.insert(object_id, page);
        }
        objects.extend(doc.objects);
    }

    let mut merged = Document::with_version("1.5");
    let mut catalog: Option<(ObjectId, Object)> = None;
    let mut pages_root: Option<(ObjectId, Object)> = None;

    for (object_id, object) in objects {
        match object_type(&object) {
            b"Catalog" => {
                // Keep the first catalog's id; later ones are redundant.
                let id = catalog.as_ref().map(|(id, _)| *id).unwrap_or(object_id);
                catalog = Some((id, object));
            }
            b"Pages" => {
                if let Ok(dict) = object.as_dict() {
                    let mut dict = dict.clone();
                    if let Some((_, Object::Dictionary(prev))) = &pages_root {
                        dict.extend(prev);
                    }
                    let id = pages_root.as_ref().map(|(id, _)| *id).unwrap_or(object_id);
                    pages_root = Some((id, Object::Dictionary(dict)));
                }
            }
            // Page objects are re-inserted below with a fixed Parent;
            // outline trees are not merged.
            b"Page" | b"Outlines" | b"Outline" => {}
            _ => {
                merged.objects.insert(object_id, object);
            }
        }
    }

    let (pages_id, pages_obj) = pages_root.context("input PDFs carry no Pages tree")?;
    let (catalog_id, catalog_obj) = catalog.context("input PDFs carry no Catalog")?;

    for (object_id, object) in &pages {
        let mut dict = object.as_dict().context("page is not a dictionary")?.clone();
        dict.set("Parent", pages_id);
        merged
            .objects
            .insert(*object_id, Object::Dictionary(dict));
    }

    let mut pages_dict = pages_obj
        .as_dict()
        .context("Pages is not a dictionary")?
        .clone();
    pages_dict.set("Count", pages.len() as u32);
    pages_dict.set(
        "Kids",
        pages
            .keys()
            .map(|id| Object::Reference(*id))
            .collect::<Vec<_>>(),
    );
    merged.objects.insert(pages_id, Object::Dictionary(pages_dict));

    let mut catalog_dict = catalog_obj
        .as_dict()
        .context("Catalog is not a dictionary")?
        .clone();
    catalog_dict.set("Pages", pages_id);
    catalog_dict.remove(b"Outlines");
    merged
        .objects
        .insert(catalog_id, Object::Dictionary(catalog_dict));

    merged.trailer.set("Root", catalog_id);
    merged.max_id = merged.objects.len() as u32;
    merged.renumber_objects();
    merged.compress();
    merged.save(output).context("failed to write merged PDF")?;
    Ok(())
}

/// Extract every page of `input` into its own single-page document, in page
/// order, each written to a fresh staging path.
pub fn split_document(input: &Path, staging: &StagingStore) -> Result<Vec<PathBuf>> {
    let doc = Document::load(input).context("failed to parse PDF")?;
    let total = doc.get_pages().len() as u32;
    if total == 0 {
        bail!("document has no pages");
    }

    let mut outputs = Vec::with_capacity(total as usize);
    for page in 1..=total {
        let mut single = doc.clone();
        let discard: Vec<u32> = (1..=total).filter(|p| *p != page).collect();
        single.delete_pages(&discard);
        single.prune_objects();
        single.renumber_objects();
        single.compress();

        let path = staging.allocate("pdf");
        single
            .save(&path)
            .with_context(|| format!("failed to write page {page}"))?;
        outputs.push(path);
    }
    Ok(outputs)
}

fn object_type(object: &Object) -> &[u8] {
    object
        .as_dict()
        .ok()
        .and_then(|d| d.get(b"Type").ok())
        .and_then(|t| t.as_name().ok())
        .unwrap_or(b"")
}
