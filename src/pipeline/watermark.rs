//! Watermark rendering: stamp `"Property of: {label}"` on every page.
//!
//! The overlay is fixed: Helvetica 11 pt, light gray (0.7), baseline 50
//! units right of and 30 units above the lower-left corner of each page as
//! displayed, whatever the page size. The displayed area is the CropBox
//! clipped to the MediaBox; on pages with `/Rotate` the text is turned so it
//! still reads left to right along the displayed bottom edge. The template is loaded fresh for every
//! recipient and never written back; the stamped copy goes to `output`.
//!
//! Each page keeps its original content streams, wrapped in `q`/`Q` so any
//! graphics state they leave behind cannot move or recolour the overlay, and
//! gains one extra stream holding the overlay text.

use crate::error::RenderError;
use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Dictionary, Document, Object, ObjectId, Stream};
use std::path::Path;
use tracing::{debug, warn};

/// Text placed before the recipient's name.
pub const LABEL_PREFIX: &str = "Property of: ";
/// Horizontal offset from the left page edge, in PDF units.
pub const OFFSET_X: f32 = 50.0;
/// Vertical offset above the bottom page edge, in PDF units.
pub const OFFSET_Y: f32 = 30.0;
pub const FONT_SIZE: f32 = 11.0;
/// Gray level for the fill colour (each RGB component).
pub const GRAY: f32 = 0.7;

/// Resource name the overlay font is registered under on each page.
const FONT_KEY: &str = "BvWatermarkHelv";

/// Inheritance chains deeper than this are treated as malformed.
const MAX_TREE_DEPTH: usize = 64;

/// Produces one personalised copy of a template.
///
/// A failure is returned as a [`RenderError`] value for the caller to record;
/// it must never abort the surrounding batch.
pub trait DocumentRenderer: Send + Sync {
    /// Render `template` stamped with `label` into `output`.
    ///
    /// Returns the number of pages stamped.
    fn render(&self, template: &Path, output: &Path, label: &str) -> Result<usize, RenderError>;
}

/// The PDF watermark renderer used by default.
#[derive(Debug, Clone, Copy, Default)]
pub struct WatermarkRenderer;

impl DocumentRenderer for WatermarkRenderer {
    fn render(&self, template: &Path, output: &Path, label: &str) -> Result<usize, RenderError> {
        watermark_document(template, output, label)
    }
}

/// Stamp `template` into `output` and report plain success or failure.
///
/// This is the boolean form of the renderer contract, for callers that only
/// need to know whether a copy was produced. Failures are logged here and
/// never surface as errors. Batches go through [`DocumentRenderer`] instead,
/// which keeps the [`RenderError`] for each recipient's outcome.
pub fn render(template: &Path, output: &Path, label: &str) -> bool {
    match watermark_document(template, output, label) {
        Ok(_) => true,
        Err(e) => {
            warn!("Error watermarking PDF for '{}': {}", label, e);
            false
        }
    }
}

/// The full overlay text for a recipient.
pub fn watermark_text(label: &str) -> String {
    format!("{}{}", LABEL_PREFIX, label)
}

/// Load, stamp every page, save. See the module docs for the overlay layout.
pub fn watermark_document(template: &Path, output: &Path, label: &str) -> Result<usize, RenderError> {
    let mut doc = Document::load(template).map_err(|e| RenderError::Open {
        detail: e.to_string(),
    })?;

    let pages: Vec<ObjectId> = doc.get_pages().into_values().collect();
    if pages.is_empty() {
        return Err(RenderError::NoPages);
    }

    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica",
        "Encoding" => "WinAnsiEncoding",
    });
    let text = encode_win_ansi(&watermark_text(label));

    for (idx, page_id) in pages.iter().enumerate() {
        stamp_page(&mut doc, *page_id, font_id, &text).map_err(|e| RenderError::Stamp {
            page: idx + 1,
            detail: e.to_string(),
        })?;
    }

    if let Err(e) = doc.save(output) {
        // Do not leave a truncated document where a good one is expected.
        if output.exists() {
            if let Err(rm) = std::fs::remove_file(output) {
                debug!("Could not remove partial output {}: {}", output.display(), rm);
            }
        }
        return Err(RenderError::Save {
            path: output.to_path_buf(),
            detail: e.to_string(),
        });
    }

    debug!(
        "Watermarked {} pages for '{}' → {}",
        pages.len(),
        label,
        output.display()
    );
    Ok(pages.len())
}

/// Bytes for a Helvetica/WinAnsi literal string. Characters outside
/// Latin-1, and control characters, become `?`.
fn encode_win_ansi(text: &str) -> Vec<u8> {
    text.chars()
        .map(|c| match u32::from(c) {
            0x20..=0x7E | 0xA0..=0xFF => u32::from(c) as u8,
            _ => b'?',
        })
        .collect()
}

fn stamp_page(
    doc: &mut Document,
    page_id: ObjectId,
    font_id: ObjectId,
    text: &[u8],
) -> Result<(), lopdf::Error> {
    let matrix = overlay_matrix(visible_box(doc, page_id), page_rotation(doc, page_id));
    register_font(doc, page_id, font_id)?;

    let overlay = Content {
        operations: vec![
            Operation::new("q", vec![]),
            Operation::new("BT", vec![]),
            Operation::new("Tf", vec![FONT_KEY.into(), FONT_SIZE.into()]),
            Operation::new("rg", vec![GRAY.into(), GRAY.into(), GRAY.into()]),
            Operation::new("Tm", matrix.iter().map(|v| Object::from(*v)).collect()),
            Operation::new("Tj", vec![Object::string_literal(text.to_vec())]),
            Operation::new("ET", vec![]),
            Operation::new("Q", vec![]),
        ],
    };
    let overlay_id = doc.add_object(Stream::new(dictionary! {}, overlay.encode()?));
    let save_id = doc.add_object(Stream::new(dictionary! {}, b"q\n".to_vec()));
    let restore_id = doc.add_object(Stream::new(dictionary! {}, b"\nQ\n".to_vec()));

    let mut contents = existing_contents(doc, page_id)?;
    contents.insert(0, Object::Reference(save_id));
    contents.push(Object::Reference(restore_id));
    contents.push(Object::Reference(overlay_id));

    doc.get_dictionary_mut(page_id)?.set("Contents", contents);
    Ok(())
}

/// The page's content streams as a flat list of references.
fn existing_contents(doc: &Document, page_id: ObjectId) -> Result<Vec<Object>, lopdf::Error> {
    let page = doc.get_dictionary(page_id)?;
    let contents = match page.get(b"Contents") {
        Ok(Object::Reference(id)) => match doc.get_object(*id)? {
            // An indirect array of streams rather than a single stream.
            Object::Array(items) => items.clone(),
            _ => vec![Object::Reference(*id)],
        },
        Ok(Object::Array(items)) => items.clone(),
        _ => Vec::new(),
    };
    Ok(contents)
}

/// Make `FONT_KEY` resolve to `font_id` in the page's font resources.
///
/// Resources may be inline, indirect, or inherited from an ancestor in the
/// page tree. An inherited entry is copied onto the page first; when it is a
/// reference the dictionary stays shared with the sibling pages.
fn register_font(doc: &mut Document, page_id: ObjectId, font_id: ObjectId) -> Result<(), lopdf::Error> {
    let resources = match doc.get_dictionary(page_id)?.get(b"Resources") {
        Ok(obj) => Some(obj.clone()),
        Err(_) => None,
    };
    let resources = match resources {
        Some(obj) => obj,
        None => {
            let inherited = inherited_attribute(doc, page_id, b"Resources")
                .unwrap_or_else(|| Object::Dictionary(Dictionary::new()));
            doc.get_dictionary_mut(page_id)?
                .set("Resources", inherited.clone());
            inherited
        }
    };

    let resources_id = match resources {
        Object::Reference(id) => Some(id),
        _ => None,
    };

    // The Font entry itself may also be indirect.
    let fonts_id = {
        let res = match resources_id {
            Some(id) => doc.get_dictionary(id)?,
            None => doc.get_dictionary(page_id)?.get(b"Resources")?.as_dict()?,
        };
        match res.get(b"Font") {
            Ok(Object::Reference(id)) => Some(*id),
            _ => None,
        }
    };
    if let Some(id) = fonts_id {
        doc.get_dictionary_mut(id)?.set(FONT_KEY, font_id);
        return Ok(());
    }

    let res = match resources_id {
        Some(id) => doc.get_dictionary_mut(id)?,
        None => doc
            .get_dictionary_mut(page_id)?
            .get_mut(b"Resources")?
            .as_dict_mut()?,
    };
    match res.get_mut(b"Font") {
        Ok(Object::Dictionary(fonts)) => fonts.set(FONT_KEY, font_id),
        _ => res.set("Font", dictionary! { FONT_KEY => font_id }),
    }
    Ok(())
}

/// Look up a page attribute, walking up `Parent` links when it is inherited.
fn inherited_attribute(doc: &Document, page_id: ObjectId, key: &[u8]) -> Option<Object> {
    let mut node = page_id;
    for _ in 0..MAX_TREE_DEPTH {
        let dict = doc.get_dictionary(node).ok()?;
        if let Ok(value) = dict.get(key) {
            return Some(value.clone());
        }
        node = dict.get(b"Parent").ok()?.as_reference().ok()?;
    }
    None
}

/// The displayed area of a page: its CropBox clipped to the MediaBox, or the
/// MediaBox alone when there is no usable CropBox. Normalised to
/// `[llx, lly, urx, ury]`; US Letter when neither box can be read.
fn visible_box(doc: &Document, page_id: ObjectId) -> [f32; 4] {
    let media = page_box(doc, page_id, b"MediaBox").unwrap_or([0.0, 0.0, 612.0, 792.0]);
    match page_box(doc, page_id, b"CropBox") {
        Some(crop) => {
            let clipped = [
                crop[0].max(media[0]),
                crop[1].max(media[1]),
                crop[2].min(media[2]),
                crop[3].min(media[3]),
            ];
            if clipped[0] < clipped[2] && clipped[1] < clipped[3] {
                clipped
            } else {
                media
            }
        }
        None => media,
    }
}

fn page_box(doc: &Document, page_id: ObjectId, key: &[u8]) -> Option<[f32; 4]> {
    let obj = match inherited_attribute(doc, page_id, key)? {
        Object::Reference(id) => doc.get_object(id).ok()?.clone(),
        other => other,
    };
    let coords: Vec<f32> = match obj {
        Object::Array(items) => items.iter().filter_map(number).collect(),
        _ => return None,
    };
    if coords.len() != 4 {
        return None;
    }
    Some([
        coords[0].min(coords[2]),
        coords[1].min(coords[3]),
        coords[0].max(coords[2]),
        coords[1].max(coords[3]),
    ])
}

/// Inherited `/Rotate` as 0, 90, 180 or 270. Anything else counts as 0.
fn page_rotation(doc: &Document, page_id: ObjectId) -> i64 {
    let degrees = match inherited_attribute(doc, page_id, b"Rotate") {
        Some(Object::Integer(d)) => d,
        Some(Object::Real(d)) => d as i64,
        _ => 0,
    };
    match degrees.rem_euclid(360) {
        r @ (90 | 180 | 270) => r,
        _ => 0,
    }
}

/// Text matrix that puts the baseline `OFFSET_X` right of and `OFFSET_Y`
/// above the lower-left corner of the page as displayed, reading left to
/// right for the viewer. `/Rotate` turns the page clockwise on screen, so the
/// text is turned the same amount the other way in user space.
fn overlay_matrix(visible: [f32; 4], rotation: i64) -> [f32; 6] {
    let [x0, y0, x1, y1] = visible;
    match rotation {
        90 => [0.0, 1.0, -1.0, 0.0, x1 - OFFSET_Y, y0 + OFFSET_X],
        180 => [-1.0, 0.0, 0.0, -1.0, x1 - OFFSET_X, y1 - OFFSET_Y],
        270 => [0.0, -1.0, 1.0, 0.0, x0 + OFFSET_Y, y1 - OFFSET_X],
        _ => [1.0, 0.0, 0.0, 1.0, x0 + OFFSET_X, y0 + OFFSET_Y],
    }
}

fn number(obj: &Object) -> Option<f32> {
    match obj {
        Object::Integer(i) => Some(*i as f32),
        Object::Real(r) => Some(*r as f32),
        _ => None,
    }
}
