//! Shared fixtures for integration tests: in-test PDF generation and a
//! throwaway store/config layout.

#![allow(dead_code)]

use batchvault::{GroupId, GroupStore, NewMember, PersonalizeConfig, SqliteStore};
use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Document, Object, Stream};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

/// Route library logs to the test harness. `RUST_LOG` overrides the level.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_test_writer()
        .try_init();
}

/// A small US-letter PDF with `pages` pages of body text.
pub fn sample_pdf(pages: usize) -> Vec<u8> {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Times-Roman",
    });
    let mut kids = Vec::new();
    for n in 0..pages {
        let content = Content {
            operations: vec![
                Operation::new("BT", vec![]),
                Operation::new("Tf", vec!["F1".into(), 18.into()]),
                Operation::new("Td", vec![72.into(), 700.into()]),
                Operation::new(
                    "Tj",
                    vec![Object::string_literal(format!("Course syllabus, page {}", n + 1))],
                ),
                Operation::new("ET", vec![]),
            ],
        };
        let content_id = doc.add_object(Stream::new(dictionary! {}, content.encode().unwrap()));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
            "MediaBox" => vec![
                Object::Integer(0),
                Object::Integer(0),
                Object::Integer(612),
                Object::Integer(792),
            ],
            "Resources" => dictionary! {
                "Font" => dictionary! { "F1" => font_id },
            },
        });
        kids.push(Object::Reference(page_id));
    }
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => pages as i64,
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let mut bytes = Vec::new();
    doc.save_to(&mut bytes).unwrap();
    bytes
}

/// Every string shown with `Tj` on each page, decoded as Latin-1.
pub fn page_texts(path: &Path) -> Vec<Vec<String>> {
    let doc = Document::load(path).unwrap();
    doc.get_pages()
        .values()
        .map(|id| {
            let bytes = doc.get_page_content(*id).unwrap();
            Content::decode(&bytes)
                .unwrap()
                .operations
                .into_iter()
                .filter(|op| op.operator == "Tj")
                .filter_map(|op| match op.operands.first() {
                    Some(Object::String(s, _)) => Some(s.iter().map(|b| *b as char).collect::<String>()),
                    _ => None,
                })
                .collect::<Vec<String>>()
        })
        .collect()
}

/// File names directly inside `dir`, sorted. Missing directory reads as empty.
pub fn file_names(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = match std::fs::read_dir(dir) {
        Ok(entries) => entries
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect(),
        Err(_) => Vec::new(),
    };
    names.sort();
    names
}

/// Isolated database, output and scratch directories for one test.
pub struct Fixture {
    pub dir: tempfile::TempDir,
    pub store: Arc<SqliteStore>,
    pub group_id: GroupId,
}

impl Fixture {
    /// A group named `Math-101` holding `members` in order.
    pub fn with_members(members: &[&str]) -> Self {
        init_tracing();
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(SqliteStore::open(dir.path().join("batchvault.db")).unwrap());
        let group = store.create_group("Math-101").unwrap();
        for (i, name) in members.iter().enumerate() {
            store
                .add_member(group.id, &NewMember::new(*name, format!("555-01{:02}", i)))
                .unwrap();
        }
        Self {
            dir,
            store,
            group_id: group.id,
        }
    }

    pub fn output_dir(&self) -> PathBuf {
        self.dir.path().join("pdfs")
    }

    pub fn scratch_dir(&self) -> PathBuf {
        self.dir.path().join("scratch")
    }

    pub fn config(&self) -> PersonalizeConfig {
        PersonalizeConfig::builder()
            .output_dir(self.output_dir())
            .scratch_dir(self.scratch_dir())
            .build()
            .unwrap()
    }

    /// Output references currently stored, in member order.
    pub fn stored_references(&self) -> Vec<Option<String>> {
        self.store
            .find_group(self.group_id)
            .unwrap()
            .unwrap()
            .members
            .into_iter()
            .map(|m| m.output_reference)
            .collect()
    }
}
