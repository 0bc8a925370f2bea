//! # batchvault
//!
//! Personalize one uploaded PDF template for every member of a group.
//!
//! Each member gets their own copy of the template with
//! `"Property of: {name}"` stamped in small gray text near the bottom-left
//! corner of every page. The public path of that copy is recorded on the
//! member, so the group's roster doubles as an index of who received what.
//!
//! ## Pipeline Overview
//!
//! ```text
//! template bytes + group id
//!  │
//!  ├─ 1. Resolve   load the group, reject unknown or empty groups
//!  ├─ 2. Scratch   store the template under a unique transient name
//!  ├─ 3. Render    one watermarked copy per member (lopdf), into staging
//!  ├─ 4. Register  commit every output reference in one transaction
//!  ├─ 5. Publish   move staged files into the output directory
//!  └─ 6. Cleanup   remove the transient template, on every path
//! ```
//!
//! A member whose render fails is skipped; the batch still succeeds with a
//! smaller count.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use batchvault::{GroupStore, NewMember, PersonalizeConfig, Personalizer, SqliteStore};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let store = Arc::new(SqliteStore::open("batchvault.db")?);
//!     let group = store.create_group("Math-101")?;
//!     store.add_member(group.id, &NewMember::new("Ann Lee", "555-0100"))?;
//!     store.add_member(group.id, &NewMember::new("Bo#1", "555-0101"))?;
//!
//!     let personalizer = Personalizer::new(store, PersonalizeConfig::default());
//!     let template = std::fs::read("syllabus.pdf")?;
//!     let report = personalizer
//!         .personalize_async(group.id, template, "syllabus.pdf".into())
//!         .await?;
//!
//!     // "Successfully generated 2 PDFs"
//!     println!("{}", report.response().message);
//!     for member in &report.group.members {
//!         println!("{} -> {:?}", member.name, member.output_reference);
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `batchvault` binary (clap + anyhow + tracing-subscriber + indicatif) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! batchvault = { version = "0.1", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod error;
pub mod model;
pub mod personalize;
pub mod pipeline;
pub mod progress;
pub mod store;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{
    database_path_from_url, CollisionPolicy, DatabaseLocation, PersonalizeConfig,
    PersonalizeConfigBuilder, DEFAULT_DATABASE_URL,
};
pub use error::{BatchVaultError, RenderError};
pub use model::{
    BatchReport, Group, GroupId, Member, MemberId, NewMember, OutputUpdate, PersonalizeResponse,
    RecipientOutcome,
};
pub use personalize::Personalizer;
pub use pipeline::watermark::{DocumentRenderer, WatermarkRenderer};
pub use progress::{BatchProgressCallback, NoopProgressCallback, ProgressCallback};
pub use store::{GroupStore, SqliteStore, StoreError};
