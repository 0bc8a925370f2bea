//! Batch personalization entry points.
//!
//! One call renders a watermarked copy of the uploaded template for every
//! member of a group, in load order, one member at a time:
//!
//! ```text
//! resolve ─▶ store template ─▶ render × N ─▶ commit ─▶ publish ─▶ cleanup
//!    │              │               │           │
//!    └ NotFound /   └ Storage       └ absorbed  └ Persistence
//!      EmptyGroup                     per member
//! ```
//!
//! A failed render only lowers the generated count. The transient template
//! is removed on every exit path, including errors and panics.

use crate::config::PersonalizeConfig;
use crate::error::BatchVaultError;
use crate::model::{BatchReport, Group, GroupId, OutputUpdate, RecipientOutcome};
use crate::pipeline::register::{publish_staged, OutputRegistrar};
use crate::pipeline::resolve::resolve_recipients;
use crate::pipeline::sanitize::OutputNamer;
use crate::pipeline::scratch::{ScratchTemplate, StagingArea};
use crate::pipeline::watermark::{DocumentRenderer, WatermarkRenderer};
use crate::store::GroupStore;
use std::fmt;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Runs personalization batches against a store.
///
/// Cheap to clone; the store and renderer are shared.
///
/// # Example
/// ```rust,no_run
/// use batchvault::{NewMember, PersonalizeConfig, Personalizer, SqliteStore, GroupStore};
/// use std::sync::Arc;
///
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let store = Arc::new(SqliteStore::open("batchvault.db")?);
/// let group = store.create_group("Math-101")?;
/// store.add_member(group.id, &NewMember::new("Ann Lee", "555-0100"))?;
///
/// let personalizer = Personalizer::new(store, PersonalizeConfig::default());
/// let report = personalizer.personalize_file(group.id, "syllabus.pdf")?;
/// println!("{}", report.response().message);
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct Personalizer {
    store: Arc<dyn GroupStore>,
    renderer: Arc<dyn DocumentRenderer>,
    config: PersonalizeConfig,
}

impl fmt::Debug for Personalizer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Personalizer")
            .field("store", &"<dyn GroupStore>")
            .field("renderer", &"<dyn DocumentRenderer>")
            .field("config", &self.config)
            .finish()
    }
}

impl Personalizer {
    /// A personalizer using the PDF [`WatermarkRenderer`].
    pub fn new(store: Arc<dyn GroupStore>, config: PersonalizeConfig) -> Self {
        Self {
            store,
            renderer: Arc::new(WatermarkRenderer),
            config,
        }
    }

    /// Replace the renderer.
    pub fn with_renderer(mut self, renderer: Arc<dyn DocumentRenderer>) -> Self {
        self.renderer = renderer;
        self
    }

    pub fn config(&self) -> &PersonalizeConfig {
        &self.config
    }

    /// Render one copy of `template_bytes` per member of `group_id`.
    ///
    /// Blocks until the batch is committed. Use [`Self::personalize_async`]
    /// from async code.
    ///
    /// # Returns
    /// `Ok(BatchReport)` whenever the batch was recorded, even if every
    /// render failed (`generated_count == 0`).
    ///
    /// # Errors
    /// * [`BatchVaultError::GroupNotFound`]: before any file I/O.
    /// * [`BatchVaultError::EmptyGroup`]: before any file I/O.
    /// * [`BatchVaultError::Storage`]: scratch or output directory unusable.
    /// * [`BatchVaultError::Persistence`]: the commit failed; no output
    ///   file is published and no reference changes.
    pub fn personalize(
        &self,
        group_id: GroupId,
        template_bytes: &[u8],
        template_name: &str,
    ) -> Result<BatchReport, BatchVaultError> {
        let start = Instant::now();
        info!(
            "Starting personalization of '{}' for group {}",
            template_name, group_id
        );

        // ── Step 1: Resolve recipients ───────────────────────────────────
        let group = resolve_recipients(self.store.as_ref(), group_id)?;

        if !template_bytes.starts_with(b"%PDF") {
            warn!(
                "Template '{}' does not start with a PDF header; renders will likely fail",
                template_name
            );
        }

        // ── Step 2: Store the template for this request ──────────────────
        let template = ScratchTemplate::create(
            &self.config.scratch_dir(),
            group_id,
            template_name,
            template_bytes,
        )?;

        // ── Steps 3–4: Render and register ───────────────────────────────
        let result = self.render_and_register(group, &template, template_name);

        // ── Step 5: Cleanup, whatever happened above ─────────────────────
        template.cleanup();

        let report = result?;
        info!(
            "Personalization complete: {}/{} documents for group {} in {}ms",
            report.generated_count,
            report.recipients.len(),
            group_id,
            start.elapsed().as_millis()
        );
        Ok(report)
    }

    /// Async wrapper around [`Self::personalize`].
    ///
    /// The batch runs on tokio's blocking pool; file and store operations
    /// never stall the async workers.
    pub async fn personalize_async(
        &self,
        group_id: GroupId,
        template_bytes: Vec<u8>,
        template_name: String,
    ) -> Result<BatchReport, BatchVaultError> {
        let this = self.clone();
        tokio::task::spawn_blocking(move || {
            this.personalize(group_id, &template_bytes, &template_name)
        })
        .await
        .map_err(|e| BatchVaultError::Internal(format!("Personalization task panicked: {}", e)))?
    }

    /// Read a template from disk and personalize it. The file's name is
    /// used as the template name.
    pub fn personalize_file(
        &self,
        group_id: GroupId,
        path: impl AsRef<Path>,
    ) -> Result<BatchReport, BatchVaultError> {
        let path = path.as_ref();
        let bytes = std::fs::read(path).map_err(|e| BatchVaultError::TemplateRead {
            path: path.to_path_buf(),
            source: e,
        })?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "upload.pdf".to_string());
        self.personalize(group_id, &bytes, &name)
    }

    fn render_and_register(
        &self,
        mut group: Group,
        template: &ScratchTemplate,
        template_name: &str,
    ) -> Result<BatchReport, BatchVaultError> {
        let output_dir = &self.config.output_dir;
        std::fs::create_dir_all(output_dir).map_err(|e| BatchVaultError::Storage {
            path: output_dir.clone(),
            source: e,
        })?;
        let staging = StagingArea::create(output_dir)?;

        let mut namer = OutputNamer::new(template_name, self.config.collision_policy);
        let callback = self.config.progress_callback.as_ref();
        let total = group.members.len();
        if let Some(cb) = callback {
            cb.on_batch_start(total);
        }

        let mut outcomes = Vec::with_capacity(total);
        let mut updates = Vec::with_capacity(total);

        for (idx, member) in group.members.iter_mut().enumerate() {
            let index = idx + 1;
            let file_name = namer.file_name_for(member);
            if let Some(cb) = callback {
                cb.on_recipient_start(index, total, &member.name);
            }

            let staged = staging.path_for(&file_name);
            match self.renderer.render(template.path(), &staged, &member.name) {
                Ok(pages) => {
                    let reference = self.config.public_reference(&file_name);
                    debug!(
                        "Rendered {} pages for member {} → '{}'",
                        pages, member.id, file_name
                    );
                    if let Some(cb) = callback {
                        cb.on_recipient_complete(index, total, &member.name, &file_name);
                    }
                    member.output_reference = Some(reference.clone());
                    updates.push(OutputUpdate {
                        member_id: member.id,
                        output_reference: reference.clone(),
                    });
                    outcomes.push(RecipientOutcome::rendered(member, file_name, reference));
                }
                Err(e) => {
                    warn!(
                        "Render failed for member {} ('{}'): {}",
                        member.id, member.name, e
                    );
                    if let Some(cb) = callback {
                        cb.on_recipient_error(index, total, &member.name, &e.to_string());
                    }
                    outcomes.push(RecipientOutcome::failed(member, file_name, e));
                }
            }
        }

        let generated_count = updates.len();
        if let Err(e) = OutputRegistrar::new(self.store.as_ref()).commit(&updates) {
            staging.discard();
            return Err(e);
        }
        let unpublished = publish_staged(staging, output_dir, &outcomes);
        if !unpublished.is_empty() {
            warn!(
                "{} of {} committed documents could not be published",
                unpublished.len(),
                generated_count
            );
        }

        if let Some(cb) = callback {
            cb.on_batch_complete(total, generated_count);
        }

        Ok(BatchReport {
            group,
            generated_count,
            recipients: outcomes,
            unpublished,
        })
    }
}
