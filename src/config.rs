//! Configuration types for document personalization.
//!
//! All batch behaviour is controlled through [`PersonalizeConfig`], built via
//! its [`PersonalizeConfigBuilder`]. The watermark itself (text, position,
//! size, colour) is fixed and lives in [`crate::pipeline::watermark`]; only
//! where files go and how they are named is configurable.

use crate::error::BatchVaultError;
use crate::progress::ProgressCallback;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

/// Default database location, relative to the working directory.
pub const DEFAULT_DATABASE_URL: &str = "sqlite:///./batchvault.db";

/// Configuration for a personalization batch.
///
/// Built via [`PersonalizeConfig::builder()`] or using
/// [`PersonalizeConfig::default()`].
///
/// # Example
/// ```rust
/// use batchvault::{CollisionPolicy, PersonalizeConfig};
///
/// let config = PersonalizeConfig::builder()
///     .output_dir("/srv/batchvault/pdfs")
///     .public_prefix("/pdfs")
///     .collision_policy(CollisionPolicy::Overwrite)
///     .build()
///     .unwrap();
/// assert_eq!(config.public_reference("a (Ann).pdf"), "/pdfs/a (Ann).pdf");
/// ```
#[derive(Clone)]
pub struct PersonalizeConfig {
    /// Flat directory the generated documents are published into. Default: `pdfs`.
    ///
    /// A static-file server maps [`Self::public_prefix`] 1:1 onto this directory.
    pub output_dir: PathBuf,

    /// Public path prefix under which `output_dir` is served. Default: `/pdfs`.
    pub public_prefix: String,

    /// Where the uploaded template is stored for the duration of one batch.
    /// Default: the system temporary directory.
    pub scratch_dir: Option<PathBuf>,

    /// What to do when two recipients map to the same output file name.
    /// Default: [`CollisionPolicy::Disambiguate`].
    pub collision_policy: CollisionPolicy,

    /// Receives per-recipient progress events.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for PersonalizeConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("pdfs"),
            public_prefix: "/pdfs".to_string(),
            scratch_dir: None,
            collision_policy: CollisionPolicy::default(),
            progress_callback: None,
        }
    }
}

impl fmt::Debug for PersonalizeConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PersonalizeConfig")
            .field("output_dir", &self.output_dir)
            .field("public_prefix", &self.public_prefix)
            .field("scratch_dir", &self.scratch_dir)
            .field("collision_policy", &self.collision_policy)
            .field(
                "progress_callback",
                &self
                    .progress_callback
                    .as_ref()
                    .map(|_| "<dyn BatchProgressCallback>"),
            )
            .finish()
    }
}

impl PersonalizeConfig {
    /// Create a new builder for `PersonalizeConfig`.
    pub fn builder() -> PersonalizeConfigBuilder {
        PersonalizeConfigBuilder {
            config: Self::default(),
        }
    }

    /// Scratch directory for transient templates.
    pub fn scratch_dir(&self) -> PathBuf {
        self.scratch_dir
            .clone()
            .unwrap_or_else(std::env::temp_dir)
    }

    /// Public-facing reference for a file in the output directory.
    pub fn public_reference(&self, file_name: &str) -> String {
        format!("{}/{}", self.public_prefix.trim_end_matches('/'), file_name)
    }
}

/// Builder for [`PersonalizeConfig`].
#[derive(Debug)]
pub struct PersonalizeConfigBuilder {
    config: PersonalizeConfig,
}

impl PersonalizeConfigBuilder {
    pub fn output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.output_dir = dir.into();
        self
    }

    pub fn public_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.config.public_prefix = prefix.into();
        self
    }

    pub fn scratch_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.scratch_dir = Some(dir.into());
        self
    }

    pub fn collision_policy(mut self, policy: CollisionPolicy) -> Self {
        self.config.collision_policy = policy;
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<PersonalizeConfig, BatchVaultError> {
        let c = &self.config;
        if c.output_dir.as_os_str().is_empty() {
            return Err(BatchVaultError::InvalidConfig(
                "output directory must not be empty".into(),
            ));
        }
        if !c.public_prefix.starts_with('/') {
            return Err(BatchVaultError::InvalidConfig(format!(
                "public prefix must start with '/', got '{}'",
                c.public_prefix
            )));
        }
        Ok(self.config)
    }
}

// ── Enums ────────────────────────────────────────────────────────────────

/// How to name outputs when two recipients' sanitized names collide.
///
/// `"Bo#1"` and `"Bo1"` both sanitize to `"Bo1"`, so both would be written to
/// `"<template> (Bo1).pdf"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum CollisionPolicy {
    /// First recipient keeps the plain name; later ones get `_<member id>`
    /// appended before the extension. (default)
    #[default]
    Disambiguate,
    /// Later recipients silently replace the earlier file.
    Overwrite,
}

// ── Database location ────────────────────────────────────────────────────

/// Where the SQLite database lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DatabaseLocation {
    InMemory,
    File(PathBuf),
}

/// Parse a `DATABASE_URL`-style string into a [`DatabaseLocation`].
///
/// Accepts `sqlite:///relative/or/abs`, `sqlite://path`, `sqlite::memory:`
/// and bare file paths. Any other scheme is rejected.
pub fn database_path_from_url(url: &str) -> Result<DatabaseLocation, BatchVaultError> {
    let url = url.trim();
    if url.is_empty() {
        return Err(BatchVaultError::InvalidConfig("database URL is empty".into()));
    }
    if url == "sqlite::memory:" || url == ":memory:" || url == "sqlite://:memory:" {
        return Ok(DatabaseLocation::InMemory);
    }
    if let Some(rest) = url.strip_prefix("sqlite://") {
        // sqlite:///rel/x.db -> rel/x.db, sqlite:////abs/x.db -> /abs/x.db
        let path = rest.strip_prefix('/').unwrap_or(rest);
        if path.is_empty() {
            return Err(BatchVaultError::InvalidConfig(format!(
                "database URL '{}' has no path",
                url
            )));
        }
        return Ok(DatabaseLocation::File(PathBuf::from(path)));
    }
    if let Some((scheme, _)) = url.split_once("://") {
        return Err(BatchVaultError::InvalidConfig(format!(
            "unsupported database scheme '{}': only sqlite is supported",
            scheme
        )));
    }
    Ok(DatabaseLocation::File(Path::new(url).to_path_buf()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_static_layout() {
        let c = PersonalizeConfig::default();
        assert_eq!(c.output_dir, PathBuf::from("pdfs"));
        assert_eq!(c.public_prefix, "/pdfs");
        assert_eq!(c.collision_policy, CollisionPolicy::Disambiguate);
        assert!(c.progress_callback.is_none());
    }

    #[test]
    fn public_reference_joins_once() {
        let c = PersonalizeConfig::builder()
            .public_prefix("/static/pdfs/")
            .build()
            .unwrap();
        assert_eq!(
            c.public_reference("syllabus (Ann Lee).pdf"),
            "/static/pdfs/syllabus (Ann Lee).pdf"
        );
    }

    #[test]
    fn builder_rejects_relative_prefix() {
        let err = PersonalizeConfig::builder()
            .public_prefix("pdfs")
            .build()
            .unwrap_err();
        assert!(matches!(err, BatchVaultError::InvalidConfig(_)));
    }

    #[test]
    fn builder_rejects_empty_output_dir() {
        assert!(PersonalizeConfig::builder().output_dir("").build().is_err());
    }

    #[test]
    fn scratch_dir_falls_back_to_temp() {
        assert_eq!(PersonalizeConfig::default().scratch_dir(), std::env::temp_dir());
        let c = PersonalizeConfig::builder().scratch_dir("/var/tmp/bv").build().unwrap();
        assert_eq!(c.scratch_dir(), PathBuf::from("/var/tmp/bv"));
    }

    #[test]
    fn database_urls() {
        assert_eq!(
            database_path_from_url(DEFAULT_DATABASE_URL).unwrap(),
            DatabaseLocation::File(PathBuf::from("./batchvault.db"))
        );
        assert_eq!(
            database_path_from_url("sqlite:////var/lib/bv.db").unwrap(),
            DatabaseLocation::File(PathBuf::from("/var/lib/bv.db"))
        );
        assert_eq!(
            database_path_from_url("sqlite://bv.db").unwrap(),
            DatabaseLocation::File(PathBuf::from("bv.db"))
        );
        assert_eq!(
            database_path_from_url("sqlite::memory:").unwrap(),
            DatabaseLocation::InMemory
        );
        assert_eq!(
            database_path_from_url("data/bv.db").unwrap(),
            DatabaseLocation::File(PathBuf::from("data/bv.db"))
        );
        assert!(database_path_from_url("postgres://u@h/db").is_err());
        assert!(database_path_from_url("  ").is_err());
    }
}
