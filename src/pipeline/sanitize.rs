//! Filesystem-safe name fragments and output file names.
//!
//! Names are built as `"<template stem> (<recipient>).pdf"`. Both parts are
//! reduced to `[A-Za-z0-9 _-]` with surrounding spaces trimmed; every other
//! character is dropped, not replaced.

use crate::config::CollisionPolicy;
use crate::model::Member;
use std::collections::HashSet;
use tracing::warn;

/// Extension of every generated document.
pub const DOC_EXTENSION: &str = "pdf";

/// Keep only ASCII alphanumerics, spaces, underscores and hyphens, then trim.
///
/// Idempotent: `sanitize_fragment(&sanitize_fragment(x)) == sanitize_fragment(x)`.
pub fn sanitize_fragment(input: &str) -> String {
    let kept: String = input
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, ' ' | '_' | '-'))
        .collect();
    kept.trim().to_string()
}

/// Drop the final extension of a file name, the way `syllabus.pdf` becomes
/// `syllabus`. Leading dots of the last component do not start an extension
/// (`.profile` is kept whole).
pub fn strip_extension(name: &str) -> &str {
    let base_start = name.rfind(&['/', '\\'][..]).map_or(0, |i| i + 1);
    let base = &name[base_start..];
    match base.rfind('.') {
        Some(dot) if base[..dot].chars().any(|c| c != '.') => &name[..base_start + dot],
        _ => name,
    }
}

/// `"<template> (<recipient>).pdf"` from already-sanitized fragments.
pub fn output_file_name(template_fragment: &str, recipient_fragment: &str) -> String {
    format!("{} ({}).{}", template_fragment, recipient_fragment, DOC_EXTENSION)
}

/// Assigns output file names for one batch.
///
/// The template fragment is derived once; recipient fragments per member.
/// Under [`CollisionPolicy::Disambiguate`] a name already handed out in this
/// batch gets `_<member id>` appended before the extension.
#[derive(Debug)]
pub struct OutputNamer {
    template_fragment: String,
    policy: CollisionPolicy,
    issued: HashSet<String>,
}

impl OutputNamer {
    pub fn new(template_name: &str, policy: CollisionPolicy) -> Self {
        Self {
            template_fragment: sanitize_fragment(strip_extension(template_name)),
            policy,
            issued: HashSet::new(),
        }
    }

    pub fn template_fragment(&self) -> &str {
        &self.template_fragment
    }

    /// File name for the next recipient of the batch.
    pub fn file_name_for(&mut self, member: &Member) -> String {
        let recipient = sanitize_fragment(&member.name);
        let name = output_file_name(&self.template_fragment, &recipient);
        if self.issued.insert(name.clone()) {
            return name;
        }

        match self.policy {
            CollisionPolicy::Overwrite => {
                warn!(
                    "Output name '{}' already used in this batch; member {} will overwrite it",
                    name, member.id
                );
                name
            }
            CollisionPolicy::Disambiguate => {
                let unique = format!(
                    "{} ({})_{}.{}",
                    self.template_fragment, recipient, member.id, DOC_EXTENSION
                );
                warn!(
                    "Output name '{}' already used in this batch; member {} gets '{}'",
                    name, member.id, unique
                );
                self.issued.insert(unique.clone());
                unique
            }
        }
    }
}
