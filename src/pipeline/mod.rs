//! Pipeline stages for document personalization.
//!
//! Each submodule implements exactly one step; [`crate::personalize`] wires
//! them together.
//!
//! ## Data Flow
//!
//! ```text
//! resolve ──▶ scratch ──▶ sanitize + watermark (per member) ──▶ register
//! (store)     (tempfile)  (names, lopdf)                        (commit, publish)
//! ```
//!
//! 1. [`resolve`]: load the group, reject unknown or empty groups
//! 2. [`scratch`]: hold the uploaded template and the staging directory
//! 3. [`sanitize`]: derive filesystem-safe output names
//! 4. [`watermark`]: stamp `"Property of: {name}"` on every page
//! 5. [`register`]: commit output references in one transaction, then
//!    move the staged files into the output directory

pub mod register;
pub mod resolve;
pub mod sanitize;
pub mod scratch;
pub mod watermark;
