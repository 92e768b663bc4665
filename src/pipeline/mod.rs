//! Pipeline stages for upload-to-HTML conversion.
//!
//! Each submodule implements exactly one step.
//!
//! ## Data Flow
//!
//! ```text
//! workspace ──▶ converter ──▶ normalize ──▶ rewrite
//! (mkdir id)    (pandoc)      (inkscape)    (src="media/…" → served URL)
//! ```
//!
//! 1. [`workspace`]: request id, workspace directory, transient file guard
//! 2. [`converter`]: run pandoc; media lands in the workspace
//! 3. [`normalize`]: rasterise WMF/EMF one file at a time; per-file failures
//!    are recorded, never propagated
//! 4. [`rewrite`]:   literal `src` rewriting, per file and per prefix

pub mod converter;
pub mod normalize;
pub mod rewrite;
pub mod workspace;
