//! SEARCH/REPLACE patch engine.
//!
//! Patches are sequences of marker triplets:
//!
//! ```text
//! <<<<<<< SEARCH
//! old text
//! =======
//! new text
//! >>>>>>> REPLACE
//! ```
//!
//! Blocks are applied strictly left to right against the progressively
//! mutated content. A block whose search text cannot be found is skipped,
//! and a malformed triplet ends scanning while keeping every block that was
//! already applied. Nothing here returns an error: callers inspect
//! [`DiffResult::has_changes`] to detect a no-op.
//!
//! The engine is pure and lock-agnostic. Refusing to patch a locked file is
//! the caller's responsibility.

mod apply;
mod matching;
mod parser;
mod types;

pub use apply::{apply_blocks, apply_diff_patches, apply_diff_patches_with};
pub use parser::{
    DIVIDER_MARKER, REPLACE_MARKER, SEARCH_MARKER, contains_diff_markers, extract_diff_blocks,
    parse_patch_blocks,
};
pub use types::{DiffResult, LineRange, PatchBlock, PatchOptions};
