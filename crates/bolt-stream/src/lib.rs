//! Turning streamed model output into artifacts and content blocks.
//!
//! Two independent front ends live here:
//!
//! - [`ParserRegistry`] recognizes explicit `<boltArtifact>`/`<boltAction>`
//!   markup in a cumulative, ever-growing buffer and reports artifact and
//!   action lifecycle events to a [`ParserObserver`].
//! - [`BlockClassifier`] applies a table of heuristics to free-form markdown
//!   and yields deduplicated [`ContentBlock`]s (files, commands, text).
//!
//! Both keep per-message state that the caller creates and destroys
//! explicitly; nothing is evicted implicitly.

pub mod artifact;
pub mod classifier;
pub mod observer;
pub mod tags;

pub use artifact::{Action, ActionKind, Artifact};
pub use classifier::{
    BlockClassifier, BlockKind, ClassifierOptions, ContentBlock, Detector, content_hash,
};
pub use observer::{NoopObserver, ParserEvent, ParserObserver};
pub use tags::{ParserRegistry, ParserSession};
