//! Core event model and normalization for fsnorm
//!
//! This crate is pure and single-threaded:
//! - Raw notification and normalized event types
//! - Insertion-ordered per-pass path index
//! - The normalization pass (per-path merging + deleted-subtree suppression)
//!
//! Threading, debouncing and the watch backends live in `fsnorm-watcher`.

pub mod event;
pub mod index;
pub mod normalize;

// Re-exports
pub use event::{ChangeKind, NormalizedEvent, RawKind, RawNotification};
pub use index::PathEventIndex;
pub use normalize::{normalize, Normalizer};
