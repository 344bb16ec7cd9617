#![forbid(unsafe_code)]
//! Core of a content tree with full edit history: a structural diff/patch
//! engine over nested documents, an append-only audit log that can
//! reconstruct any prior document state, and a command layer that wraps
//! every tree mutation in a validate-before-mutate protocol.
//! The crate stays independent of concrete storage, search, and identity
//! engines so it can be embedded in any host that satisfies the traits
//! defined here.

pub mod commands;
pub mod diff;
pub mod error;
pub mod flatten;
pub mod history;
pub mod ids;
pub mod node;
pub mod reorder;
pub mod text_delta;
pub mod traits;
pub mod value;

pub use commands::Commands;
pub use diff::{apply, apply_sequence, diff, diff_flat, patch_paths, Patch};
pub use error::{Error, Result};
pub use flatten::{flatten, unflatten, LEN_KEY};
pub use history::{
    child_entry, diff_between, edit_changes, reconstruct, ActionKind, Boundary, ChildRef, CopyRef,
    FieldChange, HistoryPayload, HistoryRecord, HistoryStore, MemoryHistoryStore, RenameRef,
};
pub use ids::{ActorId, EntityId, RecordId};
pub use node::{
    id_path, in_trash, ordered_children, resource_path, validate_name, walk_subtree, ContentNode,
    Memento, NodeKind, RESERVED_NAMES,
};
pub use reorder::{
    reorder_by_delta, reorder_down, reorder_to_bottom, reorder_to_top, reorder_up, ReorderTarget,
};
pub use text_delta::{apply_delta, encode, is_delta, make_delta, mark_changes, DELTA_MARKER};
pub use traits::{
    ActorSource, Anonymous, ContentTree, FixedActor, Indexer, MemoryContentTree, NoopIndexer,
    PublicationWorkflow, RecordingIndexer, Workflow, STATE_PENDING, STATE_PRIVATE, STATE_PUBLISHED,
};
pub use value::{Document, FlatDocument, Scalar, Value};
