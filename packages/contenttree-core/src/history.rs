//! Append-only audit log and the replay machinery built on top of it.
//!
//! Every committed command appends exactly one record per affected parent
//! group. `edit` and `revert` records carry a reverse patch; replaying those
//! patches newest-first over the current document reconstructs any past
//! state. All other kinds carry structured descriptive metadata for the
//! audit trail and are skipped during reconstruction.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::diff::{apply_sequence, Patch};
use crate::error::{Error, Result};
use crate::ids::{ActorId, EntityId, RecordId};
use crate::reorder::ReorderTarget;
use crate::text_delta;
use crate::traits::ContentTree;
use crate::value::{Document, Value};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    Create,
    Edit,
    Revert,
    Comment,
    Transition,
    Rename,
    Move,
    Copy,
    Trash,
    Restore,
    Reorder,
}

/// Per-child entry of a multi-child record.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ChildRef {
    pub id: EntityId,
    pub name: String,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RenameRef {
    pub id: EntityId,
    pub old_name: String,
    pub new_name: String,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CopyRef {
    pub orig_id: EntityId,
    pub orig_name: String,
    pub id: EntityId,
    pub name: String,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum HistoryPayload {
    Create {
        parent_id: EntityId,
        parent_path: String,
        child_id: EntityId,
        child_name: String,
    },
    Edit {
        object_path: String,
        changes: Patch,
    },
    Revert {
        object_path: String,
        changes: Patch,
        target: RecordId,
        target_time: DateTime<Utc>,
    },
    Comment {
        object_path: String,
        comment: String,
    },
    Transition {
        name: String,
        comment: String,
        object_id: EntityId,
        object_path: String,
        recurse: bool,
    },
    Rename {
        parent_id: EntityId,
        parent_path: String,
        children: Vec<RenameRef>,
    },
    Move {
        old_parent_id: EntityId,
        old_parent_path: String,
        new_parent_id: EntityId,
        new_parent_path: String,
        children: Vec<ChildRef>,
    },
    Copy {
        orig_parent_id: EntityId,
        orig_parent_path: String,
        copy_parent_id: EntityId,
        copy_parent_path: String,
        children: Vec<CopyRef>,
    },
    Trash {
        parent_id: EntityId,
        parent_path: String,
        children: Vec<ChildRef>,
    },
    Restore {
        parent_id: EntityId,
        parent_path: String,
        children: Vec<ChildRef>,
    },
    Reorder {
        parent_id: EntityId,
        parent_path: String,
        child_names: Vec<String>,
        target: ReorderTarget,
        delta: Option<usize>,
    },
}

impl HistoryPayload {
    pub fn kind(&self) -> ActionKind {
        match self {
            HistoryPayload::Create { .. } => ActionKind::Create,
            HistoryPayload::Edit { .. } => ActionKind::Edit,
            HistoryPayload::Revert { .. } => ActionKind::Revert,
            HistoryPayload::Comment { .. } => ActionKind::Comment,
            HistoryPayload::Transition { .. } => ActionKind::Transition,
            HistoryPayload::Rename { .. } => ActionKind::Rename,
            HistoryPayload::Move { .. } => ActionKind::Move,
            HistoryPayload::Copy { .. } => ActionKind::Copy,
            HistoryPayload::Trash { .. } => ActionKind::Trash,
            HistoryPayload::Restore { .. } => ActionKind::Restore,
            HistoryPayload::Reorder { .. } => ActionKind::Reorder,
        }
    }

    /// The reverse patch carried by edit-like records.
    pub fn patch(&self) -> Option<&Patch> {
        match self {
            HistoryPayload::Edit { changes, .. } | HistoryPayload::Revert { changes, .. } => {
                Some(changes)
            }
            _ => None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct HistoryRecord {
    pub id: RecordId,
    pub time: DateTime<Utc>,
    pub actor: Option<ActorId>,
    pub action: ActionKind,
    /// Every entity this record touches; queries match on membership.
    pub entity_ids: Vec<EntityId>,
    pub payload: HistoryPayload,
}

/// Append-only record store. Implementations assign ids monotonically and
/// never reorder or rewrite what was appended.
pub trait HistoryStore {
    /// Append a record, returning the id the store assigned to it. Any id on
    /// the incoming record is replaced.
    fn append(&mut self, record: HistoryRecord) -> Result<RecordId>;

    fn get(&self, id: RecordId) -> Result<Option<HistoryRecord>>;

    /// Records touching an entity, most recent first. `limit` 0 means no
    /// limit; the returned total counts all matches regardless of paging.
    fn records_for(
        &self,
        entity: EntityId,
        skip: usize,
        limit: usize,
    ) -> Result<(Vec<HistoryRecord>, usize)>;

    /// Records written by an actor, most recent first.
    fn records_for_actor(
        &self,
        actor: &ActorId,
        skip: usize,
        limit: usize,
    ) -> Result<(Vec<HistoryRecord>, usize)>;
}

/// Vec-backed store for tests and embedding.
#[derive(Default)]
pub struct MemoryHistoryStore {
    records: Vec<HistoryRecord>,
    next: u64,
}

impl MemoryHistoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn page(matches: Vec<HistoryRecord>, skip: usize, limit: usize) -> (Vec<HistoryRecord>, usize) {
        let total = matches.len();
        let upper = if limit == 0 { total } else { (skip + limit).min(total) };
        let items = matches
            .into_iter()
            .skip(skip)
            .take(upper.saturating_sub(skip))
            .collect();
        (items, total)
    }
}

impl HistoryStore for MemoryHistoryStore {
    fn append(&mut self, mut record: HistoryRecord) -> Result<RecordId> {
        self.next += 1;
        let id = RecordId(self.next);
        record.id = id;
        self.records.push(record);
        Ok(id)
    }

    fn get(&self, id: RecordId) -> Result<Option<HistoryRecord>> {
        Ok(self.records.iter().find(|r| r.id == id).cloned())
    }

    fn records_for(
        &self,
        entity: EntityId,
        skip: usize,
        limit: usize,
    ) -> Result<(Vec<HistoryRecord>, usize)> {
        let matches: Vec<HistoryRecord> = self
            .records
            .iter()
            .rev()
            .filter(|r| r.entity_ids.contains(&entity))
            .cloned()
            .collect();
        Ok(Self::page(matches, skip, limit))
    }

    fn records_for_actor(
        &self,
        actor: &ActorId,
        skip: usize,
        limit: usize,
    ) -> Result<(Vec<HistoryRecord>, usize)> {
        let matches: Vec<HistoryRecord> = self
            .records
            .iter()
            .rev()
            .filter(|r| r.actor.as_ref() == Some(actor))
            .cloned()
            .collect();
        Ok(Self::page(matches, skip, limit))
    }
}

/// Reconstruct an entity's document as it stood when `target` was about to
/// be logged.
///
/// Scans the entity's history newest-first, accumulating the reverse patches
/// of edit-like records up to and including `target`, then folds the
/// accumulated patches over the current document. Reverting to the target
/// record therefore undoes it together with everything after it.
pub fn reconstruct<T, H>(tree: &T, store: &H, entity: EntityId, target: RecordId) -> Result<Document>
where
    T: ContentTree,
    H: HistoryStore,
{
    let current = tree.node(entity)?.document;
    let (items, _) = store.records_for(entity, 0, 0)?;
    let mut patches: Vec<Patch> = Vec::new();
    for record in items {
        if let Some(patch) = record.payload.patch() {
            if !patch.is_empty() {
                patches.push(patch.clone());
            }
        }
        if record.id == target {
            return apply_sequence(&current, &patches);
        }
    }
    Err(Error::RecordNotFound)
}

/// Which side of the earlier event a comparison is anchored to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Boundary {
    /// Values just after the earlier event (the default view).
    AfterEvent,
    /// Values just before the earlier event; with identical record ids this
    /// yields the changes made by that single event.
    BeforeEvent,
}

/// One changed top-level field between two points in history.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FieldChange {
    pub before: Option<Value>,
    pub after: Option<Value>,
    /// Annotated rendering when both sides are text.
    pub marked: Option<String>,
}

/// Field-level changes between two history records, or between a record and
/// the current document when `id2` is `None`. The two ids need not be in
/// chronological order; whichever the newest-first scan meets first becomes
/// the "after" side.
pub fn diff_between<T, H>(
    tree: &T,
    store: &H,
    entity: EntityId,
    id1: RecordId,
    id2: Option<RecordId>,
    boundary: Boundary,
) -> Result<BTreeMap<String, FieldChange>>
where
    T: ContentTree,
    H: HistoryStore,
{
    if id2 == Some(id1) && boundary == Boundary::AfterEvent {
        // Nothing can have changed relative to itself going forward.
        return Ok(BTreeMap::new());
    }
    let current = tree.node(entity)?.document;
    let mut targets = vec![id1];
    if let Some(id2) = id2 {
        targets.push(id2);
    }
    let mut after: Option<Document> = if id2.is_none() {
        Some(current.clone())
    } else {
        None
    };
    let mut patches: Vec<Patch> = Vec::new();

    let (items, _) = store.records_for(entity, 0, 0)?;
    for record in items {
        let is_target = targets.contains(&record.id);
        if is_target {
            if after.is_none() {
                after = Some(apply_sequence(&current, &patches)?);
                patches.clear();
            } else if boundary == Boundary::AfterEvent {
                if let Some(after_doc) = &after {
                    let before = apply_sequence(after_doc, &patches)?;
                    return Ok(field_changes(&before, after_doc));
                }
            }
        }
        if let Some(patch) = record.payload.patch() {
            if !patch.is_empty() {
                patches.push(patch.clone());
            }
        }
        if is_target {
            if let Some(after_doc) = &after {
                if boundary == Boundary::BeforeEvent {
                    let before = apply_sequence(after_doc, &patches)?;
                    return Ok(field_changes(&before, after_doc));
                }
            }
        }
    }
    Err(Error::RecordNotFound)
}

/// The changes a single edit-like record made: values just before it against
/// values just after it.
pub fn edit_changes<T, H>(
    tree: &T,
    store: &H,
    entity: EntityId,
    id: RecordId,
) -> Result<BTreeMap<String, FieldChange>>
where
    T: ContentTree,
    H: HistoryStore,
{
    diff_between(tree, store, entity, id, Some(id), Boundary::BeforeEvent)
}

fn field_changes(before: &Document, after: &Document) -> BTreeMap<String, FieldChange> {
    let mut result = BTreeMap::new();
    for (name, a) in after {
        let b = before.get(name);
        if b == Some(a) {
            continue;
        }
        let marked = match (b.and_then(Value::as_scalar), a.as_scalar()) {
            (Some(bs), Some(as_)) => match (bs.as_str(), as_.as_str()) {
                (Some(bt), Some(at)) => Some(text_delta::mark_changes(bt, at)),
                _ => None,
            },
            _ => None,
        };
        result.insert(
            name.clone(),
            FieldChange {
                before: b.cloned(),
                after: Some(a.clone()),
                marked,
            },
        );
    }
    result
}

/// Fetch the per-child sub-entry of a multi-child record, if any.
pub fn child_entry(record: &HistoryRecord, child_id: EntityId) -> Option<ChildRef> {
    let children = match &record.payload {
        HistoryPayload::Move { children, .. }
        | HistoryPayload::Trash { children, .. }
        | HistoryPayload::Restore { children, .. } => children.clone(),
        HistoryPayload::Rename { children, .. } => children
            .iter()
            .map(|r| ChildRef {
                id: r.id,
                name: r.new_name.clone(),
            })
            .collect(),
        HistoryPayload::Copy { children, .. } => children
            .iter()
            .map(|r| ChildRef {
                id: r.id,
                name: r.name.clone(),
            })
            .collect(),
        _ => return None,
    };
    children.into_iter().find(|c| c.id == child_id)
}
