//! The content tree's node model as the core sees it, plus the traversal
//! helpers built on the storage collaborator.
//!
//! The old-world folder/collection/trash class hierarchy is replaced by a
//! tagged kind with capability predicates; behavior composes from what a
//! kind *can do* rather than what it inherits.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::ids::{ActorId, EntityId};
use crate::traits::ContentTree;
use crate::value::Document;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeKind {
    Root,
    Folder,
    Item,
    Trash,
}

impl NodeKind {
    pub fn label(self) -> &'static str {
        match self {
            NodeKind::Root => "root",
            NodeKind::Folder => "folder",
            NodeKind::Item => "item",
            NodeKind::Trash => "trash",
        }
    }

    pub fn is_container(self) -> bool {
        matches!(self, NodeKind::Root | NodeKind::Folder | NodeKind::Trash)
    }

    /// Which kinds may be created or moved under this one. The trash accepts
    /// children only through the trash commands, never through validation.
    pub fn allows_child(self, child: NodeKind) -> bool {
        matches!(self, NodeKind::Root | NodeKind::Folder)
            && matches!(child, NodeKind::Folder | NodeKind::Item)
    }

    /// May carry an explicit ordered child-name list.
    pub fn orderable(self) -> bool {
        matches!(self, NodeKind::Root | NodeKind::Folder)
    }

    /// Participates in the publication workflow.
    pub fn workflowed(self) -> bool {
        matches!(self, NodeKind::Folder | NodeKind::Item)
    }
}

/// Where a trashed node came from, recorded so it can go back.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Memento {
    pub orig_name: String,
    pub orig_parent_id: EntityId,
    pub orig_parent_path: String,
    pub trashed_at: DateTime<Utc>,
    pub trashed_by: Option<ActorId>,
}

/// A content entity as surfaced by the storage collaborator.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ContentNode {
    pub id: EntityId,
    /// `None` only for the root.
    pub parent: Option<EntityId>,
    /// Unique within the parent.
    pub name: String,
    pub kind: NodeKind,
    pub document: Document,
    /// When present, a permutation of the current child-name set. Absent for
    /// sort-by-field containers.
    pub ordered_names: Option<Vec<String>>,
    pub pub_state: Option<String>,
    pub memento: Option<Memento>,
    pub created: Option<DateTime<Utc>>,
    pub modified: Option<DateTime<Utc>>,
}

/// Names that would shadow host views.
pub const RESERVED_NAMES: [&str; 11] = [
    "add",
    "delete",
    "contents",
    "rename",
    "edit",
    "workflow_transition",
    "history",
    "comment",
    "local_roles",
    "search",
    "object_view",
];

fn allowed_name_char(ch: char) -> bool {
    ch.is_ascii_alphanumeric() || matches!(ch, '.' | '-' | '_' | ' ')
}

/// Check a proposed child name against the blank/reserved/character rules.
/// Uniqueness is the caller's concern.
pub fn validate_name(name: &str) -> Result<()> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(Error::Veto("Name may not be blank.".into()));
    }
    if RESERVED_NAMES.contains(&trimmed) {
        return Err(Error::Veto(format!("\"{trimmed}\" is a reserved name.")));
    }
    for ch in trimmed.chars() {
        if !allowed_name_char(ch) {
            return Err(Error::Veto(format!(
                "The character \"{ch}\" is not allowed in names."
            )));
        }
    }
    Ok(())
}

/// Ancestor ids from the root down to (and including) the entity.
pub fn id_path<T: ContentTree + ?Sized>(tree: &T, id: EntityId) -> Result<Vec<EntityId>> {
    let mut path = vec![id];
    let mut seen: HashSet<EntityId> = path.iter().copied().collect();
    let mut current = tree.node(id)?.parent;
    while let Some(parent) = current {
        if !seen.insert(parent) {
            return Err(Error::InvariantViolation(format!(
                "parent cycle detected at entity {parent}"
            )));
        }
        path.push(parent);
        current = tree.node(parent)?.parent;
    }
    path.reverse();
    Ok(path)
}

/// Human-readable location: "/" for the root, "/news/today" below it.
pub fn resource_path<T: ContentTree + ?Sized>(tree: &T, id: EntityId) -> Result<String> {
    let ids = id_path(tree, id)?;
    let mut out = String::new();
    for nid in ids.iter().skip(1) {
        out.push('/');
        out.push_str(&tree.node(*nid)?.name);
    }
    if out.is_empty() {
        out.push('/');
    }
    Ok(out)
}

/// Whether the entity lives under the trash (the trash node included).
pub fn in_trash<T: ContentTree + ?Sized>(tree: &T, id: EntityId) -> Result<bool> {
    Ok(id_path(tree, id)?.contains(&EntityId::TRASH))
}

/// Depth-first preorder walk of an entity's subtree.
pub fn walk_subtree<T: ContentTree + ?Sized>(
    tree: &T,
    id: EntityId,
    include_self: bool,
) -> Result<Vec<ContentNode>> {
    let mut out = Vec::new();
    let node = tree.node(id)?;
    if include_self {
        out.push(node.clone());
    }
    if node.kind.is_container() {
        for child in tree.children(id)? {
            out.extend(walk_subtree(tree, child.id, true)?);
        }
    }
    Ok(out)
}

/// Children of an ordered container in their explicit order. Names without a
/// live child are skipped.
pub fn ordered_children<T: ContentTree + ?Sized>(
    tree: &T,
    node: &ContentNode,
) -> Result<Vec<ContentNode>> {
    let names = node
        .ordered_names
        .as_ref()
        .ok_or(Error::UnorderedContainer)?;
    let children = tree.children(node.id)?;
    let mut result = Vec::with_capacity(children.len());
    for name in names {
        if let Some(child) = children.iter().find(|c| &c.name == name) {
            result.push(child.clone());
        }
    }
    Ok(result)
}
