//! High-level operations over the content tree, with history logging.
//!
//! Every operation runs Validate -> Mutate -> Log: a failed validation
//! raises a veto and nothing mutates or logs; once a mutation lands, the
//! log entry is unconditional. Batch operations validate the whole batch
//! before touching anything, which stands in for transactions the backing
//! store may not have. Race windows between validation and mutation remain
//! possible across concurrent writers; the store's uniqueness constraints
//! are the backstop.
//!
//! Use these operations rather than mutating the tree directly when history
//! matters (and it should).

use std::collections::{BTreeMap, HashSet};

use chrono::Utc;

use crate::diff::diff;
use crate::error::{Error, Result};
use crate::history::{
    reconstruct, ChildRef, CopyRef, HistoryPayload, HistoryRecord, HistoryStore, RenameRef,
};
use crate::ids::{EntityId, RecordId};
use crate::node::{
    id_path, in_trash, ordered_children, resource_path, validate_name, walk_subtree, ContentNode,
    Memento, NodeKind,
};
use crate::reorder::{reorder_down, reorder_to_bottom, reorder_to_top, reorder_up, ReorderTarget};
use crate::traits::{ActorSource, ContentTree, Indexer, Workflow};
use crate::value::Document;

fn veto(msg: impl Into<String>) -> Error {
    Error::Veto(msg.into())
}

/// The command layer, wired to its collaborators.
pub struct Commands<T, H, A, X, W> {
    tree: T,
    history: H,
    actors: A,
    indexer: X,
    workflow: W,
}

impl<T, H, A, X, W> Commands<T, H, A, X, W>
where
    T: ContentTree,
    H: HistoryStore,
    A: ActorSource,
    X: Indexer,
    W: Workflow,
{
    pub fn new(tree: T, history: H, actors: A, indexer: X, workflow: W) -> Self {
        Self {
            tree,
            history,
            actors,
            indexer,
            workflow,
        }
    }

    pub fn tree(&self) -> &T {
        &self.tree
    }

    /// Direct tree access for non-audited host setup (seeding, migrations).
    pub fn tree_mut(&mut self) -> &mut T {
        &mut self.tree
    }

    pub fn history(&self) -> &H {
        &self.history
    }

    pub fn indexer(&self) -> &X {
        &self.indexer
    }

    pub fn into_parts(self) -> (T, H) {
        (self.tree, self.history)
    }

    fn log(&mut self, entity_ids: Vec<EntityId>, payload: HistoryPayload) -> Result<RecordId> {
        let record = HistoryRecord {
            id: RecordId(0),
            time: Utc::now(),
            actor: self.actors.current_actor(),
            action: payload.kind(),
            entity_ids,
            payload,
        };
        self.history.append(record)
    }

    // ----- indexing side effects (never unwind a committed mutation) -----

    fn index_one(&mut self, id: EntityId) {
        if let Ok(node) = self.tree.node(id) {
            let _ = self.indexer.index(&node);
        }
    }

    fn index_subtree(&mut self, id: EntityId) {
        if let Ok(nodes) = walk_subtree(&self.tree, id, true) {
            for node in nodes {
                let _ = self.indexer.index(&node);
            }
        }
    }

    fn unindex_subtree(&mut self, id: EntityId) {
        if let Ok(nodes) = walk_subtree(&self.tree, id, true) {
            for node in nodes {
                let _ = self.indexer.unindex(&node);
            }
        }
    }

    // ----- ordered-name bookkeeping -----

    fn note_child_added(&mut self, parent: EntityId, name: &str) -> Result<()> {
        let node = self.tree.node(parent)?;
        if let Some(mut names) = node.ordered_names {
            names.push(name.to_string());
            self.tree.set_ordered_names(parent, Some(names))?;
        }
        Ok(())
    }

    fn note_child_removed(&mut self, parent: EntityId, name: &str) -> Result<()> {
        let node = self.tree.node(parent)?;
        if node.kind == NodeKind::Trash {
            return Ok(());
        }
        if let Some(mut names) = node.ordered_names {
            if let Some(pos) = names.iter().position(|n| n == name) {
                names.remove(pos);
                self.tree.set_ordered_names(parent, Some(names))?;
            }
        }
        Ok(())
    }

    fn note_child_renamed(&mut self, parent: EntityId, old: &str, new: &str) -> Result<()> {
        let node = self.tree.node(parent)?;
        if let Some(mut names) = node.ordered_names {
            if let Some(pos) = names.iter().position(|n| n == old) {
                names[pos] = new.to_string();
                self.tree.set_ordered_names(parent, Some(names))?;
            }
        }
        Ok(())
    }

    /// Give an orderable container an explicit child order, initialized to
    /// its current child names. Not an audited operation.
    pub fn enable_ordering(&mut self, parent: EntityId) -> Result<()> {
        let node = self.tree.node(parent)?;
        if !node.kind.orderable() {
            return Err(Error::UnorderedContainer);
        }
        if node.ordered_names.is_none() {
            let names = self.tree.child_names(parent)?;
            self.tree.set_ordered_names(parent, Some(names))?;
        }
        Ok(())
    }

    // ----- validation -----

    fn veto_child_name(&self, parent: EntityId, name: &str, unique: bool) -> Result<()> {
        validate_name(name)?;
        if unique && self.tree.has_child(parent, name)? {
            return Err(veto(format!("The name \"{name}\" is already in use.")));
        }
        Ok(())
    }

    fn veto_add_child(
        &self,
        parent: &ContentNode,
        kind: NodeKind,
        name: &str,
        unique: bool,
    ) -> Result<()> {
        if !parent.kind.allows_child(kind) {
            return Err(veto(format!(
                "This {} does not allow child objects of type {}.",
                parent.kind.label(),
                kind.label()
            )));
        }
        self.veto_child_name(parent.id, name, unique)
    }

    // ----- operations -----

    pub fn create(
        &mut self,
        parent: EntityId,
        kind: NodeKind,
        name: &str,
        document: Document,
    ) -> Result<EntityId> {
        let parent_node = self.tree.node(parent)?;
        let parent_path = resource_path(&self.tree, parent)?;
        self.veto_add_child(&parent_node, kind, name, true)?;
        let child = self.tree.create(parent, kind, name, document)?;
        self.note_child_added(parent, name)?;
        self.index_one(child);
        self.log(
            vec![child, parent],
            HistoryPayload::Create {
                parent_id: parent,
                parent_path,
                child_id: child,
                child_name: name.to_string(),
            },
        )?;
        Ok(child)
    }

    /// Replace an entity's document. A no-op edit mutates nothing and writes
    /// no history.
    pub fn edit(&mut self, entity: EntityId, document: Document) -> Result<Option<RecordId>> {
        let node = self.tree.node(entity)?;
        let changes = diff(&node.document, &document)?;
        if changes.is_empty() {
            return Ok(None);
        }
        let object_path = resource_path(&self.tree, entity)?;
        self.tree.set_document(entity, document)?;
        self.index_one(entity);
        let id = self.log(
            vec![entity],
            HistoryPayload::Edit {
                object_path,
                changes,
            },
        )?;
        Ok(Some(id))
    }

    /// Put an entity back to the state it had before `record` was logged,
    /// undoing that change and everything after it.
    pub fn revert(&mut self, entity: EntityId, record: RecordId) -> Result<Option<RecordId>> {
        let target = self.history.get(record)?.ok_or(Error::RecordNotFound)?;
        let node = self.tree.node(entity)?;
        let reconstructed = reconstruct(&self.tree, &self.history, entity, record)?;
        let changes = diff(&node.document, &reconstructed)?;
        if changes.is_empty() {
            return Ok(None);
        }
        let object_path = resource_path(&self.tree, entity)?;
        self.tree.set_document(entity, reconstructed)?;
        self.index_one(entity);
        let id = self.log(
            vec![entity],
            HistoryPayload::Revert {
                object_path,
                changes,
                target: record,
                target_time: target.time,
            },
        )?;
        Ok(Some(id))
    }

    /// Attach a free-form comment to an entity's audit trail.
    pub fn comment(&mut self, entity: EntityId, text: &str) -> Result<RecordId> {
        let object_path = resource_path(&self.tree, entity)?;
        self.log(
            vec![entity],
            HistoryPayload::Comment {
                object_path,
                comment: text.to_string(),
            },
        )
    }

    /// Apply a workflow transition, optionally recursing into the subtree.
    /// The entity itself must accept the transition; descendants are
    /// transitioned where it applies and re-indexed where it does not.
    pub fn transition(
        &mut self,
        entity: EntityId,
        transition: &str,
        comment: &str,
        recurse: bool,
    ) -> Result<RecordId> {
        let object_path = resource_path(&self.tree, entity)?;
        let ids = if recurse {
            self.transition_subtree(entity, transition, true)?
        } else {
            let node = self.tree.node(entity)?;
            let state = self.workflow.apply(&node, transition)?;
            self.tree.set_pub_state(entity, Some(state))?;
            self.index_one(entity);
            vec![entity]
        };
        self.log(
            ids,
            HistoryPayload::Transition {
                name: transition.to_string(),
                comment: comment.to_string(),
                object_id: entity,
                object_path,
                recurse,
            },
        )
    }

    fn transition_subtree(
        &mut self,
        id: EntityId,
        transition: &str,
        include_self: bool,
    ) -> Result<Vec<EntityId>> {
        let mut result = Vec::new();
        if include_self {
            let node = self.tree.node(id)?;
            let state = self.workflow.apply(&node, transition)?;
            self.tree.set_pub_state(id, Some(state))?;
            self.index_one(id);
            result.push(id);
        }
        for child in self.tree.children(id)? {
            let applies = self.workflow.available(&child).iter().any(|t| t == transition);
            if applies {
                if child.kind.is_container() {
                    result.extend(self.transition_subtree(child.id, transition, true)?);
                } else {
                    let state = self.workflow.apply(&child, transition)?;
                    self.tree.set_pub_state(child.id, Some(state))?;
                    self.index_one(child.id);
                    result.push(child.id);
                }
            } else {
                // Visibility may still depend on the ancestor's new state.
                self.index_one(child.id);
                if child.kind.is_container() {
                    result.extend(self.transition_subtree(child.id, transition, false)?);
                }
            }
        }
        Ok(result)
    }

    /// Rename several children of one parent. The whole batch validates
    /// before any rename applies; one record covers them all.
    pub fn rename_batch(&mut self, parent: EntityId, pairs: &[(String, String)]) -> Result<usize> {
        if pairs.is_empty() {
            return Ok(0);
        }
        let parent_path = resource_path(&self.tree, parent)?;
        let mut ids = vec![parent];
        let mut children = Vec::new();
        let mut renames = Vec::new();
        for (old, new) in pairs {
            if old == new {
                continue;
            }
            if let Some(child) = self.tree.child_by_name(parent, old)? {
                ids.push(child.id);
                children.push(RenameRef {
                    id: child.id,
                    old_name: old.clone(),
                    new_name: new.clone(),
                });
                renames.push((old.clone(), new.clone()));
            }
        }
        if renames.is_empty() {
            return Ok(0);
        }
        self.veto_child_renames(parent, &renames)?;
        for (old, new) in &renames {
            if let Some(child) = self.tree.child_by_name(parent, old)? {
                self.tree.set_name(child.id, new)?;
                self.note_child_renamed(parent, old, new)?;
                self.index_one(child.id);
            }
        }
        self.log(
            ids,
            HistoryPayload::Rename {
                parent_id: parent,
                parent_path,
                children,
            },
        )?;
        Ok(renames.len())
    }

    pub fn rename(&mut self, parent: EntityId, old: &str, new: &str) -> Result<usize> {
        self.rename_batch(parent, &[(old.to_string(), new.to_string())])
    }

    fn veto_child_renames(&self, parent: EntityId, renames: &[(String, String)]) -> Result<()> {
        let mut new_names: HashSet<&str> = HashSet::new();
        let mut old_names: HashSet<&str> = HashSet::new();
        for (old, new) in renames {
            if old == new {
                continue;
            }
            match self.veto_child_name(parent, new, false) {
                Ok(()) => {}
                Err(Error::Veto(msg)) => {
                    return Err(veto(format!(
                        "Cannot rename \"{old}\" to \"{new}\". {msg}"
                    )));
                }
                Err(e) => return Err(e),
            }
            // Uniqueness against the union of untouched siblings and the
            // batch's other new names; vacated names do not collide.
            if new_names.contains(new.as_str()) {
                return Err(veto(format!("The name \"{new}\" would not be unique.")));
            }
            if !old_names.contains(new.as_str()) && self.tree.has_child(parent, new)? {
                return Err(veto(format!("The name \"{new}\" is already in use.")));
            }
            old_names.insert(old.as_str());
            new_names.insert(new.as_str());
        }
        Ok(())
    }

    /// Move children from one parent to another. Children whose actual
    /// parent differs from `old_parent` are a caller bug, not a veto.
    pub fn move_batch(
        &mut self,
        old_parent: EntityId,
        new_parent: EntityId,
        children: &[EntityId],
    ) -> Result<usize> {
        if children.is_empty() {
            return Ok(0);
        }
        let old_parent_path = resource_path(&self.tree, old_parent)?;
        let new_parent_path = resource_path(&self.tree, new_parent)?;
        let new_parent_node = self.tree.node(new_parent)?;
        let mut ids = vec![old_parent, new_parent];
        let mut refs = Vec::new();
        let mut nodes = Vec::new();
        for &child in children {
            let node = self.tree.node(child)?;
            if node.parent != Some(old_parent) {
                return Err(Error::InvariantViolation(format!(
                    "{} is not a direct child of {}",
                    resource_path(&self.tree, child)?,
                    old_parent_path
                )));
            }
            ids.push(child);
            refs.push(ChildRef {
                id: child,
                name: node.name.clone(),
            });
            nodes.push(node);
        }
        self.veto_move_children(&new_parent_node, &nodes)?;
        for node in &nodes {
            self.move_child_unchecked(new_parent, node)?;
        }
        self.log(
            ids,
            HistoryPayload::Move {
                old_parent_id: old_parent,
                old_parent_path,
                new_parent_id: new_parent,
                new_parent_path,
                children: refs,
            },
        )?;
        Ok(nodes.len())
    }

    pub fn move_object(&mut self, entity: EntityId, new_parent: EntityId) -> Result<usize> {
        let node = self.tree.node(entity)?;
        let parent = node
            .parent
            .ok_or_else(|| Error::InvariantViolation("the root cannot be moved".into()))?;
        self.move_batch(parent, new_parent, &[entity])
    }

    fn veto_move_child(&self, dest: &ContentNode, node: &ContentNode) -> Result<()> {
        if node.id == dest.id {
            return Err(veto("Can't move an object into itself."));
        }
        if id_path(&self.tree, dest.id)?.contains(&node.id) {
            return Err(veto("Can't move an object into a child of itself."));
        }
        self.veto_add_child(dest, node.kind, &node.name, true)
    }

    fn veto_move_children(&self, dest: &ContentNode, nodes: &[ContentNode]) -> Result<()> {
        let mut new_names: HashSet<&str> = HashSet::new();
        for node in nodes {
            match self.veto_move_child(dest, node) {
                Ok(()) => {}
                Err(Error::Veto(msg)) => {
                    return Err(veto(format!("Cannot move \"{}\". {msg}", node.name)));
                }
                Err(e) => return Err(e),
            }
            if !new_names.insert(node.name.as_str()) {
                return Err(veto(format!(
                    "The name \"{}\" would not be unique.",
                    node.name
                )));
            }
        }
        Ok(())
    }

    fn move_child_unchecked(&mut self, dest: EntityId, node: &ContentNode) -> Result<()> {
        if node.parent == Some(dest) {
            return Ok(());
        }
        self.tree.reparent(node.id, dest, &node.name)?;
        if let Some(orig) = node.parent {
            self.note_child_removed(orig, &node.name)?;
        }
        self.note_child_added(dest, &node.name)?;
        self.index_subtree(node.id);
        Ok(())
    }

    /// Clone children (recursively, with fresh identities) into another
    /// parent. Copy never vetoes a name collision; it resolves one by
    /// suffixing `-1`, `-2`, ... Returns (original, copy) id pairs.
    pub fn copy_batch(
        &mut self,
        src_parent: EntityId,
        dest_parent: EntityId,
        children: &[EntityId],
    ) -> Result<Vec<(EntityId, EntityId)>> {
        if children.is_empty() {
            return Ok(Vec::new());
        }
        let orig_parent_path = resource_path(&self.tree, src_parent)?;
        let copy_parent_path = resource_path(&self.tree, dest_parent)?;
        let dest_node = self.tree.node(dest_parent)?;
        let mut nodes = Vec::new();
        for &child in children {
            let node = self.tree.node(child)?;
            if node.parent != Some(src_parent) {
                return Err(Error::InvariantViolation(format!(
                    "{} is not a direct child of {}",
                    resource_path(&self.tree, child)?,
                    orig_parent_path
                )));
            }
            nodes.push(node);
        }
        for node in &nodes {
            match self.veto_add_child(&dest_node, node.kind, &node.name, false) {
                Ok(()) => {}
                Err(Error::Veto(msg)) => {
                    return Err(veto(format!("Cannot copy \"{}\". {msg}", node.name)));
                }
                Err(e) => return Err(e),
            }
        }
        let mut ids = vec![dest_parent];
        let mut refs = Vec::new();
        let mut pairs = Vec::new();
        for node in &nodes {
            let copy = self.copy_subtree(node, dest_parent)?;
            let copy_node = self.tree.node(copy)?;
            ids.push(copy);
            refs.push(CopyRef {
                orig_id: node.id,
                orig_name: node.name.clone(),
                id: copy,
                name: copy_node.name.clone(),
            });
            pairs.push((node.id, copy));
        }
        // The originals are untouched, so only the copies land in the record.
        self.log(
            ids,
            HistoryPayload::Copy {
                orig_parent_id: src_parent,
                orig_parent_path,
                copy_parent_id: dest_parent,
                copy_parent_path,
                children: refs,
            },
        )?;
        Ok(pairs)
    }

    pub fn copy_object(
        &mut self,
        entity: EntityId,
        dest_parent: EntityId,
    ) -> Result<Vec<(EntityId, EntityId)>> {
        let node = self.tree.node(entity)?;
        let parent = node
            .parent
            .ok_or_else(|| Error::InvariantViolation("the root cannot be copied".into()))?;
        self.copy_batch(parent, dest_parent, &[entity])
    }

    fn unique_name(&self, parent: EntityId, name: &str) -> Result<String> {
        if !self.tree.has_child(parent, name)? {
            return Ok(name.to_string());
        }
        let mut attempt = 1usize;
        loop {
            let candidate = format!("{name}-{attempt}");
            if !self.tree.has_child(parent, &candidate)? {
                return Ok(candidate);
            }
            attempt += 1;
        }
    }

    fn copy_subtree(&mut self, node: &ContentNode, dest_parent: EntityId) -> Result<EntityId> {
        let name = self.unique_name(dest_parent, &node.name)?;
        let copy = self.tree.create(dest_parent, node.kind, &name, node.document.clone())?;
        self.note_child_added(dest_parent, &name)?;
        if node.ordered_names.is_some() {
            // Rebuilt as children arrive, in the original's explicit order.
            self.tree.set_ordered_names(copy, Some(Vec::new()))?;
        }
        let children = if node.ordered_names.is_some() {
            ordered_children(&self.tree, node)?
        } else {
            self.tree.children(node.id)?
        };
        for child in children {
            self.copy_subtree(&child, copy)?;
        }
        self.index_one(copy);
        Ok(copy)
    }

    /// Move objects (possibly under different parents) into the trash.
    /// Parents are processed shallowest-first so trashing an ancestor
    /// co-trashes its descendants instead of producing redundant moves.
    pub fn trash_batch(&mut self, objects: &[EntityId]) -> Result<usize> {
        if objects.is_empty() {
            return Ok(0);
        }
        let mut groups: BTreeMap<EntityId, Vec<EntityId>> = BTreeMap::new();
        let mut parents: Vec<(usize, EntityId)> = Vec::new();
        for &obj in objects {
            let node = self.tree.node(obj)?;
            let parent = node
                .parent
                .ok_or_else(|| Error::InvariantViolation("the root cannot be trashed".into()))?;
            if !groups.contains_key(&parent) {
                parents.push((id_path(&self.tree, parent)?.len(), parent));
            }
            groups.entry(parent).or_default().push(obj);
        }
        parents.sort();
        let mut count = 0;
        for (_, parent) in parents {
            if in_trash(&self.tree, parent)? {
                continue;
            }
            let children = groups.remove(&parent).unwrap_or_default();
            count += self.trash_children(parent, &children)?;
        }
        Ok(count)
    }

    pub fn trash_object(&mut self, entity: EntityId) -> Result<usize> {
        self.trash_batch(&[entity])
    }

    fn trash_children(&mut self, parent: EntityId, children: &[EntityId]) -> Result<usize> {
        let parent_path = resource_path(&self.tree, parent)?;
        let mut ids = vec![parent];
        let mut refs = Vec::new();
        let mut count = 0;
        for &child in children {
            let node = self.tree.node(child)?;
            ids.push(child);
            refs.push(ChildRef {
                id: child,
                name: node.name.clone(),
            });
            count += self.trash_child(&node, parent, &parent_path)?;
        }
        self.log(
            ids,
            HistoryPayload::Trash {
                parent_id: parent,
                parent_path,
                children: refs,
            },
        )?;
        Ok(count)
    }

    fn trash_child(&mut self, node: &ContentNode, parent: EntityId, parent_path: &str) -> Result<usize> {
        if node.parent == Some(EntityId::TRASH) {
            return Ok(0);
        }
        let memento = Memento {
            orig_name: node.name.clone(),
            orig_parent_id: parent,
            orig_parent_path: parent_path.to_string(),
            trashed_at: Utc::now(),
            trashed_by: self.actors.current_actor(),
        };
        self.tree.set_memento(node.id, Some(memento))?;
        // Several trashed objects may share a name; the id string is unique.
        self.tree.reparent(node.id, EntityId::TRASH, &node.id.to_string())?;
        self.unindex_subtree(node.id);
        self.note_child_removed(parent, &node.name)?;
        Ok(1)
    }

    /// Put trashed objects back where they came from. The whole batch
    /// validates first: original parents must exist outside the trash and
    /// accept the children, and no two restores may collide on a name.
    pub fn restore_batch(&mut self, objects: &[EntityId]) -> Result<usize> {
        if objects.is_empty() {
            return Ok(0);
        }
        let mut entries: Vec<(ContentNode, Memento)> = Vec::new();
        for &obj in objects {
            let node = self.tree.node(obj)?;
            let Some(memento) = node.memento.clone() else {
                return Err(Error::InvariantViolation(format!(
                    "entity {} is not in the trash",
                    node.id
                )));
            };
            entries.push((node, memento));
        }
        self.veto_restore_children(&entries)?;
        let mut by_parent: BTreeMap<EntityId, Vec<ChildRef>> = BTreeMap::new();
        for (node, memento) in &entries {
            self.restore_child(node, memento)?;
            by_parent
                .entry(memento.orig_parent_id)
                .or_default()
                .push(ChildRef {
                    id: node.id,
                    name: memento.orig_name.clone(),
                });
        }
        for (parent, children) in by_parent {
            let parent_path = resource_path(&self.tree, parent)?;
            let mut ids = vec![parent];
            ids.extend(children.iter().map(|c| c.id));
            self.log(
                ids,
                HistoryPayload::Restore {
                    parent_id: parent,
                    parent_path,
                    children,
                },
            )?;
        }
        Ok(entries.len())
    }

    pub fn restore_object(&mut self, entity: EntityId) -> Result<usize> {
        self.restore_batch(&[entity])
    }

    fn veto_restore_children(&self, entries: &[(ContentNode, Memento)]) -> Result<()> {
        let mut per_parent: BTreeMap<EntityId, BTreeMap<String, usize>> = BTreeMap::new();
        for (node, memento) in entries {
            match self.veto_restore_child(node, memento) {
                Ok(()) => {}
                Err(Error::Veto(msg)) => {
                    return Err(veto(format!(
                        "Can't restore child named \"{}\". ({msg})",
                        memento.orig_name
                    )));
                }
                Err(e) => return Err(e),
            }
            *per_parent
                .entry(memento.orig_parent_id)
                .or_default()
                .entry(memento.orig_name.clone())
                .or_insert(0) += 1;
        }
        for names in per_parent.values() {
            for (name, count) in names {
                if *count > 1 {
                    return Err(veto(format!(
                        "Can't restore all of the requested objects, since {count} would have the non-unique name \"{name}\"."
                    )));
                }
            }
        }
        Ok(())
    }

    fn veto_restore_child(&self, node: &ContentNode, memento: &Memento) -> Result<()> {
        let Some(parent) = self.tree.get_node(memento.orig_parent_id)? else {
            return Err(veto("Original parent object no longer exists."));
        };
        if in_trash(&self.tree, parent.id)? {
            return Err(veto("Original parent is also in the trash."));
        }
        self.veto_add_child(&parent, node.kind, &memento.orig_name, true)
    }

    fn restore_child(&mut self, node: &ContentNode, memento: &Memento) -> Result<()> {
        self.tree
            .reparent(node.id, memento.orig_parent_id, &memento.orig_name)?;
        self.tree.set_memento(node.id, None)?;
        self.note_child_added(memento.orig_parent_id, &memento.orig_name)?;
        self.index_subtree(node.id);
        Ok(())
    }

    /// Reposition children of an ordered container. Logged only when
    /// something actually moved; returns the moved names.
    pub fn reorder(
        &mut self,
        parent: EntityId,
        names: &[String],
        target: ReorderTarget,
        delta: Option<usize>,
    ) -> Result<Vec<String>> {
        let node = self.tree.node(parent)?;
        let mut order = node.ordered_names.ok_or(Error::UnorderedContainer)?;
        let moved = match target {
            ReorderTarget::Top => reorder_to_top(&mut order, names),
            ReorderTarget::Bottom => reorder_to_bottom(&mut order, names),
            ReorderTarget::Up => reorder_up(&mut order, names, delta.unwrap_or(1)),
            ReorderTarget::Down => reorder_down(&mut order, names, delta.unwrap_or(1)),
        };
        if moved.is_empty() {
            return Ok(moved);
        }
        self.tree.set_ordered_names(parent, Some(order))?;
        let parent_path = resource_path(&self.tree, parent)?;
        // A folder-level operation: only the parent's id lands in the record.
        self.log(
            vec![parent],
            HistoryPayload::Reorder {
                parent_id: parent,
                parent_path,
                child_names: moved.clone(),
                target,
                delta,
            },
        )?;
        Ok(moved)
    }
}
