//! Collaborator traits and in-memory reference implementations.
//!
//! The core stays independent of concrete storage, identity, indexing, and
//! workflow engines; hosts satisfy these traits and the command layer does
//! the rest. The memory implementations back the test suites and early
//! embedding.

use std::collections::BTreeMap;

use chrono::Utc;

use crate::error::{Error, Result};
use crate::ids::{ActorId, EntityId};
use crate::node::{ContentNode, Memento, NodeKind};
use crate::value::Document;

/// The storage/tree collaborator. One node per entity; children are owned by
/// exactly one parent; names are unique within a parent (enforced by the
/// command layer, optionally backstopped by the store).
pub trait ContentTree {
    fn get_node(&self, id: EntityId) -> Result<Option<ContentNode>>;

    fn node(&self, id: EntityId) -> Result<ContentNode> {
        self.get_node(id)?
            .ok_or_else(|| Error::Storage(format!("no such entity {id}")))
    }

    fn children(&self, parent: EntityId) -> Result<Vec<ContentNode>>;

    fn child_by_name(&self, parent: EntityId, name: &str) -> Result<Option<ContentNode>> {
        Ok(self
            .children(parent)?
            .into_iter()
            .find(|node| node.name == name))
    }

    fn has_child(&self, parent: EntityId, name: &str) -> Result<bool> {
        Ok(self.child_by_name(parent, name)?.is_some())
    }

    fn child_names(&self, parent: EntityId) -> Result<Vec<String>> {
        Ok(self
            .children(parent)?
            .into_iter()
            .map(|node| node.name)
            .collect())
    }

    /// Create a fresh entity: no publication state, no memento, no ordered
    /// names, creation stamp set by the store.
    fn create(
        &mut self,
        parent: EntityId,
        kind: NodeKind,
        name: &str,
        document: Document,
    ) -> Result<EntityId>;

    fn set_document(&mut self, id: EntityId, document: Document) -> Result<()>;

    fn set_name(&mut self, id: EntityId, name: &str) -> Result<()>;

    fn reparent(&mut self, id: EntityId, new_parent: EntityId, new_name: &str) -> Result<()>;

    fn set_ordered_names(&mut self, id: EntityId, names: Option<Vec<String>>) -> Result<()>;

    fn set_memento(&mut self, id: EntityId, memento: Option<Memento>) -> Result<()>;

    fn set_pub_state(&mut self, id: EntityId, state: Option<String>) -> Result<()>;

    /// Remove an entity and its descendants outright. The command layer never
    /// calls this; hosts use it to purge the trash.
    fn delete(&mut self, id: EntityId) -> Result<()>;
}

/// The identity collaborator.
pub trait ActorSource {
    fn current_actor(&self) -> Option<ActorId>;
}

/// No authenticated user; history records carry no actor.
pub struct Anonymous;

impl ActorSource for Anonymous {
    fn current_actor(&self) -> Option<ActorId> {
        None
    }
}

/// A constant actor, handy for tests and batch jobs.
pub struct FixedActor(pub ActorId);

impl ActorSource for FixedActor {
    fn current_actor(&self) -> Option<ActorId> {
        Some(self.0.clone())
    }
}

/// The search/index collaborator. Calls are best-effort side effects: the
/// command layer ignores failures after a committed mutation.
pub trait Indexer {
    fn index(&mut self, node: &ContentNode) -> Result<()>;
    fn unindex(&mut self, node: &ContentNode) -> Result<()>;
}

pub struct NoopIndexer;

impl Indexer for NoopIndexer {
    fn index(&mut self, _node: &ContentNode) -> Result<()> {
        Ok(())
    }

    fn unindex(&mut self, _node: &ContentNode) -> Result<()> {
        Ok(())
    }
}

/// Records every call; used by tests asserting on side effects.
#[derive(Default)]
pub struct RecordingIndexer {
    pub indexed: Vec<EntityId>,
    pub unindexed: Vec<EntityId>,
}

impl Indexer for RecordingIndexer {
    fn index(&mut self, node: &ContentNode) -> Result<()> {
        self.indexed.push(node.id);
        Ok(())
    }

    fn unindex(&mut self, node: &ContentNode) -> Result<()> {
        self.unindexed.push(node.id);
        Ok(())
    }
}

pub const STATE_PRIVATE: &str = "private";
pub const STATE_PENDING: &str = "pending";
pub const STATE_PUBLISHED: &str = "published";

/// The workflow collaborator: maps nodes to states and validates transitions.
pub trait Workflow {
    /// `None` for kinds outside the workflow.
    fn state_of(&self, node: &ContentNode) -> Option<String>;

    /// Transitions available from the node's current state.
    fn available(&self, node: &ContentNode) -> Vec<String>;

    /// Apply a transition, returning the new state. Vetoes transitions that
    /// are not available.
    fn apply(&self, node: &ContentNode, transition: &str) -> Result<String>;
}

/// Default publication workflow: private -> pending -> published, with
/// reject and retract leading back to private.
pub struct PublicationWorkflow;

const PUBLICATION_TRANSITIONS: [(&str, &str, &str); 4] = [
    ("submit", STATE_PRIVATE, STATE_PENDING),
    ("publish", STATE_PENDING, STATE_PUBLISHED),
    ("reject", STATE_PENDING, STATE_PRIVATE),
    ("retract", STATE_PUBLISHED, STATE_PRIVATE),
];

impl Workflow for PublicationWorkflow {
    fn state_of(&self, node: &ContentNode) -> Option<String> {
        if !node.kind.workflowed() {
            return None;
        }
        Some(
            node.pub_state
                .clone()
                .unwrap_or_else(|| STATE_PRIVATE.to_string()),
        )
    }

    fn available(&self, node: &ContentNode) -> Vec<String> {
        match self.state_of(node) {
            Some(state) => PUBLICATION_TRANSITIONS
                .iter()
                .filter(|(_, from, _)| *from == state)
                .map(|(name, _, _)| name.to_string())
                .collect(),
            None => Vec::new(),
        }
    }

    fn apply(&self, node: &ContentNode, transition: &str) -> Result<String> {
        let Some(state) = self.state_of(node) else {
            return Err(Error::Veto(format!(
                "This {} does not participate in the publication workflow.",
                node.kind.label()
            )));
        };
        for (name, from, to) in PUBLICATION_TRANSITIONS {
            if name == transition && from == state {
                return Ok(to.to_string());
            }
        }
        Err(Error::Veto(format!(
            "The transition \"{transition}\" is not available from state \"{state}\"."
        )))
    }
}

/// BTreeMap-backed tree for tests and embedding, pre-seeded with the root
/// and the trash.
pub struct MemoryContentTree {
    nodes: BTreeMap<EntityId, ContentNode>,
    next: u128,
}

impl Default for MemoryContentTree {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryContentTree {
    pub fn new() -> Self {
        let mut nodes = BTreeMap::new();
        nodes.insert(
            EntityId::ROOT,
            ContentNode {
                id: EntityId::ROOT,
                parent: None,
                name: String::new(),
                kind: NodeKind::Root,
                document: Document::new(),
                ordered_names: None,
                pub_state: None,
                memento: None,
                created: None,
                modified: None,
            },
        );
        nodes.insert(
            EntityId::TRASH,
            ContentNode {
                id: EntityId::TRASH,
                parent: Some(EntityId::ROOT),
                name: "trash".to_string(),
                kind: NodeKind::Trash,
                document: Document::new(),
                ordered_names: None,
                pub_state: None,
                memento: None,
                created: None,
                modified: None,
            },
        );
        Self { nodes, next: 0 }
    }

    fn node_mut(&mut self, id: EntityId) -> Result<&mut ContentNode> {
        self.nodes
            .get_mut(&id)
            .ok_or_else(|| Error::Storage(format!("no such entity {id}")))
    }
}

impl ContentTree for MemoryContentTree {
    fn get_node(&self, id: EntityId) -> Result<Option<ContentNode>> {
        Ok(self.nodes.get(&id).cloned())
    }

    fn children(&self, parent: EntityId) -> Result<Vec<ContentNode>> {
        Ok(self
            .nodes
            .values()
            .filter(|node| node.parent == Some(parent))
            .cloned()
            .collect())
    }

    fn create(
        &mut self,
        parent: EntityId,
        kind: NodeKind,
        name: &str,
        document: Document,
    ) -> Result<EntityId> {
        if !self.nodes.contains_key(&parent) {
            return Err(Error::Storage(format!("no such entity {parent}")));
        }
        self.next += 1;
        let id = EntityId(self.next);
        let now = Utc::now();
        self.nodes.insert(
            id,
            ContentNode {
                id,
                parent: Some(parent),
                name: name.to_string(),
                kind,
                document,
                ordered_names: None,
                pub_state: None,
                memento: None,
                created: Some(now),
                modified: Some(now),
            },
        );
        Ok(id)
    }

    fn set_document(&mut self, id: EntityId, document: Document) -> Result<()> {
        let node = self.node_mut(id)?;
        node.document = document;
        node.modified = Some(Utc::now());
        Ok(())
    }

    fn set_name(&mut self, id: EntityId, name: &str) -> Result<()> {
        self.node_mut(id)?.name = name.to_string();
        Ok(())
    }

    fn reparent(&mut self, id: EntityId, new_parent: EntityId, new_name: &str) -> Result<()> {
        if !self.nodes.contains_key(&new_parent) {
            return Err(Error::Storage(format!("no such entity {new_parent}")));
        }
        let node = self.node_mut(id)?;
        node.parent = Some(new_parent);
        node.name = new_name.to_string();
        Ok(())
    }

    fn set_ordered_names(&mut self, id: EntityId, names: Option<Vec<String>>) -> Result<()> {
        self.node_mut(id)?.ordered_names = names;
        Ok(())
    }

    fn set_memento(&mut self, id: EntityId, memento: Option<Memento>) -> Result<()> {
        self.node_mut(id)?.memento = memento;
        Ok(())
    }

    fn set_pub_state(&mut self, id: EntityId, state: Option<String>) -> Result<()> {
        self.node_mut(id)?.pub_state = state;
        Ok(())
    }

    fn delete(&mut self, id: EntityId) -> Result<()> {
        let doomed: Vec<EntityId> = self
            .nodes
            .values()
            .filter(|node| node.parent == Some(id))
            .map(|node| node.id)
            .collect();
        for child in doomed {
            self.delete(child)?;
        }
        self.nodes
            .remove(&id)
            .ok_or_else(|| Error::Storage(format!("no such entity {id}")))?;
        Ok(())
    }
}
