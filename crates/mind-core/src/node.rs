//! Node hierarchy and the path lookup table rooted at the top node.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::{MindError, Result};

static NEXT_MIND: AtomicU64 = AtomicU64::new(1);

/// Identity of one mind. Every node and fiber carries the id of the builder
/// that created it, and wiring checks it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MindId(u64);

impl MindId {
    pub(crate) fn next() -> Self {
        Self(NEXT_MIND.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for MindId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "mind#{}", self.0)
    }
}

/// Index of a node in its mind's registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeId {
    mind: MindId,
    index: u32,
}

impl NodeId {
    pub fn index(self) -> usize {
        self.index as usize
    }

    pub fn mind(self) -> MindId {
        self.mind
    }

    fn top(mind: MindId) -> Self {
        Self { mind, index: 0 }
    }
}

/// Optional capabilities a node carries instead of a class hierarchy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Facets {
    pub buildable: bool,
    pub tickable: bool,
    pub side_scope: bool,
}

#[derive(Debug, Clone)]
pub struct Node {
    id: NodeId,
    name: String,
    path: String,
    prefix: String,
    parent: Option<NodeId>,
    side: NodeId,
    facets: Facets,
}

impl Node {
    pub fn id(&self) -> NodeId {
        self.id
    }

    /// Leaf segment.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Full dotted path, unique within the mind.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Prefix for children's paths: empty for the top node.
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    pub fn top(&self) -> NodeId {
        NodeId::top(self.id.mind)
    }

    /// Nearest enclosing side scope, possibly the node itself.
    pub fn side(&self) -> NodeId {
        self.side
    }

    pub fn facets(&self) -> Facets {
        self.facets
    }

    pub fn is_top(&self) -> bool {
        self.id.index == 0
    }
}

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Node:{}[{}]", self.id.index, self.path)
    }
}

#[derive(Debug, Clone)]
pub struct Registry {
    mind: MindId,
    nodes: Vec<Node>,
    by_path: BTreeMap<String, NodeId>,
}

impl Registry {
    pub(crate) fn new(mind: MindId, top_name: &str) -> Self {
        let top_id = NodeId::top(mind);
        let top = Node {
            id: top_id,
            name: top_name.to_string(),
            path: top_name.to_string(),
            prefix: String::new(),
            parent: None,
            side: top_id,
            facets: Facets {
                side_scope: true,
                ..Facets::default()
            },
        };

        let mut by_path = BTreeMap::new();
        by_path.insert(top.path.clone(), top_id);

        Self {
            mind,
            nodes: vec![top],
            by_path,
        }
    }

    pub(crate) fn register(&mut self, parent: NodeId, name: &str, side_scope: bool) -> Result<NodeId> {
        let parent_node = self.get(parent)?;
        let path = format!("{}{}", parent_node.prefix, name);
        let parent_side = parent_node.side;

        if self.by_path.contains_key(&path) {
            return Err(MindError::DuplicateNode { path });
        }

        let id = NodeId {
            mind: self.mind,
            index: self.nodes.len() as u32,
        };
        let node = Node {
            id,
            name: name.to_string(),
            prefix: format!("{path}."),
            path: path.clone(),
            parent: Some(parent),
            side: if side_scope { id } else { parent_side },
            facets: Facets {
                side_scope,
                ..Facets::default()
            },
        };

        tracing::debug!(path = %node.path, "register node");
        self.by_path.insert(path, id);
        self.nodes.push(node);
        Ok(id)
    }

    pub(crate) fn facets_mut(&mut self, id: NodeId) -> Result<&mut Facets> {
        self.check(id)?;
        Ok(&mut self.nodes[id.index()].facets)
    }

    pub fn mind(&self) -> MindId {
        self.mind
    }

    pub fn top(&self) -> NodeId {
        NodeId::top(self.mind)
    }

    /// Fails unless `id` was handed out by this registry.
    pub fn check(&self, id: NodeId) -> Result<()> {
        if id.mind == self.mind && id.index() < self.nodes.len() {
            Ok(())
        } else {
            Err(MindError::ForeignWiring {
                what: format!("node #{} of {}", id.index, id.mind),
                mind: self.mind.to_string(),
            })
        }
    }

    pub fn get(&self, id: NodeId) -> Result<&Node> {
        self.check(id)?;
        Ok(&self.nodes[id.index()])
    }

    pub(crate) fn top_node(&self) -> &Node {
        &self.nodes[0]
    }

    pub fn lookup(&self, path: &str) -> Result<&Node> {
        self.by_path
            .get(path)
            .map(|id| &self.nodes[id.index()])
            .ok_or_else(|| MindError::NodeNotFound {
                path: path.to_string(),
            })
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Node> {
        self.nodes.iter()
    }
}
