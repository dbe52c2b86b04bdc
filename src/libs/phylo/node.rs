use indexmap::IndexMap;
use std::fmt;
use std::rc::Weak;

/// NodeId is a generational index into the Tree's node arena.
/// It is lightweight (Copy) and safe: once a node is deleted its slot gets a
/// new generation, so an old NodeId can never reach whatever reuses the slot.
///
/// The id is also stamped with the arena that issued it, so a tree rejects ids
/// of other trees. A clone shares its original's arena stamp: the same id
/// names the corresponding node in both copies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId {
    index: u32,
    generation: u32,
    arena: ArenaId,
}

impl NodeId {
    pub(crate) fn new(index: usize, generation: u32, arena: ArenaId) -> Self {
        Self {
            index: index as u32,
            generation,
            arena,
        }
    }

    /// Position of the node in the arena
    pub fn index(&self) -> usize {
        self.index as usize
    }

    pub fn generation(&self) -> u32 {
        self.generation
    }

    pub fn arena(&self) -> ArenaId {
        self.arena
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.index)
    }
}

/// Identity of a Tree, used as the node -> tree back-reference.
pub type TreeId = u64;

/// Identity of a node arena. Trees made with `Tree::new` get their own;
/// clones keep the one they were copied from.
pub type ArenaId = u64;

/// An externally managed taxon. Nodes only ever hold a `Weak` to it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Taxon {
    pub name: String,
}

impl Taxon {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

#[derive(Debug, Clone)]
pub struct Node {
    /// Unique identifier for the node (generational arena index)
    pub(crate) id: NodeId,

    // --- Payload ---
    /// Node name/label (e.g., "human", "internal_1")
    pub name: Option<String>,

    /// Branch length to parent.
    /// In rooted trees, edge length is an attribute of the child node.
    /// Only `Tree::set_branch_length` writes it, so it is always finite.
    pub(crate) length: Option<f64>,

    pub score: Option<f64>,

    pub description: Option<String>,

    /// Annotations (e.g., NHX tags like [&&NHX:S=human]), kept in insertion order.
    pub properties: IndexMap<String, String>,

    /// Cross-reference to a taxon owned elsewhere
    pub taxon: Option<Weak<Taxon>>,

    // --- Structure, written by `tree::link` only ---
    pub(crate) parent: Option<NodeId>,
    pub(crate) first_child: Option<NodeId>,
    pub(crate) last_child: Option<NodeId>,
    pub(crate) next_sibling: Option<NodeId>,
    pub(crate) previous_sibling: Option<NodeId>,

    /// Owning tree while the node is a member
    pub(crate) tree: Option<TreeId>,
}

impl Node {
    /// Create a new unattached node with a specific ID
    pub(crate) fn new(id: NodeId) -> Self {
        Self {
            id,
            name: None,
            length: None,
            score: None,
            description: None,
            properties: IndexMap::new(),
            taxon: None,
            parent: None,
            first_child: None,
            last_child: None,
            next_sibling: None,
            previous_sibling: None,
            tree: None,
        }
    }

    pub fn id(&self) -> NodeId {
        self.id
    }

    /// Set the name of the node
    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = Some(name.into());
    }

    /// Add a property (key-value pair)
    pub fn add_property(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.properties.insert(key.into(), value.into());
    }

    pub fn get_property(&self, key: &str) -> Option<&str> {
        self.properties.get(key).map(|s| s.as_str())
    }

    /// Branch length to the parent; `Some(0.0)` is a defined zero-length branch.
    pub fn length(&self) -> Option<f64> {
        self.length
    }

    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    pub fn first_child(&self) -> Option<NodeId> {
        self.first_child
    }

    pub fn last_child(&self) -> Option<NodeId> {
        self.last_child
    }

    pub fn next_sibling(&self) -> Option<NodeId> {
        self.next_sibling
    }

    pub fn previous_sibling(&self) -> Option<NodeId> {
        self.previous_sibling
    }

    /// The tree this node currently belongs to
    pub fn tree(&self) -> Option<TreeId> {
        self.tree
    }

    /// Check if the node is a leaf (no children)
    pub fn is_leaf(&self) -> bool {
        self.first_child.is_none()
    }

    pub fn is_root(&self) -> bool {
        self.parent.is_none()
    }

    /// Name of the cross-referenced taxon, if it is still alive
    pub fn taxon_name(&self) -> Option<String> {
        self.taxon
            .as_ref()
            .and_then(|w| w.upgrade())
            .map(|t| t.name.clone())
    }

    /// The node name, or a name derived from its arena index.
    pub fn internal_name(&self) -> String {
        match &self.name {
            Some(name) => name.clone(),
            None => format!("node{}", self.id.index()),
        }
    }
}
