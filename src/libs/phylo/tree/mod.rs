pub mod io;
pub mod link;
pub mod memo;
pub mod ops;
pub mod query;
pub mod stat;
pub mod traversal;

use super::error::TreeError;
use super::node::{ArenaId, Node, NodeId, TreeId};
use indexmap::{IndexMap, IndexSet};
use memo::Memo;
use rand::Rng;
use std::collections::{BTreeMap, HashMap};
use std::ops::{Index, IndexMut};
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};

pub use io::{LabelMode, LengthFormat, NewickOptions, NhxDialect};
pub use traversal::{Direction, Hooks, Visitor};

static NEXT_TREE_ID: AtomicU64 = AtomicU64::new(1);

fn next_tree_id() -> TreeId {
    NEXT_TREE_ID.fetch_add(1, Ordering::Relaxed)
}

#[derive(Debug, Clone)]
struct Slot {
    generation: u32,
    node: Option<Node>,
}

/// A rooted tree owning its nodes in an arena.
///
/// Nodes are created unattached, become members through [`Tree::insert`] and
/// are linked to each other only through the functions in [`link`].
#[derive(Debug)]
pub struct Tree {
    id: TreeId,

    /// Stamp carried by every NodeId this tree issues
    arena: ArenaId,

    /// Arena storage for all nodes, member or not
    slots: Vec<Slot>,

    /// Indices of freed slots, reused by `create_node`
    free: Vec<usize>,

    /// Member nodes in insertion order
    members: IndexSet<NodeId>,

    unrooted: bool,
    default: bool,

    /// Bumped on every structural change
    revision: u64,

    root_memo: Memo<Option<NodeId>>,
    tips_memo: Memo<Rc<HashMap<NodeId, usize>>>,
}

impl Default for Tree {
    fn default() -> Self {
        let id = next_tree_id();
        Self {
            id,
            arena: id,
            slots: Vec::new(),
            free: Vec::new(),
            members: IndexSet::new(),
            unrooted: false,
            default: false,
            revision: 0,
            root_memo: Memo::new(),
            tips_memo: Memo::new(),
        }
    }
}

impl Clone for Tree {
    /// The clone is a different tree: it gets a fresh identity and its nodes
    /// point back to it. It keeps the arena stamp, so NodeIds stay valid
    /// across the copy.
    fn clone(&self) -> Self {
        let id = next_tree_id();
        let mut slots = self.slots.clone();
        for slot in slots.iter_mut() {
            if let Some(node) = slot.node.as_mut() {
                if node.tree.is_some() {
                    node.tree = Some(id);
                }
            }
        }
        Self {
            id,
            arena: self.arena,
            slots,
            free: self.free.clone(),
            members: self.members.clone(),
            unrooted: self.unrooted,
            default: self.default,
            revision: self.revision,
            root_memo: Memo::new(),
            tips_memo: Memo::new(),
        }
    }
}

impl Index<NodeId> for Tree {
    type Output = Node;

    /// Panics on a stale or foreign id; use `get_node` to check first.
    fn index(&self, id: NodeId) -> &Node {
        match self.get_node(id) {
            Some(node) => node,
            None => panic!("invalid NodeId {} (generation {})", id, id.generation()),
        }
    }
}

impl IndexMut<NodeId> for Tree {
    fn index_mut(&mut self, id: NodeId) -> &mut Node {
        match self.get_node_mut(id) {
            Some(node) => node,
            None => panic!("invalid NodeId {} (generation {})", id, id.generation()),
        }
    }
}

impl Tree {
    /// Create a new empty tree
    ///
    /// # Example
    /// ```
    /// use phylokit::libs::phylo::tree::Tree;
    /// let tree = Tree::new();
    /// assert!(tree.is_empty());
    /// ```
    pub fn new() -> Self {
        Self::default()
    }

    pub fn id(&self) -> TreeId {
        self.id
    }

    /// Monotonic counter of structural changes
    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub(crate) fn touch(&mut self) {
        self.revision += 1;
    }

    /// Create a new unattached node that is not yet a member of the tree.
    pub fn create_node(&mut self) -> NodeId {
        let id = match self.free.pop() {
            Some(index) => NodeId::new(index, self.slots[index].generation, self.arena),
            None => {
                self.slots.push(Slot {
                    generation: 0,
                    node: None,
                });
                NodeId::new(self.slots.len() - 1, 0, self.arena)
            }
        };
        self.slots[id.index()].node = Some(Node::new(id));
        id
    }

    /// Make existing nodes members of the tree.
    /// Nodes that are already members are left alone.
    pub fn insert(&mut self, ids: &[NodeId]) -> Result<(), TreeError> {
        for &id in ids {
            self.live(id)?;
        }
        let tree_id = self.id;
        for &id in ids {
            if self.members.insert(id) {
                self[id].tree = Some(tree_id);
            }
        }
        self.touch();
        Ok(())
    }

    /// Add a new node to the tree. Returns the new node's ID.
    /// The node is initially detached (no parent).
    ///
    /// # Example
    /// ```
    /// use phylokit::libs::phylo::tree::Tree;
    /// let mut tree = Tree::new();
    /// let id = tree.add_node();
    /// assert_eq!(tree.len(), 1);
    /// ```
    pub fn add_node(&mut self) -> NodeId {
        let id = self.create_node();
        self.members.insert(id);
        let tree_id = self.id;
        self[id].tree = Some(tree_id);
        self.touch();
        id
    }

    /// Remove a node from the tree and free its slot.
    ///
    /// The node is detached from its parent first. A node that still has
    /// children cannot be deleted, since they would be left parentless.
    /// Every copy of `id` is invalid afterwards.
    pub fn delete(&mut self, id: NodeId) -> Result<Node, TreeError> {
        let (is_leaf, parent) = {
            let node = self.live(id)?;
            (node.is_leaf(), node.parent)
        };
        if !is_leaf {
            return Err(TreeError::precondition(format!(
                "Node {} still has children",
                id
            )));
        }
        if let Some(parent) = parent {
            link::detach_child(self, parent, id)?;
        }

        self.members.shift_remove(&id);
        let slot = &mut self.slots[id.index()];
        let mut node = slot.node.take().ok_or_else(|| stale(id))?;
        slot.generation = slot.generation.wrapping_add(1);
        self.free.push(id.index());
        node.tree = None;
        self.touch();
        Ok(node)
    }

    /// Get number of member nodes
    pub fn len(&self) -> usize {
        self.members.len()
    }

    /// Check if tree is empty
    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Member nodes in insertion order
    pub fn nodes(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.members.iter().copied()
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.members.contains(&id)
    }

    /// Get a reference to a node by ID.
    /// Returns None if the ID is stale or was issued by another tree.
    pub fn get_node(&self, id: NodeId) -> Option<&Node> {
        if id.arena() != self.arena {
            return None;
        }
        self.slots
            .get(id.index())
            .filter(|s| s.generation == id.generation())
            .and_then(|s| s.node.as_ref())
    }

    /// Get a mutable reference to a node by ID.
    pub fn get_node_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        if id.arena() != self.arena {
            return None;
        }
        self.slots
            .get_mut(id.index())
            .filter(|s| s.generation == id.generation())
            .and_then(|s| s.node.as_mut())
    }

    /// A node that exists in the arena
    pub(crate) fn live(&self, id: NodeId) -> Result<&Node, TreeError> {
        self.get_node(id).ok_or_else(|| stale(id))
    }

    /// A node that exists and is a member of this tree
    pub(crate) fn member(&self, id: NodeId) -> Result<&Node, TreeError> {
        let node = self.live(id)?;
        if node.tree != Some(self.id) {
            return Err(TreeError::LinkTypeError(format!(
                "Node {} is not a member of this tree",
                id
            )));
        }
        Ok(node)
    }

    /// The parentless member, or None for an empty tree.
    ///
    /// While a detached subtree is waiting to be re-attached there can be
    /// several parentless members; the earliest inserted one wins.
    pub fn get_root(&self) -> Option<NodeId> {
        self.root_memo.get_or_insert_with(self.revision, || {
            self.members
                .iter()
                .copied()
                .find(|&id| self[id].parent.is_none())
        })
    }

    /// All parentless members
    pub fn roots(&self) -> Vec<NodeId> {
        self.members
            .iter()
            .copied()
            .filter(|&id| self[id].parent.is_none())
            .collect()
    }

    pub fn set_as_unrooted(&mut self) {
        self.unrooted = true;
    }

    pub fn set_as_rooted(&mut self) {
        self.unrooted = false;
    }

    /// Mark this tree as the default one of a forest
    pub fn set_as_default(&mut self) {
        self.default = true;
    }

    pub fn set_not_default(&mut self) {
        self.default = false;
    }

    pub fn is_default(&self) -> bool {
        self.default
    }

    /// False when marked unrooted, or when the root is a basal polytomy.
    pub fn is_rooted(&self) -> bool {
        if self.unrooted {
            return false;
        }
        match self.get_root() {
            Some(root) => self.children_iter(root).count() <= 2,
            None => true,
        }
    }

    // --- Delegation to link ---

    pub fn set_parent(&mut self, id: NodeId, parent: Option<NodeId>) -> Result<(), TreeError> {
        link::set_parent(self, id, parent)
    }

    pub fn attach_child(
        &mut self,
        parent: NodeId,
        child: NodeId,
        index: Option<usize>,
    ) -> Result<NodeId, TreeError> {
        link::attach_child(self, parent, child, index)
    }

    /// Append `child` as the last child of `parent`.
    pub fn add_child(&mut self, parent: NodeId, child: NodeId) -> Result<(), TreeError> {
        link::attach_child(self, parent, child, None).map(|_| ())
    }

    pub fn detach_child(&mut self, parent: NodeId, child: NodeId) -> Result<(), TreeError> {
        link::detach_child(self, parent, child)
    }

    pub fn set_branch_length(&mut self, id: NodeId, length: Option<f64>) -> Result<(), TreeError> {
        link::set_branch_length(self, id, length)
    }

    // --- Delegation to ops ---

    pub fn collapse(&mut self, id: NodeId) -> Result<bool, TreeError> {
        ops::collapse(self, id)
    }

    pub fn insert_node_below(&mut self, id: NodeId) -> Result<NodeId, TreeError> {
        ops::insert_node_below(self, id)
    }

    pub fn reroot_below(&mut self, id: NodeId, name: Option<&str>) -> Result<NodeId, TreeError> {
        ops::reroot_below(self, id, name)
    }

    pub fn resolve_polytomies<R: Rng + ?Sized>(&mut self, rng: &mut R) -> Result<usize, TreeError> {
        ops::resolve_polytomies(self, rng)
    }

    pub fn prune_tips(&mut self, names: &[&str]) -> Result<usize, TreeError> {
        ops::prune_tips(self, names)
    }

    pub fn keep_tips(&mut self, names: &[&str]) -> Result<usize, TreeError> {
        ops::keep_tips(self, names)
    }

    pub fn prune_clades(&mut self, ids: &[NodeId]) -> Result<usize, TreeError> {
        ops::prune_clades(self, ids)
    }

    pub fn remove_unbranched_internals(&mut self) -> Result<usize, TreeError> {
        ops::remove_unbranched_internals(self)
    }

    pub fn remove_subtree(&mut self, id: NodeId) -> Result<usize, TreeError> {
        ops::remove_subtree(self, id)
    }

    pub fn graft(
        &mut self,
        parent: Option<NodeId>,
        source: &Tree,
        source_root: NodeId,
    ) -> Result<NodeId, TreeError> {
        ops::graft(self, parent, source, source_root)
    }

    pub fn extract_subtree(&self, root_id: NodeId) -> Result<Tree, TreeError> {
        ops::extract_subtree(self, root_id)
    }

    // --- Delegation to traversal ---

    pub fn depth_first<V: Visitor + ?Sized>(
        &self,
        start: NodeId,
        direction: Direction,
        visitor: &mut V,
    ) {
        traversal::depth_first(self, start, direction, visitor)
    }

    pub fn breadth_first<V: Visitor + ?Sized>(
        &self,
        start: NodeId,
        direction: Direction,
        visitor: &mut V,
    ) {
        traversal::breadth_first(self, start, direction, visitor)
    }

    pub fn level_order<F>(&self, start: NodeId, callback: F)
    where
        F: FnMut(&Tree, NodeId),
    {
        traversal::level_order(self, start, callback)
    }

    pub fn preorder(&self, start_node: NodeId) -> Vec<NodeId> {
        traversal::preorder(self, start_node)
    }

    pub fn postorder(&self, start_node: NodeId) -> Vec<NodeId> {
        traversal::postorder(self, start_node)
    }

    pub fn levelorder(&self, start_node: NodeId) -> Vec<NodeId> {
        traversal::levelorder(self, start_node)
    }

    // --- Delegation to query ---

    pub fn children_iter(&self, id: NodeId) -> query::Children<'_> {
        query::children_iter(self, id)
    }

    pub fn children(&self, id: NodeId) -> Vec<NodeId> {
        query::children(self, id)
    }

    pub fn ancestors(&self, id: NodeId) -> Option<Vec<NodeId>> {
        query::ancestors(self, id)
    }

    pub fn descendants(&self, id: NodeId) -> Vec<NodeId> {
        query::descendants(self, id)
    }

    pub fn siblings(&self, id: NodeId) -> Vec<NodeId> {
        query::siblings(self, id)
    }

    pub fn most_recent_common_ancestor(&self, a: NodeId, b: NodeId) -> Result<NodeId, TreeError> {
        query::most_recent_common_ancestor(self, a, b)
    }

    pub fn path_to_root(&self, id: NodeId) -> f64 {
        query::path_to_root(self, id)
    }

    pub fn patristic_distance(&self, a: NodeId, b: NodeId) -> Result<f64, TreeError> {
        query::patristic_distance(self, a, b)
    }

    pub fn nodal_distance(&self, a: NodeId, b: NodeId) -> Result<usize, TreeError> {
        query::nodal_distance(self, a, b)
    }

    pub fn get_path_from_root(&self, id: NodeId) -> Result<Vec<NodeId>, TreeError> {
        query::get_path_from_root(self, id)
    }

    pub fn is_ancestor_of(&self, ancestor: NodeId, id: NodeId) -> bool {
        query::is_ancestor_of(self, ancestor, id)
    }

    pub fn is_descendant_of(&self, id: NodeId, ancestor: NodeId) -> bool {
        query::is_descendant_of(self, id, ancestor)
    }

    pub fn terminals(&self) -> Vec<NodeId> {
        query::terminals(self)
    }

    pub fn internals(&self) -> Vec<NodeId> {
        query::internals(self)
    }

    pub fn find_nodes<F>(&self, predicate: F) -> Vec<NodeId>
    where
        F: Fn(&Node) -> bool,
    {
        query::find_nodes(self, predicate)
    }

    pub fn get_node_by_name(&self, name: &str) -> Option<NodeId> {
        query::get_node_by_name(self, name)
    }

    pub fn get_name_id(&self) -> BTreeMap<String, NodeId> {
        query::get_name_id(self)
    }

    pub fn is_monophyletic(&self, nodes: &[NodeId]) -> bool {
        query::is_monophyletic(self, nodes)
    }

    pub fn get_height(&self, id: NodeId, weighted: bool) -> f64 {
        query::get_height(self, id, weighted)
    }

    pub fn min_path_to_tips(&self, id: NodeId) -> f64 {
        query::min_path_to_tips(self, id)
    }

    pub fn count_descendants(&self, id: NodeId) -> usize {
        query::count_descendants(self, id)
    }

    // --- Delegation to stat ---

    /// Terminal count below every node of the rooted tree, cached per revision.
    pub fn terminal_counts(&self) -> Rc<HashMap<NodeId, usize>> {
        self.tips_memo
            .get_or_insert_with(self.revision, || Rc::new(stat::count_terminals(self)))
    }

    pub fn tree_length(&self) -> f64 {
        stat::tree_length(self)
    }

    pub fn tree_height(&self) -> f64 {
        stat::tree_height(self)
    }

    pub fn resolution(&self) -> Result<f64, TreeError> {
        stat::resolution(self)
    }

    pub fn is_ultrametric(&self, margin: f64) -> bool {
        stat::is_ultrametric(self, margin)
    }

    pub fn is_binary(&self) -> bool {
        stat::is_binary(self)
    }

    pub fn colless_imbalance(&self) -> Result<f64, TreeError> {
        stat::colless_imbalance(self)
    }

    pub fn i2_imbalance(&self) -> Result<f64, TreeError> {
        stat::i2_imbalance(self)
    }

    pub fn fiala_stemminess(&self) -> Result<f64, TreeError> {
        stat::fiala_stemminess(self)
    }

    pub fn rohlf_stemminess(&self) -> Result<f64, TreeError> {
        stat::rohlf_stemminess(self)
    }

    pub fn gamma(&self) -> Result<f64, TreeError> {
        stat::gamma(self)
    }

    pub fn fair_proportion(&self) -> IndexMap<NodeId, f64> {
        stat::fair_proportion(self)
    }

    pub fn equal_splits(&self) -> IndexMap<NodeId, f64> {
        stat::equal_splits(self)
    }

    pub fn pendant_edge(&self) -> IndexMap<NodeId, f64> {
        stat::pendant_edge(self)
    }

    pub fn shapley_value(&self) -> IndexMap<NodeId, f64> {
        stat::shapley_value(self)
    }

    pub fn sackin(&self) -> usize {
        stat::sackin(self)
    }

    pub fn cherries(&self) -> usize {
        stat::cherries(self)
    }

    pub fn diameter(&self) -> f64 {
        stat::diameter(self, true)
    }

    pub fn get_node_with_longest_edge(&self) -> Option<NodeId> {
        stat::get_node_with_longest_edge(self)
    }

    // --- Delegation to io ---

    pub fn from_file(infile: &str) -> anyhow::Result<Vec<Tree>> {
        io::from_file(infile)
    }

    pub fn to_newick(&self) -> String {
        io::to_newick(self)
    }

    pub fn to_newick_with(&self, options: &NewickOptions) -> String {
        io::to_newick_with(self, options)
    }

    pub fn to_newick_subtree(&self, root: NodeId, options: &NewickOptions) -> String {
        io::to_newick_subtree(self, root, options)
    }
}

fn stale(id: NodeId) -> TreeError {
    TreeError::LinkTypeError(format!(
        "Node {} does not exist in this tree (stale or foreign id)",
        id
    ))
}
