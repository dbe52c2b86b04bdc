use std::collections::{BTreeMap, BTreeSet};

use super::Tree;
use crate::libs::phylo::error::TreeError;
use crate::libs::phylo::node::{Node, NodeId};

/// Left-to-right iterator over the sibling chain below a node.
///
/// It borrows the tree, so the structure cannot change while it is alive.
pub struct Children<'a> {
    tree: &'a Tree,
    next: Option<NodeId>,
}

impl<'a> Iterator for Children<'a> {
    type Item = NodeId;

    fn next(&mut self) -> Option<NodeId> {
        let current = self.next?;
        self.next = self.tree.get_node(current).and_then(|n| n.next_sibling);
        Some(current)
    }
}

pub fn children_iter(tree: &Tree, id: NodeId) -> Children<'_> {
    Children {
        tree,
        next: tree.get_node(id).and_then(|n| n.first_child),
    }
}

/// Snapshot of the children of a node, left to right.
pub fn children(tree: &Tree, id: NodeId) -> Vec<NodeId> {
    children_iter(tree, id).collect()
}

/// Ancestors from the immediate parent up to the root (root last).
/// None for the root itself.
pub fn ancestors(tree: &Tree, id: NodeId) -> Option<Vec<NodeId>> {
    let mut result = Vec::new();
    let mut current = tree.get_node(id)?.parent;
    while let Some(p) = current {
        result.push(p);
        current = tree[p].parent;
    }
    if result.is_empty() {
        None
    } else {
        Some(result)
    }
}

// The node followed by its ancestors
fn lineage(tree: &Tree, id: NodeId) -> Vec<NodeId> {
    let mut result = vec![id];
    if let Some(anc) = ancestors(tree, id) {
        result.extend(anc);
    }
    result
}

/// All descendants, generation by generation: the children first, then
/// the children of those, and so on.
pub fn descendants(tree: &Tree, id: NodeId) -> Vec<NodeId> {
    let mut result = Vec::new();
    let mut generation = children(tree, id);
    while !generation.is_empty() {
        let mut next = Vec::new();
        for &node in &generation {
            next.extend(children_iter(tree, node));
        }
        result.append(&mut generation);
        generation = next;
    }
    result
}

/// The other children of this node's parent.
pub fn siblings(tree: &Tree, id: NodeId) -> Vec<NodeId> {
    match tree.get_node(id).and_then(|n| n.parent) {
        Some(p) => children_iter(tree, p).filter(|&c| c != id).collect(),
        None => Vec::new(),
    }
}

pub fn is_ancestor_of(tree: &Tree, ancestor: NodeId, id: NodeId) -> bool {
    let mut current = tree.get_node(id).and_then(|n| n.parent);
    // Bounded in case raw `set_parent` calls left a cycle behind
    let mut steps = 0;
    while let Some(p) = current {
        if p == ancestor {
            return true;
        }
        steps += 1;
        if steps > tree.slots.len() {
            break;
        }
        current = tree[p].parent;
    }
    false
}

pub fn is_descendant_of(tree: &Tree, id: NodeId, ancestor: NodeId) -> bool {
    is_ancestor_of(tree, ancestor, id)
}

/// Find the Most Recent Common Ancestor of two nodes.
///
/// Both lineages are ordered nearest-first, so the first shared node of a
/// nested scan is the nearest one. A node counts as part of its own lineage,
/// which makes the MRCA of a node and one of its ancestors that ancestor.
pub fn most_recent_common_ancestor(tree: &Tree, a: NodeId, b: NodeId) -> Result<NodeId, TreeError> {
    tree.member(a)?;
    tree.member(b)?;
    if a == b {
        return Ok(a);
    }

    let lineage_a = lineage(tree, a);
    let lineage_b = lineage(tree, b);
    for &u in &lineage_a {
        for &v in &lineage_b {
            if u == v {
                return Ok(u);
            }
        }
    }

    Err(TreeError::Disconnected { a, b })
}

/// Sum of branch lengths from the node up to the root; unset lengths count as 0.
pub fn path_to_root(tree: &Tree, id: NodeId) -> f64 {
    let mut sum = 0.0;
    let mut current = id;
    while let Some(node) = tree.get_node(current) {
        match node.parent {
            Some(p) => {
                sum += node.length.unwrap_or(0.0);
                current = p;
            }
            None => break,
        }
    }
    sum
}

// Weighted and topological distance from `start` up to its ancestor `end`.
fn distance_up(tree: &Tree, start: NodeId, end: NodeId) -> (f64, usize) {
    let mut weighted = 0.0;
    let mut topo = 0;
    let mut current = start;

    while current != end {
        let node = &tree[current];
        weighted += node.length.unwrap_or(0.0);
        topo += 1;
        match node.parent {
            Some(p) => current = p,
            None => break,
        }
    }
    (weighted, topo)
}

/// Sum of branch lengths on the path between two nodes.
pub fn patristic_distance(tree: &Tree, a: NodeId, b: NodeId) -> Result<f64, TreeError> {
    let mrca = most_recent_common_ancestor(tree, a, b)?;
    let (w1, _) = distance_up(tree, a, mrca);
    let (w2, _) = distance_up(tree, b, mrca);
    Ok(w1 + w2)
}

/// Number of edges on the path between two nodes.
pub fn nodal_distance(tree: &Tree, a: NodeId, b: NodeId) -> Result<usize, TreeError> {
    let mrca = most_recent_common_ancestor(tree, a, b)?;
    let (_, t1) = distance_up(tree, a, mrca);
    let (_, t2) = distance_up(tree, b, mrca);
    Ok(t1 + t2)
}

/// Nodes from the root down to `id`, both ends included.
pub fn get_path_from_root(tree: &Tree, id: NodeId) -> Result<Vec<NodeId>, TreeError> {
    tree.member(id)?;
    let mut path = lineage(tree, id);
    path.reverse();

    if tree.get_root() != path.first().copied() {
        return Err(TreeError::precondition(format!(
            "Node {} is detached from the root",
            id
        )));
    }
    Ok(path)
}

/// Leaves of the subtree rooted at `id`, left to right.
pub fn terminals_under(tree: &Tree, id: NodeId) -> Vec<NodeId> {
    tree.preorder(id)
        .into_iter()
        .filter(|&n| tree[n].is_leaf())
        .collect()
}

/// Leaves reachable from the root, left to right.
pub fn terminals(tree: &Tree) -> Vec<NodeId> {
    match tree.get_root() {
        Some(root) => terminals_under(tree, root),
        None => Vec::new(),
    }
}

/// Internal nodes reachable from the root, in preorder.
pub fn internals(tree: &Tree) -> Vec<NodeId> {
    match tree.get_root() {
        Some(root) => tree
            .preorder(root)
            .into_iter()
            .filter(|&n| !tree[n].is_leaf())
            .collect(),
        None => Vec::new(),
    }
}

/// Check if a set of nodes is monophyletic.
/// A set is monophyletic if the set of leaves in the subtree of their MRCA
/// is exactly the same as the set of leaves reachable from the input nodes.
pub fn is_monophyletic(tree: &Tree, nodes: &[NodeId]) -> bool {
    if nodes.is_empty() {
        return false;
    }
    if nodes.len() == 1 {
        return true;
    }

    let mut mrca = nodes[0];
    for &n in &nodes[1..] {
        match most_recent_common_ancestor(tree, mrca, n) {
            Ok(anc) => mrca = anc,
            Err(_) => return false,
        }
    }

    let mrca_leaves: BTreeSet<NodeId> = terminals_under(tree, mrca).into_iter().collect();

    let mut input_leaves = BTreeSet::new();
    for &n in nodes {
        input_leaves.extend(terminals_under(tree, n));
    }

    mrca_leaves == input_leaves
}

/// Get height of a node (max distance to any leaf in its subtree).
pub fn get_height(tree: &Tree, id: NodeId, weighted: bool) -> f64 {
    children_iter(tree, id)
        .map(|child| {
            let dist = if weighted {
                tree[child].length.unwrap_or(0.0)
            } else {
                1.0
            };
            dist + get_height(tree, child, weighted)
        })
        .fold(0.0, f64::max)
}

/// Shortest weighted distance from the node down to any leaf of its subtree.
pub fn min_path_to_tips(tree: &Tree, id: NodeId) -> f64 {
    children_iter(tree, id)
        .map(|child| tree[child].length.unwrap_or(0.0) + min_path_to_tips(tree, child))
        .fold(None, |acc: Option<f64>, d| Some(acc.map_or(d, |a| a.min(d))))
        .unwrap_or(0.0)
}

/// Count number of descendants (all nodes in subtree excluding self).
pub fn count_descendants(tree: &Tree, id: NodeId) -> usize {
    children_iter(tree, id)
        .map(|child| 1 + count_descendants(tree, child))
        .sum()
}

/// Find member nodes matching a predicate.
pub fn find_nodes<F>(tree: &Tree, predicate: F) -> Vec<NodeId>
where
    F: Fn(&Node) -> bool,
{
    tree.nodes().filter(|&id| predicate(&tree[id])).collect()
}

/// Get node ID by name. Returns first match in insertion order.
pub fn get_node_by_name(tree: &Tree, name: &str) -> Option<NodeId> {
    tree.nodes()
        .find(|&id| tree[id].name.as_deref() == Some(name))
}

/// Get a map of node name to NodeId.
pub fn get_name_id(tree: &Tree) -> BTreeMap<String, NodeId> {
    let mut map = BTreeMap::new();
    for id in tree.nodes() {
        if let Some(name) = &tree[id].name {
            map.insert(name.clone(), id);
        }
    }
    map
}
