//! The only code allowed to write the five structural links of a node.
//!
//! Every function validates its arguments before touching anything, so a
//! failed call leaves the tree as it was.

use super::query::is_ancestor_of;
use super::Tree;
use crate::libs::phylo::error::TreeError;
use crate::libs::phylo::node::NodeId;

/// Replace the parent pointer of `id`, without touching any sibling chain.
///
/// This is a raw setter for bulk builders that keep the chains consistent
/// themselves. Everything else should use [`attach_child`].
pub fn set_parent(tree: &mut Tree, id: NodeId, parent: Option<NodeId>) -> Result<(), TreeError> {
    tree.member(id)?;
    if let Some(p) = parent {
        tree.member(p)?;
    }
    tree[id].parent = parent;
    tree.touch();
    Ok(())
}

/// Attach `child` under `parent`, at position `index` among its children
/// (`None` appends). Returns `parent`.
///
/// If `child` is already at that position nothing happens. Appending takes
/// constant time; an explicit `index` walks the sibling chain.
///
/// If `child` is an ancestor of `parent` the attachment would close a
/// cycle, so the lineage is rotated instead: `parent` is pruned from its own
/// parent and becomes a sibling of `child` (or parentless when `child` is
/// the root), then `child` moves under `parent` as usual.
pub fn attach_child(
    tree: &mut Tree,
    parent: NodeId,
    child: NodeId,
    index: Option<usize>,
) -> Result<NodeId, TreeError> {
    tree.member(parent)?;
    tree.member(child)?;
    if parent == child {
        return Err(TreeError::precondition(format!(
            "Cannot add node {} as child of itself",
            child
        )));
    }

    let already_child = tree[child].parent == Some(parent);
    match index {
        None if already_child && tree[parent].last_child == Some(child) => return Ok(parent),
        None => {}
        Some(i) => {
            if already_child && tree.children_iter(parent).position(|c| c == child) == Some(i) {
                return Ok(parent);
            }
            let others = tree.children_iter(parent).filter(|&c| c != child).count();
            if i > others {
                return Err(TreeError::precondition(format!(
                    "Child index {} out of range for node {} with {} children",
                    i, parent, others
                )));
            }
        }
    }

    if is_ancestor_of(tree, child, parent) {
        log::warn!("Node {} is an ancestor of {}, rotating", child, parent);
        let child_parent = tree[child].parent;
        unlink(tree, parent);
        if let Some(cp) = child_parent {
            link(tree, cp, parent, None);
        }
    }

    unlink(tree, child);
    link(tree, parent, child, index);
    tree.touch();

    Ok(parent)
}

/// Remove `child` from the children of `parent`.
/// The child keeps its own subtree and is left parentless.
pub fn detach_child(tree: &mut Tree, parent: NodeId, child: NodeId) -> Result<(), TreeError> {
    tree.member(parent)?;
    tree.member(child)?;
    if tree[child].parent != Some(parent) {
        return Err(TreeError::precondition(format!(
            "Node {} is not a child of {}",
            child, parent
        )));
    }

    unlink(tree, child);
    tree.touch();
    Ok(())
}

/// Set or clear the branch length. Infinite or NaN values are rejected.
pub fn set_branch_length(
    tree: &mut Tree,
    id: NodeId,
    length: Option<f64>,
) -> Result<(), TreeError> {
    tree.live(id)?;
    if let Some(value) = length {
        if !value.is_finite() {
            return Err(TreeError::BadNumber(format!(
                "Branch length of node {} must be finite, got {}",
                id, value
            )));
        }
    }
    tree[id].length = length;
    tree.touch();
    Ok(())
}

// Take `id` out of its parent's sibling chain and clear its parent.
fn unlink(tree: &mut Tree, id: NodeId) {
    let (parent, prev, next) = {
        let node = &tree[id];
        (node.parent, node.previous_sibling, node.next_sibling)
    };
    let Some(parent) = parent else {
        return;
    };

    match prev {
        Some(p) => tree[p].next_sibling = next,
        None => tree[parent].first_child = next,
    }
    match next {
        Some(n) => tree[n].previous_sibling = prev,
        None => tree[parent].last_child = prev,
    }

    let node = &mut tree[id];
    node.parent = None;
    node.previous_sibling = None;
    node.next_sibling = None;
}

// Put an unlinked `id` into the sibling chain of `parent` before the child
// currently at `index`, or at the end.
fn link(tree: &mut Tree, parent: NodeId, id: NodeId, index: Option<usize>) {
    let before = index.and_then(|i| tree.children_iter(parent).nth(i));

    match before {
        Some(next) => {
            let prev = tree[next].previous_sibling;
            tree[id].previous_sibling = prev;
            tree[id].next_sibling = Some(next);
            tree[next].previous_sibling = Some(id);
            match prev {
                Some(p) => tree[p].next_sibling = Some(id),
                None => tree[parent].first_child = Some(id),
            }
        }
        None => {
            let prev = tree[parent].last_child;
            tree[id].previous_sibling = prev;
            tree[id].next_sibling = None;
            match prev {
                Some(p) => tree[p].next_sibling = Some(id),
                None => tree[parent].first_child = Some(id),
            }
            tree[parent].last_child = Some(id);
        }
    }

    tree[id].parent = Some(parent);
}
