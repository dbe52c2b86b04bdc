//! Recursive walks driven by named hooks.
//!
//! For a node `N` the depth-first walk calls, in order:
//! `pre`, then either `pre_child` / recurse into the child / `post_child` or
//! `no_child`, then `in_order`, then either `pre_sibling` / recurse into the
//! sibling / `post_sibling` or `no_sibling`, and finally `post`.
//! The breadth-first walk swaps the child and sibling branches.
//!
//! Hooks receive a shared borrow of the tree, so it cannot be mutated while a
//! walk is in progress. Siblings of the start node are never followed.
//! The hook walks recurse per sibling; the plain id lists never recurse.

use super::Tree;
use crate::libs::phylo::node::{Node, NodeId};
use std::collections::VecDeque;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Direction {
    /// Follow `first_child` and `next_sibling`
    #[default]
    LeftToRight,
    /// Follow `last_child` and `previous_sibling`
    RightToLeft,
}

impl Direction {
    fn child(self, node: &Node) -> Option<NodeId> {
        match self {
            Direction::LeftToRight => node.first_child,
            Direction::RightToLeft => node.last_child,
        }
    }

    fn sibling(self, node: &Node) -> Option<NodeId> {
        match self {
            Direction::LeftToRight => node.next_sibling,
            Direction::RightToLeft => node.previous_sibling,
        }
    }
}

/// Callback points of a walk. Every hook defaults to doing nothing.
pub trait Visitor {
    fn pre(&mut self, _tree: &Tree, _id: NodeId) {}
    fn pre_child(&mut self, _tree: &Tree, _id: NodeId) {}
    fn post_child(&mut self, _tree: &Tree, _id: NodeId) {}
    fn no_child(&mut self, _tree: &Tree, _id: NodeId) {}
    fn in_order(&mut self, _tree: &Tree, _id: NodeId) {}
    fn pre_sibling(&mut self, _tree: &Tree, _id: NodeId) {}
    fn post_sibling(&mut self, _tree: &Tree, _id: NodeId) {}
    fn no_sibling(&mut self, _tree: &Tree, _id: NodeId) {}
    fn post(&mut self, _tree: &Tree, _id: NodeId) {}
}

type Callback<'a> = Box<dyn FnMut(&Tree, NodeId) + 'a>;

/// A [`Visitor`] assembled from closures.
///
/// ```
/// use phylokit::libs::phylo::tree::{Direction, Hooks, Tree};
/// let tree = Tree::from_newick("((A,B),C);").unwrap();
/// let mut leaves = vec![];
/// let mut hooks = Hooks::new().on_no_child(|t, id| leaves.push(t[id].internal_name()));
/// tree.depth_first(tree.get_root().unwrap(), Direction::RightToLeft, &mut hooks);
/// drop(hooks);
/// assert_eq!(leaves, vec!["C", "B", "A"]);
/// ```
#[derive(Default)]
pub struct Hooks<'a> {
    pre: Option<Callback<'a>>,
    pre_child: Option<Callback<'a>>,
    post_child: Option<Callback<'a>>,
    no_child: Option<Callback<'a>>,
    in_order: Option<Callback<'a>>,
    pre_sibling: Option<Callback<'a>>,
    post_sibling: Option<Callback<'a>>,
    no_sibling: Option<Callback<'a>>,
    post: Option<Callback<'a>>,
}

macro_rules! hook_setters {
    ($($setter:ident => $field:ident),* $(,)?) => {
        $(
            pub fn $setter<F>(mut self, f: F) -> Self
            where
                F: FnMut(&Tree, NodeId) + 'a,
            {
                self.$field = Some(Box::new(f));
                self
            }
        )*
    };
}

macro_rules! hook_calls {
    ($($field:ident),* $(,)?) => {
        $(
            fn $field(&mut self, tree: &Tree, id: NodeId) {
                if let Some(f) = self.$field.as_mut() {
                    f(tree, id);
                }
            }
        )*
    };
}

impl<'a> Hooks<'a> {
    pub fn new() -> Self {
        Self::default()
    }

    hook_setters!(
        on_pre => pre,
        on_pre_child => pre_child,
        on_post_child => post_child,
        on_no_child => no_child,
        on_in_order => in_order,
        on_pre_sibling => pre_sibling,
        on_post_sibling => post_sibling,
        on_no_sibling => no_sibling,
        on_post => post,
    );
}

impl Visitor for Hooks<'_> {
    hook_calls!(
        pre,
        pre_child,
        post_child,
        no_child,
        in_order,
        pre_sibling,
        post_sibling,
        no_sibling,
        post,
    );
}

pub fn depth_first<V: Visitor + ?Sized>(
    tree: &Tree,
    start: NodeId,
    direction: Direction,
    visitor: &mut V,
) {
    if tree.get_node(start).is_some() {
        walk(tree, start, direction, visitor, false, true);
    }
}

pub fn breadth_first<V: Visitor + ?Sized>(
    tree: &Tree,
    start: NodeId,
    direction: Direction,
    visitor: &mut V,
) {
    if tree.get_node(start).is_some() {
        walk(tree, start, direction, visitor, true, true);
    }
}

fn walk<V: Visitor + ?Sized>(
    tree: &Tree,
    id: NodeId,
    direction: Direction,
    visitor: &mut V,
    siblings_first: bool,
    is_start: bool,
) {
    let node = &tree[id];
    let child = direction.child(node);
    let sibling = if is_start {
        None
    } else {
        direction.sibling(node)
    };

    visitor.pre(tree, id);
    if siblings_first {
        visit_sibling(tree, id, sibling, direction, visitor, siblings_first);
        visitor.in_order(tree, id);
        visit_child(tree, id, child, direction, visitor, siblings_first);
    } else {
        visit_child(tree, id, child, direction, visitor, siblings_first);
        visitor.in_order(tree, id);
        visit_sibling(tree, id, sibling, direction, visitor, siblings_first);
    }
    visitor.post(tree, id);
}

fn visit_child<V: Visitor + ?Sized>(
    tree: &Tree,
    id: NodeId,
    child: Option<NodeId>,
    direction: Direction,
    visitor: &mut V,
    siblings_first: bool,
) {
    match child {
        Some(c) => {
            visitor.pre_child(tree, id);
            walk(tree, c, direction, visitor, siblings_first, false);
            visitor.post_child(tree, id);
        }
        None => visitor.no_child(tree, id),
    }
}

fn visit_sibling<V: Visitor + ?Sized>(
    tree: &Tree,
    id: NodeId,
    sibling: Option<NodeId>,
    direction: Direction,
    visitor: &mut V,
    siblings_first: bool,
) {
    match sibling {
        Some(s) => {
            visitor.pre_sibling(tree, id);
            walk(tree, s, direction, visitor, siblings_first, false);
            visitor.post_sibling(tree, id);
        }
        None => visitor.no_sibling(tree, id),
    }
}

/// FIFO walk: the start node, then its children left to right, and so on.
pub fn level_order<F>(tree: &Tree, start: NodeId, mut callback: F)
where
    F: FnMut(&Tree, NodeId),
{
    let mut queue = VecDeque::new();
    if tree.get_node(start).is_some() {
        queue.push_back(start);
    }

    while let Some(id) = queue.pop_front() {
        callback(tree, id);
        queue.extend(tree.children_iter(id));
    }
}

/// Get node IDs in preorder traversal (Root -> Children)
pub fn preorder(tree: &Tree, start_node: NodeId) -> Vec<NodeId> {
    let mut result = Vec::new();
    if tree.get_node(start_node).is_none() {
        return result;
    }
    let mut stack = vec![start_node];

    while let Some(id) = stack.pop() {
        result.push(id);
        // Push children in reverse order so they are processed in order
        let mut child = tree[id].last_child;
        while let Some(c) = child {
            stack.push(c);
            child = tree[c].previous_sibling;
        }
    }

    result
}

/// Get node IDs in postorder traversal (Children -> Root)
///
/// A right-to-left preorder, reversed. Iterative, so wide polytomies are fine.
pub fn postorder(tree: &Tree, start_node: NodeId) -> Vec<NodeId> {
    let mut result = Vec::new();
    if tree.get_node(start_node).is_none() {
        return result;
    }
    let mut stack = vec![start_node];

    while let Some(id) = stack.pop() {
        result.push(id);
        let mut child = tree[id].first_child;
        while let Some(c) = child {
            stack.push(c);
            child = tree[c].next_sibling;
        }
    }

    result.reverse();
    result
}

/// Get node IDs in levelorder traversal (BFS)
pub fn levelorder(tree: &Tree, start_node: NodeId) -> Vec<NodeId> {
    let mut result = Vec::new();
    level_order(tree, start_node, |_, id| result.push(id));
    result
}
