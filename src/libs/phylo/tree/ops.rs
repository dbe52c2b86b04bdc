use super::Tree;
use crate::libs::phylo::error::TreeError;
use crate::libs::phylo::node::{Node, NodeId};
use rand::Rng;
use std::collections::{HashMap, HashSet};

/// Sum two optional branch lengths. Absent only when both are absent.
pub fn add_lengths(a: Option<f64>, b: Option<f64>) -> Option<f64> {
    match (a, b) {
        (Some(x), Some(y)) => Some(x + y),
        (Some(x), None) => Some(x),
        (None, Some(y)) => Some(y),
        (None, None) => None,
    }
}

fn checked_sum(id: NodeId, a: Option<f64>, b: Option<f64>) -> Result<Option<f64>, TreeError> {
    let sum = add_lengths(a, b);
    match sum {
        Some(v) if !v.is_finite() => Err(TreeError::BadNumber(format!(
            "Summed branch length of node {} is not finite",
            id
        ))),
        _ => Ok(sum),
    }
}

fn position_of(tree: &Tree, parent: NodeId, id: NodeId) -> usize {
    tree.children_iter(parent)
        .position(|c| c == id)
        .unwrap_or_default()
}

/// Splice out an internal node: its children take its place under its
/// parent, each with the node's branch length added to its own.
///
/// Returns `Ok(false)` without touching anything at the root or a terminal.
pub fn collapse(tree: &mut Tree, id: NodeId) -> Result<bool, TreeError> {
    let (parent, length) = {
        let node = tree.member(id)?;
        if node.is_leaf() {
            return Ok(false);
        }
        match node.parent {
            Some(p) => (p, node.length),
            None => return Ok(false),
        }
    };

    let children = tree.children(id);
    let mut lengths = Vec::with_capacity(children.len());
    for &c in &children {
        lengths.push(checked_sum(c, length, tree[c].length)?);
    }

    let pos = position_of(tree, parent, id);
    for (i, (&c, len)) in children.iter().zip(lengths).enumerate() {
        tree.set_branch_length(c, len)?;
        tree.attach_child(parent, c, Some(pos + i))?;
    }
    tree.delete(id)?;

    Ok(true)
}

/// Insert a new unbranched node between `id` and its parent.
/// The new node has no branch length; `id` keeps its own.
///
/// # Example
/// ```
/// use phylokit::libs::phylo::tree::Tree;
/// let mut tree = Tree::from_newick("(A:1,B:2)R;").unwrap();
/// let a = tree.get_node_by_name("A").unwrap();
/// let new = tree.insert_node_below(a).unwrap();
/// assert_eq!(tree[a].parent(), Some(new));
/// assert_eq!(tree.to_newick(), "((A:1.000000),B:2.000000)R;");
/// ```
pub fn insert_node_below(tree: &mut Tree, id: NodeId) -> Result<NodeId, TreeError> {
    let parent = tree
        .member(id)?
        .parent
        .ok_or_else(|| TreeError::precondition(format!("Node {} is the root", id)))?;

    let pos = position_of(tree, parent, id);
    let new = tree.add_node();
    tree.attach_child(parent, new, Some(pos))?;
    tree.attach_child(new, id, None)?;

    Ok(new)
}

/// Root the tree on the edge above `id`, returning the new root.
///
/// The new root splits the edge between `id` and its parent. Every edge on
/// the path up to the old root is reversed, each keeping its length. An old
/// root left unbranched is spliced out afterwards.
///
/// When the parent of `id` already is the root nothing changes and the
/// current root is returned.
pub fn reroot_below(tree: &mut Tree, id: NodeId, name: Option<&str>) -> Result<NodeId, TreeError> {
    let parent = tree
        .member(id)?
        .parent
        .ok_or_else(|| TreeError::precondition(format!("Cannot reroot below the root {}", id)))?;
    if tree[parent].parent.is_none() {
        return Ok(parent);
    }

    let new = insert_node_below(tree, id)?;
    if let Some(name) = name {
        tree[new].set_name(name);
    }

    // new -> parent -> ... -> old_root
    let mut chain = vec![new];
    chain.extend(tree.ancestors(new).unwrap_or_default());
    let lengths: Vec<Option<f64>> = chain.iter().map(|&n| tree[n].length).collect();
    let old_root = chain[chain.len() - 1];

    tree.detach_child(chain[1], new)?;
    for i in 1..chain.len() {
        tree.attach_child(chain[i - 1], chain[i], None)?;
        tree.set_branch_length(chain[i], lengths[i - 1])?;
    }
    tree.set_branch_length(new, None)?;

    match tree.children_iter(old_root).count() {
        0 => {
            tree.delete(old_root)?;
        }
        1 => {
            collapse(tree, old_root)?;
        }
        _ => {}
    }
    log::debug!("Rerooted below node {}, new root {}", id, new);

    Ok(new)
}

/// Turn every polytomy into a random binary resolution.
///
/// While a node has more than two children a zero-length node is appended
/// under it and two of its previous children are moved under that node.
/// Returns the number of nodes added.
pub fn resolve_polytomies<R: Rng + ?Sized>(tree: &mut Tree, rng: &mut R) -> Result<usize, TreeError> {
    let mut added = 0;
    for id in tree.internals() {
        loop {
            let children = tree.children(id);
            let n = children.len();
            if n <= 2 {
                break;
            }

            let new = tree.add_node();
            tree.set_branch_length(new, Some(0.0))?;
            tree.attach_child(id, new, None)?;

            let i = rng.gen_range(0..n);
            let mut j = rng.gen_range(0..n - 1);
            if j >= i {
                j += 1;
            }
            tree.attach_child(new, children[i], None)?;
            tree.attach_child(new, children[j], None)?;
            added += 1;
        }
    }
    log::debug!("Resolved polytomies with {} new nodes", added);

    Ok(added)
}

/// Remove terminals named in `names`, then the internals left without
/// children, then unbranched internals. Returns the number of terminals removed.
pub fn prune_tips(tree: &mut Tree, names: &[&str]) -> Result<usize, TreeError> {
    let set: HashSet<&str> = names.iter().copied().collect();
    let targets: Vec<NodeId> = tree
        .terminals()
        .into_iter()
        .filter(|&id| {
            tree[id]
                .name
                .as_deref()
                .map(|n| set.contains(n))
                .unwrap_or(false)
        })
        .collect();
    prune_clades(tree, &targets)
}

/// Keep only the terminals named in `names`; unnamed terminals go as well.
pub fn keep_tips(tree: &mut Tree, names: &[&str]) -> Result<usize, TreeError> {
    let set: HashSet<&str> = names.iter().copied().collect();
    let targets: Vec<NodeId> = tree
        .terminals()
        .into_iter()
        .filter(|&id| {
            tree[id]
                .name
                .as_deref()
                .map(|n| !set.contains(n))
                .unwrap_or(true)
        })
        .collect();
    prune_clades(tree, &targets)
}

/// Remove every node in `ids` with its whole subtree, then the ancestors left
/// without children, then unbranched internals. Ids already gone with an
/// earlier clade are skipped. Returns the number of clades removed.
pub fn prune_clades(tree: &mut Tree, ids: &[NodeId]) -> Result<usize, TreeError> {
    let mut removed = 0;
    for &clade in ids {
        if !tree.contains(clade) {
            continue;
        }
        let parent = tree[clade].parent;
        remove_subtree(tree, clade)?;

        let mut current = parent.filter(|&p| tree[p].is_leaf());
        while let Some(id) = current {
            let up = tree[id].parent;
            tree.delete(id)?;
            current = up.filter(|&p| tree[p].is_leaf());
        }
        removed += 1;
    }
    let spliced = remove_unbranched_internals(tree)?;
    log::debug!(
        "Pruned {} clades, spliced {} unbranched nodes",
        removed,
        spliced
    );

    Ok(removed)
}

/// Splice out every internal node with exactly one child, the root included.
/// Returns the number of nodes removed.
pub fn remove_unbranched_internals(tree: &mut Tree) -> Result<usize, TreeError> {
    let mut removed = 0;
    loop {
        let unbranched: Vec<NodeId> = tree
            .internals()
            .into_iter()
            .filter(|&id| tree.children_iter(id).count() == 1)
            .collect();
        if unbranched.is_empty() {
            break;
        }

        for id in unbranched {
            if tree[id].parent.is_some() {
                collapse(tree, id)?;
            } else {
                // The only child takes over as root
                let Some(child) = tree[id].first_child else {
                    continue;
                };
                let len = checked_sum(child, tree[id].length, tree[child].length)?;
                tree.detach_child(id, child)?;
                tree.set_branch_length(child, len)?;
                tree.delete(id)?;
            }
            removed += 1;
        }
    }

    Ok(removed)
}

/// Remove `id` and its whole subtree. Returns the number of nodes removed.
pub fn remove_subtree(tree: &mut Tree, id: NodeId) -> Result<usize, TreeError> {
    tree.member(id)?;
    let doomed = tree.postorder(id);
    for &n in &doomed {
        tree.delete(n)?;
    }

    Ok(doomed.len())
}

fn copy_payload(src: &Node, dst: &mut Node) {
    dst.name = src.name.clone();
    dst.length = src.length;
    dst.score = src.score;
    dst.description = src.description.clone();
    dst.properties = src.properties.clone();
    dst.taxon = src.taxon.clone();
}

/// Copy the subtree of `source` rooted at `source_root` into `tree`, under
/// `parent` (appended) or as the root of an empty tree.
/// Returns the id of the copied root.
pub fn graft(
    tree: &mut Tree,
    parent: Option<NodeId>,
    source: &Tree,
    source_root: NodeId,
) -> Result<NodeId, TreeError> {
    source.member(source_root)?;
    match parent {
        Some(p) => {
            tree.member(p)?;
        }
        None if !tree.is_empty() => {
            return Err(TreeError::precondition(
                "Grafting without a parent needs an empty tree",
            ));
        }
        None => {}
    }

    let mut mapping: HashMap<NodeId, NodeId> = HashMap::new();
    for src in source.preorder(source_root) {
        let new = tree.add_node();
        copy_payload(&source[src], &mut tree[new]);

        let target = if src == source_root {
            parent
        } else {
            source[src].parent.and_then(|p| mapping.get(&p).copied())
        };
        if let Some(t) = target {
            tree.attach_child(t, new, None)?;
        }
        mapping.insert(src, new);
    }

    mapping
        .get(&source_root)
        .copied()
        .ok_or_else(|| TreeError::precondition("Nothing was grafted"))
}

/// Extract the subtree rooted at `root_id` into a new Tree.
pub fn extract_subtree(tree: &Tree, root_id: NodeId) -> Result<Tree, TreeError> {
    let mut new_tree = Tree::new();
    graft(&mut new_tree, None, tree, root_id)?;
    Ok(new_tree)
}

#[cfg(test)]
mod tests {
    use super::super::tests::check_invariants;
    use super::*;
    use approx::assert_relative_eq;

    fn id(tree: &Tree, name: &str) -> NodeId {
        tree.get_node_by_name(name).unwrap()
    }

    #[test]
    fn test_add_lengths() {
        assert_eq!(add_lengths(None, None), None);
        assert_eq!(add_lengths(Some(1.0), None), Some(1.0));
        assert_eq!(add_lengths(None, Some(0.0)), Some(0.0));
        assert_eq!(add_lengths(Some(1.0), Some(2.5)), Some(3.5));
    }

    #[test]
    fn test_collapse() {
        let mut tree = Tree::from_newick("((A:1,B:2)X:3,C:4)R;").unwrap();
        let x = id(&tree, "X");
        let n = tree.len();

        assert!(tree.collapse(x).unwrap());
        assert_eq!(tree.len(), n - 1);
        assert!(tree.get_node(x).is_none());
        check_invariants(&tree, true).unwrap();

        let r = id(&tree, "R");
        let names: Vec<String> = tree
            .children(r)
            .iter()
            .map(|&c| tree[c].internal_name())
            .collect();
        assert_eq!(names, vec!["A", "B", "C"]);
        assert_eq!(tree[id(&tree, "A")].length(), Some(4.0));
        assert_eq!(tree[id(&tree, "B")].length(), Some(5.0));
    }

    #[test]
    fn test_collapse_noop() {
        let mut tree = Tree::from_newick("((A,B)X,C)R;").unwrap();
        let rev = tree.revision();
        assert!(!tree.collapse(id(&tree, "R")).unwrap());
        assert!(!tree.collapse(id(&tree, "A")).unwrap());
        assert_eq!(tree.revision(), rev);

        // Absent lengths stay absent
        assert!(tree.collapse(id(&tree, "X")).unwrap());
        assert_eq!(tree[id(&tree, "A")].length(), None);
    }

    #[test]
    fn test_insert_node_below() {
        let mut tree = Tree::from_newick("(A:1,B:2)R;").unwrap();
        let r = id(&tree, "R");
        assert!(matches!(
            tree.insert_node_below(r),
            Err(TreeError::StructuralPrecondition(_))
        ));

        let b = id(&tree, "B");
        let new = tree.insert_node_below(b).unwrap();
        assert_eq!(tree.children(r)[1], new);
        assert_eq!(tree.children(new), vec![b]);
        assert_eq!(tree[new].length(), None);
        assert_eq!(tree[b].length(), Some(2.0));
        check_invariants(&tree, true).unwrap();
    }

    fn leaf_distances(tree: &Tree) -> Vec<(String, String, f64)> {
        let mut tips: Vec<NodeId> = tree.terminals();
        tips.sort_by_key(|&t| tree[t].internal_name());
        let mut out = vec![];
        for (i, &a) in tips.iter().enumerate() {
            for &b in &tips[i + 1..] {
                out.push((
                    tree[a].internal_name(),
                    tree[b].internal_name(),
                    tree.patristic_distance(a, b).unwrap(),
                ));
            }
        }
        out
    }

    #[test]
    fn test_reroot_grandchild() {
        let mut tree = Tree::from_newick("((A:1,B:2)X:3,C:4)R;").unwrap();
        let before = leaf_distances(&tree);

        let a = id(&tree, "A");
        let new = tree.reroot_below(a, Some("N")).unwrap();
        check_invariants(&tree, true).unwrap();

        assert_eq!(tree.get_root(), Some(new));
        assert!(tree.get_node_by_name("R").is_none());
        assert_eq!(
            tree.to_newick(),
            "(A:1.000000,(B:2.000000,C:7.000000)X)N;"
        );

        let after = leaf_distances(&tree);
        for (x, y) in before.iter().zip(after.iter()) {
            assert_eq!(x.0, y.0);
            assert_eq!(x.1, y.1);
            assert_relative_eq!(x.2, y.2);
        }
    }

    #[test]
    fn test_reroot_deep_path() {
        let mut tree = Tree::from_newick("(((A:1,B:1)X:1,C:2)Y:1,D:3)R;").unwrap();
        let before = leaf_distances(&tree);
        let n = tree.len();

        let b = id(&tree, "B");
        let new = tree.reroot_below(b, None).unwrap();
        check_invariants(&tree, true).unwrap();
        assert_eq!(tree.get_root(), Some(new));
        // One node added, the unbranched old root spliced out
        assert_eq!(tree.len(), n);

        let after = leaf_distances(&tree);
        for (x, y) in before.iter().zip(after.iter()) {
            assert_relative_eq!(x.2, y.2);
        }

        // Second call is a no-op now that B hangs off the root
        let rev = tree.revision();
        assert_eq!(tree.reroot_below(b, None).unwrap(), new);
        assert_eq!(tree.revision(), rev);
    }

    type Triple = (Option<String>, Option<String>, Option<f64>);

    // (node, parent, branch length) of every member, sorted by names
    fn triples(tree: &Tree) -> Vec<Triple> {
        let mut all: Vec<Triple> = tree
            .nodes()
            .map(|n| {
                let node = &tree[n];
                let parent = node.parent().and_then(|p| tree[p].name.clone());
                (node.name.clone(), parent, node.length())
            })
            .collect();
        all.sort_by(|a, b| (&a.0, &a.1).cmp(&(&b.0, &b.1)));
        all
    }

    #[test]
    fn test_reroot_twice_keeps_triples() {
        let mut tree = Tree::from_newick("(((A:1,B:1)X:1,C:2)Y:1,D:3)R;").unwrap();
        let b = id(&tree, "B");
        let s = |name: &str| Some(name.to_string());

        let new = tree.reroot_below(b, None).unwrap();
        let once = triples(&tree);
        // The unnamed new root, the reversed path X-Y, R spliced into D
        let expected: Vec<Triple> = vec![
            (None, None, None),
            (s("A"), s("X"), Some(1.0)),
            (s("B"), None, Some(1.0)),
            (s("C"), s("Y"), Some(2.0)),
            (s("D"), s("Y"), Some(4.0)),
            (s("X"), None, None),
            (s("Y"), s("X"), Some(1.0)),
        ];
        assert_eq!(once, expected);
        assert_eq!(
            tree.to_newick(),
            "(B:1.000000,(A:1.000000,(C:2.000000,D:4.000000)Y:1.000000)X);"
        );

        // B now hangs off the root, so rerooting below it again changes nothing
        assert_eq!(tree.reroot_below(b, None).unwrap(), new);
        assert_eq!(triples(&tree), once);
        check_invariants(&tree, true).unwrap();
    }

    #[test]
    fn test_reroot_errors() {
        let mut tree = Tree::from_newick("((A,B)X,C)R;").unwrap();
        let r = id(&tree, "R");
        assert!(matches!(
            tree.reroot_below(r, None),
            Err(TreeError::StructuralPrecondition(_))
        ));

        // Parent already the root
        let x = id(&tree, "X");
        assert_eq!(tree.reroot_below(x, None).unwrap(), r);
    }

    #[test]
    fn test_remove_unbranched_internals() {
        let mut tree = Tree::from_newick("(((A:1)X:2,B:1)Y:1)R;").unwrap();
        assert_eq!(tree.remove_unbranched_internals().unwrap(), 2);
        check_invariants(&tree, true).unwrap();

        assert_eq!(tree.get_root(), Some(id(&tree, "Y")));
        assert_eq!(tree[id(&tree, "A")].length(), Some(3.0));
        assert_eq!(tree.to_newick(), "(A:3.000000,B:1.000000)Y:1.000000;");
    }

    #[test]
    fn test_prune_and_keep() {
        let mut tree = Tree::from_newick("((A:1,B:2)X:3,(C:1,D:1)Y:1)R;").unwrap();
        assert_eq!(tree.prune_tips(&["A", "Z"]).unwrap(), 1);
        check_invariants(&tree, true).unwrap();
        assert_eq!(tree[id(&tree, "B")].length(), Some(5.0));
        assert!(tree.get_node_by_name("X").is_none());

        let mut tree = Tree::from_newick("((A:1,B:2)X:3,(C:1,D:1)Y:1)R;").unwrap();
        assert_eq!(tree.keep_tips(&["A", "B"]).unwrap(), 2);
        check_invariants(&tree, true).unwrap();
        // Y is gone, X is the only child left and takes over as root
        assert_eq!(tree.get_root(), Some(id(&tree, "X")));
        assert_eq!(tree.terminals().len(), 2);
    }

    #[test]
    fn test_prune_clades() {
        let mut tree = Tree::from_newick("(((A:1,B:1)X:1,C:2)Y:1,(D:1,E:1)Z:2)R;").unwrap();
        let x = id(&tree, "X");
        let a = id(&tree, "A");
        let d = id(&tree, "D");

        // A goes with X and is skipped
        assert_eq!(tree.prune_clades(&[x, a, d]).unwrap(), 2);
        check_invariants(&tree, true).unwrap();
        assert_eq!(tree.to_newick(), "(C:3.000000,E:3.000000)R;");

        // Emptying a clade removes the parents left childless
        let mut tree = Tree::from_newick("((A,B)X,C)R;").unwrap();
        let a = id(&tree, "A");
        let b = id(&tree, "B");
        tree.prune_clades(&[a, b]).unwrap();
        assert_eq!(tree.to_newick(), "C;");
    }

    #[test]
    fn test_resolve_polytomies() {
        use rand::rngs::SmallRng;
        use rand::SeedableRng;

        let mut rng = SmallRng::seed_from_u64(42);
        let mut tree = Tree::from_newick("(A:1,B:2,C:3,(D:1,E:1,F:1,G:1)X:1)R;").unwrap();
        let length = tree.tree_length();
        let heights: Vec<f64> = ["A", "B", "C", "D", "E", "F", "G"]
            .iter()
            .map(|n| tree.path_to_root(id(&tree, n)))
            .collect();

        let added = tree.resolve_polytomies(&mut rng).unwrap();
        check_invariants(&tree, true).unwrap();
        assert_eq!(added, 4);
        assert!(tree.is_binary());
        assert_relative_eq!(tree.tree_length(), length);
        for (i, n) in ["A", "B", "C", "D", "E", "F", "G"].iter().enumerate() {
            assert_relative_eq!(tree.path_to_root(id(&tree, n)), heights[i]);
        }
    }

    #[test]
    fn test_remove_subtree() {
        let mut tree = Tree::from_newick("((A,B)X,C)R;").unwrap();
        let x = id(&tree, "X");
        assert_eq!(tree.remove_subtree(x).unwrap(), 3);
        assert_eq!(tree.len(), 2);
        assert_eq!(tree.to_newick(), "(C)R;");
        check_invariants(&tree, true).unwrap();
    }

    #[test]
    fn test_graft_and_extract() {
        let source = Tree::from_newick("((A:1,B:2)X:3,C:4)R;").unwrap();
        let x = id(&source, "X");

        let sub = source.extract_subtree(x).unwrap();
        assert_eq!(sub.len(), 3);
        assert_eq!(sub.to_newick(), "(A:1.000000,B:2.000000)X:3.000000;");
        check_invariants(&sub, true).unwrap();

        let mut target = Tree::from_newick("(D,E)S;").unwrap();
        let e = id(&target, "E");
        let copied = target.graft(Some(e), &source, x).unwrap();
        assert_eq!(target[copied].parent(), Some(e));
        assert_eq!(target.to_newick(), "(D,((A:1.000000,B:2.000000)X:3.000000)E)S;");
        check_invariants(&target, true).unwrap();

        // The source is untouched
        assert_eq!(source.len(), 5);

        assert!(target.graft(None, &source, x).is_err());
    }
}
