//! Whole-tree shape statistics and per-terminal diversity allocations.
//!
//! Everything here works on the part of the tree reachable from the root.
//! Absent branch lengths count as zero and the root's own branch length is
//! never part of a statistic.

use super::query::terminals_under;
use super::Tree;
use crate::libs::phylo::error::TreeError;
use crate::libs::phylo::node::NodeId;
use indexmap::IndexMap;
use std::collections::{HashMap, HashSet, VecDeque};

fn len(tree: &Tree, id: NodeId) -> f64 {
    tree[id].length.unwrap_or(0.0)
}

/// Nodes below the root in preorder, each standing for the edge above it.
fn edges(tree: &Tree) -> Vec<NodeId> {
    match tree.get_root() {
        Some(root) => tree.preorder(root).into_iter().skip(1).collect(),
        None => Vec::new(),
    }
}

/// Terminal count below every node reachable from the root.
pub fn count_terminals(tree: &Tree) -> HashMap<NodeId, usize> {
    let mut counts = HashMap::new();
    if let Some(root) = tree.get_root() {
        for id in tree.postorder(root) {
            let n = if tree[id].is_leaf() {
                1
            } else {
                tree.children_iter(id)
                    .map(|c| counts.get(&c).copied().unwrap_or(0))
                    .sum()
            };
            counts.insert(id, n);
        }
    }
    counts
}

/// Sum of all branch lengths.
pub fn tree_length(tree: &Tree) -> f64 {
    edges(tree).into_iter().map(|id| len(tree, id)).sum()
}

/// Average root-to-tip path length.
pub fn tree_height(tree: &Tree) -> f64 {
    let tips = tree.terminals();
    if tips.is_empty() {
        return 0.0;
    }
    let total: f64 = tips.iter().map(|&t| tree.path_to_root(t)).sum();
    total / tips.len() as f64
}

/// Internal node count divided by (terminal count - 1); 1.0 when fully resolved.
pub fn resolution(tree: &Tree) -> Result<f64, TreeError> {
    let tips = tree.terminals().len();
    if tips < 2 {
        return Err(TreeError::precondition(
            "Resolution needs at least two terminals",
        ));
    }
    Ok(tree.internals().len() as f64 / (tips - 1) as f64)
}

/// All root-to-tip paths agree within `margin` of each other, as ratios.
/// A margin of zero asks for exact equality.
pub fn is_ultrametric(tree: &Tree, margin: f64) -> bool {
    let paths: Vec<f64> = tree
        .terminals()
        .iter()
        .map(|&t| tree.path_to_root(t))
        .collect();

    for (k, &i) in paths.iter().enumerate() {
        for &j in &paths[k + 1..] {
            let ok = if margin == 0.0 {
                i == j
            } else if j == 0.0 {
                i == 0.0
            } else {
                (1.0 - i / j).abs() <= margin
            };
            if !ok {
                return false;
            }
        }
    }
    true
}

/// Check if tree is binary (all internal nodes have exactly 2 children).
pub fn is_binary(tree: &Tree) -> bool {
    tree.internals()
        .into_iter()
        .all(|id| tree.children_iter(id).count() == 2)
}

fn require_binary(tree: &Tree, what: &str) -> Result<(), TreeError> {
    if is_binary(tree) {
        Ok(())
    } else {
        Err(TreeError::precondition(format!(
            "{} needs a binary tree",
            what
        )))
    }
}

// Terminal counts under the two children of every internal node
fn splits(tree: &Tree) -> Vec<(usize, usize)> {
    let counts = tree.terminal_counts();
    tree.internals()
        .into_iter()
        .filter_map(|id| {
            let left = tree[id].first_child?;
            let right = tree[id].last_child?;
            Some((counts[&left], counts[&right]))
        })
        .collect()
}

/// Colless' imbalance, normalised to 0 for a balanced and 1 for a
/// caterpillar tree.
pub fn colless_imbalance(tree: &Tree) -> Result<f64, TreeError> {
    require_binary(tree, "Colless imbalance")?;
    let n = tree.terminals().len();
    if n <= 2 {
        return Ok(0.0);
    }

    let sum: usize = splits(tree).into_iter().map(|(l, r)| l.abs_diff(r)).sum();
    let max = ((n - 1) * (n - 2)) as f64 / 2.0;
    Ok(sum as f64 / max)
}

/// I2 imbalance (Mooers & Heard).
pub fn i2_imbalance(tree: &Tree) -> Result<f64, TreeError> {
    require_binary(tree, "I2 imbalance")?;
    let n = tree.terminals().len();
    if n <= 2 {
        return Ok(0.0);
    }

    let sum: f64 = splits(tree)
        .into_iter()
        .filter(|&(l, r)| l + r != 2)
        .map(|(l, r)| l.abs_diff(r) as f64 / (l + r - 2) as f64)
        .sum();
    Ok(sum / (n - 2) as f64)
}

fn stem_nodes(tree: &Tree) -> Result<(Vec<NodeId>, usize), TreeError> {
    let internals = tree.internals();
    let stems: Vec<NodeId> = internals
        .iter()
        .copied()
        .filter(|&id| tree[id].parent.is_some())
        .collect();
    if stems.is_empty() {
        return Err(TreeError::precondition(
            "Stemminess needs an internal node below the root",
        ));
    }
    Ok((stems, internals.len() - 1))
}

/// Fiala and Sokal's stemminess.
pub fn fiala_stemminess(tree: &Tree) -> Result<f64, TreeError> {
    let (stems, denom) = stem_nodes(tree)?;

    let mut sum = 0.0;
    for id in stems {
        let own = len(tree, id);
        let below: f64 = tree.descendants(id).into_iter().map(|d| len(tree, d)).sum();
        let total = own + below;
        if total == 0.0 {
            return Err(TreeError::precondition(format!(
                "Subtree of node {} has no branch length",
                id
            )));
        }
        sum += own / total;
    }
    Ok(sum / denom as f64)
}

/// Rohlf's stemminess. Only defined for (nearly) ultrametric trees.
pub fn rohlf_stemminess(tree: &Tree) -> Result<f64, TreeError> {
    if !is_ultrametric(tree, 0.01) {
        return Err(TreeError::precondition(
            "Rohlf stemminess needs an ultrametric tree",
        ));
    }
    let (stems, denom) = stem_nodes(tree)?;

    let mut sum = 0.0;
    for id in stems {
        let Some(parent) = tree[id].parent else {
            continue;
        };
        let crown = tree.min_path_to_tips(parent);
        if crown == 0.0 {
            return Err(TreeError::precondition(format!(
                "Node {} has a zero crown height",
                parent
            )));
        }
        sum += len(tree, id) / crown;
    }
    Ok(sum / denom as f64)
}

/// Pybus and Harvey's gamma statistic.
///
/// Node times are the root distances of the internal nodes plus the height
/// of the furthest tip; ties are kept.
pub fn gamma(tree: &Tree) -> Result<f64, TreeError> {
    let mut times: Vec<f64> = tree
        .internals()
        .into_iter()
        .map(|id| tree.path_to_root(id))
        .collect();
    let height = tree
        .terminals()
        .into_iter()
        .map(|t| tree.path_to_root(t))
        .fold(0.0, f64::max);
    times.push(height);
    times.sort_by(|a, b| a.total_cmp(b));

    // intervals[i] is spent with i + 2 lineages
    let intervals: Vec<f64> = times.windows(2).map(|w| w[1] - w[0]).collect();
    let n = intervals.len() + 1;
    if n < 3 {
        return Err(TreeError::precondition("Gamma needs at least three terminals"));
    }

    let weighted: Vec<f64> = intervals
        .iter()
        .enumerate()
        .map(|(i, g)| (i + 2) as f64 * g)
        .collect();
    let big_t: f64 = weighted.iter().sum();
    if big_t <= 0.0 {
        return Err(TreeError::precondition("Gamma needs a positive tree depth"));
    }

    let mut running = 0.0;
    let mut nested = 0.0;
    for w in &weighted[..n - 2] {
        running += w;
        nested += running;
    }

    let m = (n - 2) as f64;
    let num = nested / m - big_t / 2.0;
    let den = big_t * (1.0 / (12.0 * m)).sqrt();
    log::debug!("gamma: n = {}, T = {}", n, big_t);

    Ok(num / den)
}

/// Fair proportion: every branch length is shared evenly among the
/// terminals below it.
pub fn fair_proportion(tree: &Tree) -> IndexMap<NodeId, f64> {
    let counts = tree.terminal_counts();
    allocate(tree, |tree, tip| {
        let mut value = 0.0;
        let mut cur = tip;
        while let Some(parent) = tree[cur].parent {
            value += len(tree, cur) / counts[&cur] as f64;
            cur = parent;
        }
        value
    })
}

/// Equal splits: every branch length is divided evenly at each node on the
/// way down to a terminal.
pub fn equal_splits(tree: &Tree) -> IndexMap<NodeId, f64> {
    allocate(tree, |tree, tip| {
        let mut value = 0.0;
        let mut divisor = 1.0;
        let mut cur = tip;
        while let Some(parent) = tree[cur].parent {
            value += len(tree, cur) / divisor;
            divisor *= tree.children_iter(parent).count() as f64;
            cur = parent;
        }
        value
    })
}

/// Pendant edge: each terminal's own branch length.
pub fn pendant_edge(tree: &Tree) -> IndexMap<NodeId, f64> {
    allocate(tree, |tree, tip| len(tree, tip))
}

/// Shapley value (Haake, Kashiwada & Su).
///
/// The length of an edge with `k` of `n` terminals below it goes
/// `(n - k) / (n k)` to each terminal below and `k / (n (n - k))` to each
/// terminal outside.
pub fn shapley_value(tree: &Tree) -> IndexMap<NodeId, f64> {
    let counts = tree.terminal_counts();
    let mut values = allocate(tree, |_, _| 0.0);
    let n = values.len() as f64;

    for edge in edges(tree) {
        let k = counts[&edge] as f64;
        if k == n {
            continue;
        }
        let lambda = len(tree, edge);
        let below: HashSet<NodeId> = terminals_under(tree, edge).into_iter().collect();
        for (tip, value) in values.iter_mut() {
            *value += if below.contains(tip) {
                lambda * (n - k) / (n * k)
            } else {
                lambda * k / (n * (n - k))
            };
        }
    }
    values
}

fn allocate<F>(tree: &Tree, f: F) -> IndexMap<NodeId, f64>
where
    F: Fn(&Tree, NodeId) -> f64,
{
    tree.terminals()
        .into_iter()
        .map(|tip| (tip, f(tree, tip)))
        .collect()
}

/// Computes the Sackin index.
/// The Sackin index is the sum of depths of all leaves.
/// Smaller Sackin index means a more balanced tree.
pub fn sackin(tree: &Tree) -> usize {
    let root = match tree.get_root() {
        Some(r) => r,
        None => return 0,
    };

    let mut sum_depth = 0;
    let mut stack = vec![(root, 0)];

    while let Some((node_id, depth)) = stack.pop() {
        if tree[node_id].is_leaf() {
            sum_depth += depth;
        } else {
            for child in tree.children_iter(node_id) {
                stack.push((child, depth + 1));
            }
        }
    }
    sum_depth
}

/// Computes the number of cherries in a tree.
/// A cherry is a pair of leaves that share a common parent.
pub fn cherries(tree: &Tree) -> usize {
    tree.internals()
        .into_iter()
        .filter(|&id| {
            let children = tree.children(id);
            children.len() == 2 && children.iter().all(|&c| tree[c].is_leaf())
        })
        .count()
}

/// Calculate diameter (longest path between any two nodes).
pub fn diameter(tree: &Tree, weighted: bool) -> f64 {
    // Furthest node from the root, then the furthest node from that one
    let root = match tree.get_root() {
        Some(r) => r,
        None => return 0.0,
    };

    let get_furthest = |start: NodeId| -> (NodeId, f64) {
        let mut max_dist = 0.0;
        let mut furthest_node = start;
        let mut visited: HashMap<NodeId, f64> = HashMap::new();
        let mut queue = VecDeque::new();

        visited.insert(start, 0.0);
        queue.push_back((start, 0.0));

        while let Some((u, d)) = queue.pop_front() {
            if d > max_dist {
                max_dist = d;
                furthest_node = u;
            }

            // Neighbors: children + parent, with the edge stored on the lower node
            let mut neighbors: Vec<(NodeId, NodeId)> =
                tree.children_iter(u).map(|c| (c, c)).collect();
            if let Some(p) = tree[u].parent {
                neighbors.push((p, u));
            }

            for (v, lower) in neighbors {
                if visited.contains_key(&v) {
                    continue;
                }
                let weight = if weighted { len(tree, lower) } else { 1.0 };
                visited.insert(v, d + weight);
                queue.push_back((v, d + weight));
            }
        }
        (furthest_node, max_dist)
    };

    let (node_a, _) = get_furthest(root);
    let (_, diam) = get_furthest(node_a);
    diam
}

/// Find the node with the longest edge length.
pub fn get_node_with_longest_edge(tree: &Tree) -> Option<NodeId> {
    let mut max_len = f64::NEG_INFINITY;
    let mut max_node = None;

    for id in tree.nodes() {
        if let Some(len) = tree[id].length {
            if len > max_len {
                max_len = len;
                max_node = Some(id);
            }
        }
    }
    max_node
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn by_name(tree: &Tree, values: &IndexMap<NodeId, f64>) -> Vec<(String, f64)> {
        values
            .iter()
            .map(|(&id, &v)| (tree[id].internal_name(), v))
            .collect()
    }

    #[test]
    fn test_length_height_resolution() {
        let tree = Tree::from_newick("((A:1,B:2):3,C:4);").unwrap();
        assert_relative_eq!(tree.tree_length(), 10.0);
        assert_relative_eq!(tree.tree_height(), 13.0 / 3.0);
        assert_relative_eq!(tree.resolution().unwrap(), 1.0);

        let star = Tree::from_newick("(A,B,C);").unwrap();
        assert_relative_eq!(star.resolution().unwrap(), 0.5);
        assert!(!star.is_binary());
        assert!(!star.is_rooted());

        let single = Tree::from_newick("A;").unwrap();
        assert!(single.resolution().is_err());
    }

    #[test]
    fn test_ultrametric_margin() {
        let tree = Tree::from_newick("(A:10,B:10.05);").unwrap();
        assert!(tree.is_ultrametric(0.01));
        assert!(!tree.is_ultrametric(0.001));
        assert!(!tree.is_ultrametric(0.0));

        let exact = Tree::from_newick("((A:1,B:1):1,C:2);").unwrap();
        assert!(exact.is_ultrametric(0.0));
    }

    #[test]
    fn test_colless_and_i2() {
        let balanced = Tree::from_newick("((A,B),(C,D));").unwrap();
        assert_relative_eq!(balanced.colless_imbalance().unwrap(), 0.0);
        assert_relative_eq!(balanced.i2_imbalance().unwrap(), 0.0);

        let caterpillar = Tree::from_newick("(((A,B),C),D);").unwrap();
        assert_relative_eq!(caterpillar.colless_imbalance().unwrap(), 1.0);
        assert_relative_eq!(caterpillar.i2_imbalance().unwrap(), 1.0);

        let star = Tree::from_newick("(A,B,C);").unwrap();
        assert!(matches!(
            star.colless_imbalance(),
            Err(TreeError::StructuralPrecondition(_))
        ));
        assert!(star.i2_imbalance().is_err());
    }

    #[test]
    fn test_stemminess() {
        let tree = Tree::from_newick("((A:1,B:1)X:2,C:3)R;").unwrap();
        assert_relative_eq!(tree.fiala_stemminess().unwrap(), 0.5);
        assert_relative_eq!(tree.rohlf_stemminess().unwrap(), 2.0 / 3.0);

        let skewed = Tree::from_newick("((A:1,B:1)X:2,C:5)R;").unwrap();
        assert!(skewed.rohlf_stemminess().is_err());

        let cherry = Tree::from_newick("(A:1,B:1)R;").unwrap();
        assert!(cherry.fiala_stemminess().is_err());
    }

    #[test]
    fn test_gamma() {
        let tree = Tree::from_newick("(((A:1,B:1):1,C:2):1,D:3);").unwrap();
        assert_relative_eq!(tree.gamma().unwrap(), -0.544331, epsilon = 1e-6);

        let cherry = Tree::from_newick("(A:1,B:1);").unwrap();
        assert!(cherry.gamma().is_err());
    }

    #[test]
    fn test_fair_proportion_and_equal_splits() {
        let tree = Tree::from_newick("(((A:1,B:1)Y:2,C:1)X:4,D:1)R;").unwrap();

        let fp = by_name(&tree, &tree.fair_proportion());
        let names: Vec<&str> = fp.iter().map(|(n, _)| n.as_str()).collect();
        assert_eq!(names, vec!["A", "B", "C", "D"]);
        assert_relative_eq!(fp[0].1, 1.0 + 1.0 + 4.0 / 3.0);
        assert_relative_eq!(fp[2].1, 1.0 + 4.0 / 3.0);
        assert_relative_eq!(fp[3].1, 1.0);

        let es = by_name(&tree, &tree.equal_splits());
        assert_relative_eq!(es[0].1, 3.0);
        assert_relative_eq!(es[2].1, 3.0);

        let pe = by_name(&tree, &tree.pendant_edge());
        assert_relative_eq!(pe[2].1, 1.0);

        // Both allocate the whole tree length
        let total = tree.tree_length();
        assert_relative_eq!(fp.iter().map(|(_, v)| v).sum::<f64>(), total);
        assert_relative_eq!(es.iter().map(|(_, v)| v).sum::<f64>(), total);
    }

    #[test]
    fn test_shapley_value() {
        let tree = Tree::from_newick("((A:1,B:2)X:3,C:4)R;").unwrap();
        let sv = by_name(&tree, &tree.shapley_value());

        assert_relative_eq!(sv[0].1, 13.0 / 6.0);
        assert_relative_eq!(sv[1].1, 8.0 / 3.0);
        assert_relative_eq!(sv[2].1, 31.0 / 6.0);
        assert_relative_eq!(sv.iter().map(|(_, v)| v).sum::<f64>(), 10.0);
    }

    #[test]
    fn test_shape_counts() {
        let balanced = Tree::from_newick("((A,B),(C,D));").unwrap();
        assert_eq!(balanced.sackin(), 8);
        assert_eq!(balanced.cherries(), 2);

        let caterpillar = Tree::from_newick("(((A,B),C),D);").unwrap();
        assert_eq!(caterpillar.sackin(), 9);
        assert_eq!(caterpillar.cherries(), 1);
    }

    #[test]
    fn test_diameter_and_longest_edge() {
        let tree = Tree::from_newick("((A:1,B:2):3,C:4);").unwrap();
        assert_relative_eq!(tree.diameter(), 9.0);
        assert_relative_eq!(diameter(&tree, false), 3.0);
        assert_eq!(
            tree.get_node_with_longest_edge(),
            tree.get_node_by_name("C")
        );
    }

    #[test]
    fn test_wide_star_metrics() {
        let n = 30_000;
        let tips: Vec<String> = (0..n).map(|i| format!("t{}:1", i)).collect();
        let tree = Tree::from_newick(&format!("({})R;", tips.join(","))).unwrap();
        let root = tree.get_root().unwrap();

        assert_eq!(tree.terminal_counts()[&root], n);
        assert_eq!(tree.sackin(), n);
        assert_eq!(tree.cherries(), 0);
        assert_relative_eq!(tree.tree_length(), n as f64);

        let fp = tree.fair_proportion();
        assert_eq!(fp.len(), n);
        assert!(fp.values().all(|&v| v == 1.0));
    }

    #[test]
    fn test_terminal_counts_cached() {
        let mut tree = Tree::from_newick("((A,B)X,C)R;").unwrap();
        let counts = tree.terminal_counts();
        let x = tree.get_node_by_name("X").unwrap();
        assert_eq!(counts[&x], 2);
        assert!(std::rc::Rc::ptr_eq(&counts, &tree.terminal_counts()));

        let c = tree.get_node_by_name("C").unwrap();
        tree.add_child(x, c).unwrap();
        assert_eq!(tree.terminal_counts()[&x], 3);
    }
}
