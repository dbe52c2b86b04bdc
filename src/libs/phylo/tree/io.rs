use super::Tree;
use crate::libs::phylo::error::TreeError;
use crate::libs::phylo::node::{Node, NodeId};
use std::collections::HashMap;
use std::io::Read;
use std::str::FromStr;

/// Which text of a node becomes its Newick label.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum LabelMode {
    /// The node's own name
    #[default]
    Name,
    /// The name of the cross-referenced taxon
    Taxon,
    /// The name, falling back to one derived from the node id
    InternalName,
    /// The value of an annotation key
    Annotation(String),
}

/// Syntax of the annotation comment written after a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NhxDialect {
    /// `[&&NHX:key1=val1:key2=val2]`
    #[default]
    Nhx,
    /// `[%key1=val1,key2=val2]`
    Percent,
}

impl FromStr for NhxDialect {
    type Err = TreeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "nhx" => Ok(NhxDialect::Nhx),
            "percent" | "%" => Ok(NhxDialect::Percent),
            _ => Err(TreeError::precondition(format!(
                "Unknown annotation dialect: {}",
                s
            ))),
        }
    }
}

/// printf-like branch length formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LengthFormat {
    /// `%.Nf`
    Fixed(usize),
    /// `%.Ne`
    Scientific(usize),
    /// `%.Ng`: `N` significant digits, fixed or exponent notation by
    /// magnitude, trailing zeros dropped
    General(usize),
}

impl Default for LengthFormat {
    fn default() -> Self {
        LengthFormat::Fixed(6)
    }
}

impl LengthFormat {
    /// ```
    /// use phylokit::libs::phylo::tree::LengthFormat;
    /// assert_eq!(LengthFormat::Fixed(2).format(0.126), "0.13");
    /// assert_eq!(LengthFormat::Scientific(3).format(1234.0), "1.234e+03");
    /// assert_eq!(LengthFormat::General(6).format(0.1), "0.1");
    /// assert_eq!(LengthFormat::General(6).format(1e-7), "1e-07");
    /// ```
    pub fn format(&self, value: f64) -> String {
        match *self {
            LengthFormat::Fixed(p) => format!("{:.*}", p, value),
            LengthFormat::Scientific(p) => exponent_form(p, value, false),
            LengthFormat::General(p) => {
                let p = p.max(1);
                // Decimal exponent once rounded to `p` significant digits
                let exp = format!("{:.*e}", p - 1, value)
                    .split_once('e')
                    .and_then(|(_, e)| e.parse::<i64>().ok())
                    .unwrap_or(0);
                if exp < -4 || exp >= p as i64 {
                    exponent_form(p - 1, value, true)
                } else {
                    let fixed = format!("{:.*}", (p as i64 - 1 - exp) as usize, value);
                    trim_fraction(&fixed).to_string()
                }
            }
        }
    }
}

// printf-style exponent: at least two digits and always signed
fn exponent_form(precision: usize, value: f64, trim: bool) -> String {
    let s = format!("{:.*e}", precision, value);
    match s.split_once('e') {
        Some((mantissa, exp)) => {
            let (sign, digits) = match exp.strip_prefix('-') {
                Some(d) => ('-', d),
                None => ('+', exp),
            };
            let mantissa = if trim { trim_fraction(mantissa) } else { mantissa };
            format!("{}e{}{:0>2}", mantissa, sign, digits)
        }
        None => s,
    }
}

fn trim_fraction(s: &str) -> &str {
    if s.contains('.') {
        s.trim_end_matches('0').trim_end_matches('.')
    } else {
        s
    }
}

impl FromStr for LengthFormat {
    type Err = TreeError;

    /// Accepts `%.Nf`, `%.Ne`, `%.Ng`, and `%f`, `%e` or `%g` with six digits.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bad = || TreeError::BadNumber(format!("Unsupported length format: {}", s));

        let body = s.strip_prefix('%').ok_or_else(bad)?;
        let kind = body.chars().last().ok_or_else(bad)?;
        let precision = &body[..body.len() - kind.len_utf8()];
        let precision = match precision.strip_prefix('.') {
            Some(p) => p.parse::<usize>().map_err(|_| bad())?,
            None if precision.is_empty() => 6,
            None => return Err(bad()),
        };
        match kind {
            'f' => Ok(LengthFormat::Fixed(precision)),
            'e' => Ok(LengthFormat::Scientific(precision)),
            'g' => Ok(LengthFormat::General(precision)),
            _ => Err(bad()),
        }
    }
}

/// Options of the Newick writer.
///
/// The defaults write terminal names only, six-decimal branch lengths and no
/// annotation comments, all on one line.
#[derive(Debug, Clone, Default)]
pub struct NewickOptions {
    pub label: LabelMode,
    /// Label internal nodes too
    pub internal_labels: bool,
    /// Chosen labels found here are replaced by the mapped value
    pub translate: Option<HashMap<String, String>>,
    pub length_format: LengthFormat,
    /// Annotation keys written to the comment block, in this order
    pub nhx_keys: Vec<String>,
    pub dialect: NhxDialect,
    /// Indentation unit; empty for compact output
    pub indent: String,
}

impl NewickOptions {
    /// Label every node with its own name.
    pub fn all_labels() -> Self {
        Self {
            internal_labels: true,
            ..Default::default()
        }
    }
}

/// Read Newick trees from a file.
///
/// # Arguments
/// * `infile` - Path to the input file (or "stdin" for stdin).
pub fn from_file(infile: &str) -> anyhow::Result<Vec<Tree>> {
    let mut reader = intspan::reader(infile);
    let mut newick = String::new();
    reader
        .read_to_string(&mut newick)
        .map_err(|e| anyhow::anyhow!("Read error: {}", e))?;
    Ok(Tree::from_newick_multi(newick.as_str())?)
}

/// Serialize the tree with every node name and six-decimal lengths.
pub fn to_newick(tree: &Tree) -> String {
    to_newick_with(tree, &NewickOptions::all_labels())
}

/// Serialize the tree from its root. An empty tree gives `;`.
pub fn to_newick_with(tree: &Tree, options: &NewickOptions) -> String {
    match tree.get_root() {
        Some(root) => to_newick_subtree(tree, root, options),
        None => ";".to_string(),
    }
}

/// Serialize the subtree rooted at `root`.
pub fn to_newick_subtree(tree: &Tree, root: NodeId, options: &NewickOptions) -> String {
    if tree.get_node(root).is_none() {
        return ";".to_string();
    }
    let mut s = to_newick_recursive(tree, root, options, 0);
    s.push(';');
    s
}

fn to_newick_recursive(tree: &Tree, node_id: NodeId, options: &NewickOptions, depth: usize) -> String {
    let node = &tree[node_id];
    let is_pretty = !options.indent.is_empty();

    // Calculate current indentation string
    let my_indent = if is_pretty {
        options.indent.repeat(depth)
    } else {
        String::new()
    };

    // Format node info: Label + Length + Comment
    let mut node_info = String::new();

    if let Some(label) = choose_label(node, options) {
        node_info.push_str(&quote_label(&label));
    }

    if let Some(len) = node.length {
        node_info.push(':');
        node_info.push_str(&options.length_format.format(len));
    }

    node_info.push_str(&annotation_block(node, options));

    if node.is_leaf() {
        // Leaf: Indent + NodeInfo
        format!("{}{}", my_indent, node_info)
    } else {
        let children_strs: Vec<String> = tree
            .children_iter(node_id)
            .map(|child| to_newick_recursive(tree, child, options, depth + 1))
            .collect();

        if is_pretty {
            // (\n children \n)NodeInfo
            format!(
                "{}(\n{}\n{}){}",
                my_indent,
                children_strs.join(",\n"),
                my_indent,
                node_info
            )
        } else {
            format!("({}){}", children_strs.join(","), node_info)
        }
    }
}

fn choose_label(node: &Node, options: &NewickOptions) -> Option<String> {
    if !node.is_leaf() && !options.internal_labels {
        return None;
    }

    let label = match &options.label {
        LabelMode::Name => node.name.clone(),
        LabelMode::Taxon => node.taxon_name(),
        LabelMode::InternalName => Some(node.internal_name()),
        LabelMode::Annotation(key) => node.get_property(key).map(|v| v.to_string()),
    }?;

    match options.translate.as_ref().and_then(|t| t.get(&label)) {
        Some(mapped) => Some(mapped.clone()),
        None => Some(label),
    }
}

fn annotation_block(node: &Node, options: &NewickOptions) -> String {
    let pairs: Vec<String> = options
        .nhx_keys
        .iter()
        .filter_map(|k| {
            node.get_property(k).map(|v| {
                if v.is_empty() {
                    k.to_string()
                } else {
                    format!("{}={}", k, v)
                }
            })
        })
        .collect();

    if pairs.is_empty() {
        return String::new();
    }
    match options.dialect {
        NhxDialect::Nhx => format!("[&&NHX:{}]", pairs.join(":")),
        NhxDialect::Percent => format!("[%{}]", pairs.join(",")),
    }
}

fn quote_label(label: &str) -> String {
    let needs_quote = label.chars().any(|c| "(),:;[]' \t\n".contains(c));
    if needs_quote {
        format!("'{}'", label.replace('\'', "''"))
    } else {
        label.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::libs::phylo::node::Taxon;
    use std::rc::Rc;

    fn build() -> (Tree, NodeId, NodeId, NodeId) {
        let mut tree = Tree::new();
        //    Root
        //   /    \
        //  A:0.1  B:0.2
        let n0 = tree.add_node();
        let n1 = tree.add_node();
        let n2 = tree.add_node();

        tree.add_child(n0, n1).unwrap();
        tree.add_child(n0, n2).unwrap();

        tree[n0].set_name("Root");
        tree[n1].set_name("A");
        tree.set_branch_length(n1, Some(0.1)).unwrap();
        tree[n2].set_name("B");
        tree.set_branch_length(n2, Some(0.2)).unwrap();
        (tree, n0, n1, n2)
    }

    #[test]
    fn test_to_newick() {
        let (tree, ..) = build();

        assert_eq!(to_newick(&tree), "(A:0.100000,B:0.200000)Root;");

        // Internal labels are off by default
        let options = NewickOptions::default();
        assert_eq!(to_newick_with(&tree, &options), "(A:0.100000,B:0.200000);");

        // Pretty output
        let options = NewickOptions {
            indent: "  ".to_string(),
            length_format: LengthFormat::General(6),
            ..NewickOptions::all_labels()
        };
        let expected_pretty = "(\n  A:0.1,\n  B:0.2\n)Root;";
        assert_eq!(to_newick_with(&tree, &options), expected_pretty);
    }

    #[test]
    fn test_to_newick_complex() {
        let tree = Tree::from_newick("((A,B)I1,C)Root;").unwrap();

        // Pretty output with tab indentation
        let options = NewickOptions {
            indent: "\t".to_string(),
            ..NewickOptions::all_labels()
        };
        let expected = "(\n\t(\n\t\tA,\n\t\tB\n\t)I1,\n\tC\n)Root;";
        assert_eq!(to_newick_with(&tree, &options), expected);

        let i1 = tree.get_node_by_name("I1").unwrap();
        assert_eq!(
            to_newick_subtree(&tree, i1, &NewickOptions::all_labels()),
            "(A,B)I1;"
        );
    }

    #[test]
    fn test_to_newick_empty() {
        let tree = Tree::new();
        assert_eq!(to_newick(&tree), ";");
    }

    #[test]
    fn test_to_newick_special_chars() {
        let mut tree = Tree::new();
        let n0 = tree.add_node();
        tree[n0].set_name("Homo sapiens");
        assert_eq!(to_newick(&tree), "'Homo sapiens';");

        tree[n0].set_name("func(x)");
        assert_eq!(to_newick(&tree), "'func(x)';");

        tree[n0].set_name("O'Brien");
        assert_eq!(to_newick(&tree), "'O''Brien';");
    }

    #[test]
    fn test_to_newick_annotations() {
        let (mut tree, _, n1, _) = build();
        tree[n1].add_property("color", "red");
        tree[n1].add_property("S", "human");
        tree[n1].add_property("flag", "");

        let mut options = NewickOptions {
            nhx_keys: vec!["S".to_string(), "color".to_string(), "missing".to_string()],
            length_format: LengthFormat::Fixed(1),
            ..Default::default()
        };
        assert_eq!(
            to_newick_with(&tree, &options),
            "(A:0.1[&&NHX:S=human:color=red],B:0.2);"
        );

        options.dialect = NhxDialect::Percent;
        options.nhx_keys.push("flag".to_string());
        assert_eq!(
            to_newick_with(&tree, &options),
            "(A:0.1[%S=human,color=red,flag],B:0.2);"
        );
    }

    #[test]
    fn test_label_modes() {
        let (mut tree, n0, n1, n2) = build();
        let human = Rc::new(Taxon::new("Homo_sapiens"));
        tree[n1].taxon = Some(Rc::downgrade(&human));
        tree[n2].add_property("acc", "X123");

        let options = NewickOptions {
            label: LabelMode::Taxon,
            length_format: LengthFormat::Fixed(1),
            ..Default::default()
        };
        assert_eq!(to_newick_with(&tree, &options), "(Homo_sapiens:0.1,:0.2);");

        let options = NewickOptions {
            label: LabelMode::Annotation("acc".to_string()),
            length_format: LengthFormat::Fixed(1),
            ..Default::default()
        };
        assert_eq!(to_newick_with(&tree, &options), "(:0.1,X123:0.2);");

        tree[n0].name = None;
        let options = NewickOptions {
            label: LabelMode::InternalName,
            length_format: LengthFormat::Fixed(1),
            ..NewickOptions::all_labels()
        };
        assert_eq!(
            to_newick_with(&tree, &options),
            format!("(A:0.1,B:0.2)node{};", n0.index())
        );

        let translate: HashMap<String, String> =
            [("A".to_string(), "1".to_string())].into_iter().collect();
        let options = NewickOptions {
            translate: Some(translate),
            length_format: LengthFormat::Fixed(1),
            ..Default::default()
        };
        assert_eq!(to_newick_with(&tree, &options), "(1:0.1,B:0.2);");
    }

    #[test]
    fn test_length_format_parse() {
        assert_eq!("%.6f".parse::<LengthFormat>().unwrap(), LengthFormat::Fixed(6));
        assert_eq!("%.2e".parse::<LengthFormat>().unwrap(), LengthFormat::Scientific(2));
        assert_eq!("%f".parse::<LengthFormat>().unwrap(), LengthFormat::Fixed(6));
        assert_eq!("%g".parse::<LengthFormat>().unwrap(), LengthFormat::General(6));
        assert_eq!("%.3g".parse::<LengthFormat>().unwrap(), LengthFormat::General(3));
        assert!("%.xf".parse::<LengthFormat>().is_err());
        assert!("6f".parse::<LengthFormat>().is_err());
        assert!("%d".parse::<LengthFormat>().is_err());

        assert_eq!(LengthFormat::Scientific(2).format(0.00123), "1.23e-03");
        assert_eq!(LengthFormat::default().format(3.0), "3.000000");
    }

    #[test]
    fn test_length_format_general() {
        let g = LengthFormat::General(6);
        assert_eq!(g.format(0.0), "0");
        assert_eq!(g.format(2.0), "2");
        assert_eq!(g.format(1.5), "1.5");
        assert_eq!(g.format(-0.25), "-0.25");
        assert_eq!(g.format(100000.0), "100000");
        assert_eq!(g.format(0.0001), "0.0001");
        assert_eq!(g.format(1e-7), "1e-07");
        assert_eq!(g.format(0.00001234), "1.234e-05");
        assert_eq!(g.format(1234567.0), "1.23457e+06");
        assert_eq!(g.format(3.14159265), "3.14159");
        // Rounding can carry into the next power of ten
        assert_eq!(g.format(999999.7), "1e+06");

        assert_eq!(LengthFormat::General(2).format(0.126), "0.13");
        assert_eq!(LengthFormat::General(0).format(27.0), "3e+01");
    }

    #[test]
    fn test_round_trip() {
        let input = "((A:1.5,'B c':0.25)X:3,(C:1,D:2e-3)Y:0.5)R;";
        let tree = Tree::from_newick(input).unwrap();
        let output = to_newick(&tree);
        let back = Tree::from_newick(&output).unwrap();

        assert_eq!(back.len(), tree.len());
        assert_eq!(to_newick(&back), output);
        let d = back.get_node_by_name("D").unwrap();
        assert!((back[d].length().unwrap() - 0.002).abs() < 1e-9);
        assert!(back.get_node_by_name("B c").is_some());
    }
}
