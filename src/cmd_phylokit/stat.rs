use clap::*;
use phylokit::libs::phylo::error::TreeError;
use phylokit::libs::phylo::tree::Tree;
use std::io::Write;

// Create clap subcommand arguments
pub fn make_subcommand() -> Command {
    Command::new("stat")
        .about("Prints statistics about trees")
        .after_help(
            r###"
Prints topology and shape statistics of each tree in the input.

Input format:
* Newick trees filename or 'stdin'

Output format:
* Key-value pairs (TSV, default):
  Type	phylogram
  nodes	7
  leaves	4
  ...

* One row per tree (--style line), with a header line

Notes:
* Imbalance and stemminess need a binary tree, gamma an ultrametric one.
  They read `NA` when the tree does not qualify.
* Tree length and height ignore the root's own branch length.

Examples:
1. Default statistics:
   phylokit stat tree.nwk

2. One line per tree:
   phylokit stat trees.nwk --style line
"###,
        )
        .arg(
            Arg::new("infile")
                .required(true)
                .num_args(1)
                .index(1)
                .help("Input filename. [stdin] for standard input"),
        )
        .arg(
            Arg::new("outfile")
                .short('o')
                .long("outfile")
                .num_args(1)
                .default_value("stdout")
                .help("Output filename. [stdout] for screen"),
        )
        .arg(
            Arg::new("style")
                .long("style")
                .value_parser(["col", "line"])
                .default_value("col")
                .help("Output style. [col] for key-value pairs, [line] for TSV"),
        )
        .arg(
            Arg::new("margin")
                .long("margin")
                .num_args(1)
                .value_parser(value_parser!(f64))
                .default_value("0.001")
                .help("Relative tolerance of the ultrametric check"),
        )
}

fn metric(value: Result<f64, TreeError>) -> String {
    match value {
        Ok(v) => format!("{:.4}", v),
        Err(_) => "NA".to_string(),
    }
}

fn tree_type(tree: &Tree) -> &'static str {
    let n_node = tree.len();
    let n_edge_w_len = tree
        .nodes()
        .filter(|&id| tree[id].length().is_some())
        .count();

    if n_edge_w_len == 0 {
        "cladogram"
    } else if n_edge_w_len == n_node || n_edge_w_len + 1 == n_node {
        "phylogram"
    } else {
        "neither"
    }
}

fn collect(tree: &Tree, margin: f64) -> Vec<(&'static str, String)> {
    let mut n_leaf = 0;
    let mut n_dichotomies = 0;
    let mut n_leaf_label = 0;
    let mut n_internal_label = 0;

    for id in tree.nodes() {
        let node = &tree[id];
        if node.is_leaf() {
            n_leaf += 1;
        }
        if tree.children_iter(id).count() == 2 {
            n_dichotomies += 1;
        }
        if node.name.is_some() {
            if node.is_leaf() {
                n_leaf_label += 1;
            } else {
                n_internal_label += 1;
            }
        }
    }

    let ultrametric = tree.is_ultrametric(margin);
    let gamma = if ultrametric {
        tree.gamma()
    } else {
        Err(TreeError::StructuralPrecondition(
            "Gamma needs an ultrametric tree".to_string(),
        ))
    };

    vec![
        ("Type", tree_type(tree).to_string()),
        ("nodes", tree.len().to_string()),
        ("leaves", n_leaf.to_string()),
        ("dichotomies", n_dichotomies.to_string()),
        ("leaf labels", n_leaf_label.to_string()),
        ("internal labels", n_internal_label.to_string()),
        ("rooted", tree.is_rooted().to_string()),
        ("binary", tree.is_binary().to_string()),
        ("ultrametric", ultrametric.to_string()),
        ("length", format!("{:.4}", tree.tree_length())),
        ("height", format!("{:.4}", tree.tree_height())),
        ("diameter", format!("{:.4}", tree.diameter())),
        ("resolution", metric(tree.resolution())),
        ("sackin", tree.sackin().to_string()),
        ("cherries", tree.cherries().to_string()),
        ("colless", metric(tree.colless_imbalance())),
        ("i2", metric(tree.i2_imbalance())),
        ("fiala", metric(tree.fiala_stemminess())),
        ("rohlf", metric(tree.rohlf_stemminess())),
        ("gamma", metric(gamma)),
    ]
}

// command implementation
pub fn execute(args: &ArgMatches) -> anyhow::Result<()> {
    let mut writer = intspan::writer(args.get_one::<String>("outfile").unwrap());
    let infile = args.get_one::<String>("infile").unwrap();
    let style = args.get_one::<String>("style").unwrap();
    let margin = *args.get_one::<f64>("margin").unwrap();

    let trees = Tree::from_file(infile)?;

    for (i, tree) in trees.iter().enumerate() {
        let stats = collect(tree, margin);

        if style == "line" {
            if i == 0 {
                let header: Vec<&str> = stats.iter().map(|(k, _)| *k).collect();
                writer.write_fmt(format_args!("{}\n", header.join("\t")))?;
            }
            let values: Vec<&str> = stats.iter().map(|(_, v)| v.as_str()).collect();
            writer.write_fmt(format_args!("{}\n", values.join("\t")))?;
        } else {
            for (key, value) in &stats {
                writer.write_fmt(format_args!("{}\t{}\n", key, value))?;
            }
        }
    }

    Ok(())
}
