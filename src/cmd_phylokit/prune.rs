use super::utils as pku;
use clap::*;
use phylokit::libs::phylo::node::NodeId;
use phylokit::libs::phylo::tree::Tree;
use std::collections::BTreeSet;

// Create clap subcommand arguments
pub fn make_subcommand() -> Command {
    let cmd = Command::new("prune")
        .about("Remove nodes from the Newick file")
        .after_help(
            r###"
This tool removes nodes from the Newick tree based on provided labels or patterns.

Notes:
* Target nodes can be specified by name (`--node`), file (`--file`), or regex (`--regex`).
* A matched internal node is removed together with its whole clade.
* With `--invert`, the matched nodes with their ancestors and descendants
  are kept, and every other terminal is removed.
* Topology changes:
    * Internal nodes that lose all children are also removed.
    * A node left with only one child is spliced out and its branch length
      is added to the child's.

Examples:
1. Remove specific nodes by name:
   $ phylokit prune input.nwk -n Homo -n Pan

2. Remove nodes using a list in a file:
   $ phylokit prune input.nwk -f remove.txt

3. Keep a clade (e.g., Hominidae) and remove everything else:
   $ phylokit prune input.nwk --invert -n Hominidae

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
            Arg::new("invert")
                .long("invert")
                .short('x')
                .action(ArgAction::SetTrue)
                .help("Invert pruning: keep matched nodes, their ancestors and descendants"),
        )
        .arg(
            Arg::new("outfile")
                .short('o')
                .long("outfile")
                .num_args(1)
                .default_value("stdout")
                .help("Output filename. [stdout] for screen"),
        );
    pku::add_newick_args(pku::add_name_args(cmd))
}

// command implementation
pub fn execute(args: &ArgMatches) -> anyhow::Result<()> {
    let mut writer = intspan::writer(args.get_one::<String>("outfile").unwrap());
    let infile = args.get_one::<String>("infile").unwrap();
    let is_invert = args.get_flag("invert");
    let options = pku::newick_options(args)?;

    for mut tree in Tree::from_file(infile)? {
        let ids = pku::match_names(&tree, args)?;

        let targets: Vec<NodeId> = if is_invert {
            // Terminals inside a matched clade survive
            let kept: BTreeSet<NodeId> = ids
                .iter()
                .flat_map(|&id| tree.preorder(id))
                .filter(|&id| tree[id].is_leaf())
                .collect();
            tree.terminals()
                .into_iter()
                .filter(|id| !kept.contains(id))
                .collect()
        } else {
            ids.into_iter().collect()
        };

        let removed = tree.prune_clades(&targets)?;
        log::info!("Removed {} clades", removed);

        pku::write_tree(&mut writer, &tree, &options)?;
    }

    Ok(())
}
