use super::utils as pku;
use clap::*;
use phylokit::libs::phylo::node::NodeId;
use phylokit::libs::phylo::tree::Tree;
use std::collections::BTreeSet;

// Create clap subcommand arguments
pub fn make_subcommand() -> Command {
    let cmd = Command::new("reroot")
        .about("Reroots trees on the edge above a node or the longest branch")
        .after_help(
            r###"
Places a new root on the edge above a target node.

Notes:
* Target selection:
    * Default: the node with the longest branch.
    * `--node`, `--file`, `--regex`: the most recent common ancestor of the
      matched nodes, which become the ingroup.
    * `--lax`: when that ancestor is already the root, use the common
      ancestor of the unmatched terminals instead.
* Every edge on the path back to the old root is reversed and keeps its length.
* The new root has no branch length. A target whose parent already is the
  root leaves the tree unchanged.
* An old root left with a single child is spliced out.

Examples:
1. Reroot on the longest branch:
   phylokit reroot tree.nwk

2. Put Homo and Pan on one side of the root:
   phylokit reroot tree.nwk -n Homo -n Pan

3. Name the new root:
   phylokit reroot tree.nwk -n Homo --name root
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
            Arg::new("lax")
                .long("lax")
                .short('l')
                .action(ArgAction::SetTrue)
                .help("Lax mode: Use the complement if the matched nodes span the root"),
        )
        .arg(
            Arg::new("name")
                .long("name")
                .num_args(1)
                .help("Name of the new root"),
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

// Common ancestor of the terminals outside the clades of `ids`
fn complement_ancestor(tree: &Tree, ids: &BTreeSet<NodeId>) -> anyhow::Result<Option<NodeId>> {
    let outside: BTreeSet<NodeId> = tree
        .terminals()
        .into_iter()
        .filter(|&tip| !ids.iter().any(|&id| tree.is_ancestor_of(id, tip) || id == tip))
        .collect();
    pku::common_ancestor(tree, &outside)
}

fn pick_target(tree: &Tree, args: &ArgMatches) -> anyhow::Result<Option<NodeId>> {
    if !pku::has_name_rules(args) {
        return Ok(tree.get_node_with_longest_edge());
    }

    let ids = pku::match_names(tree, args)?;
    let mut target = pku::common_ancestor(tree, &ids)?;

    if target.is_some() && target == tree.get_root() && args.get_flag("lax") {
        if let Some(other) = complement_ancestor(tree, &ids)? {
            log::info!("Matched nodes span the root, using their complement");
            target = Some(other);
        }
    }
    Ok(target)
}

// command implementation
pub fn execute(args: &ArgMatches) -> anyhow::Result<()> {
    let mut writer = intspan::writer(args.get_one::<String>("outfile").unwrap());
    let infile = args.get_one::<String>("infile").unwrap();
    let name = args.get_one::<String>("name").map(|s| s.as_str());
    let options = pku::newick_options(args)?;

    for mut tree in Tree::from_file(infile)? {
        match pick_target(&tree, args)? {
            Some(target) if Some(target) != tree.get_root() => {
                tree.reroot_below(target, name)?;
            }
            _ => log::warn!("No target below the root, tree left as is"),
        }
        pku::write_tree(&mut writer, &tree, &options)?;
    }

    Ok(())
}
