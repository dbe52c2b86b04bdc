use super::utils as pku;
use clap::*;
use phylokit::libs::phylo::node::NodeId;
use phylokit::libs::phylo::tree::Tree;

// Create clap subcommand arguments
pub fn make_subcommand() -> Command {
    let cmd = Command::new("topo")
        .about("Manipulates tree topology and attributes")
        .after_help(
            r###"
Modifies tree topology by optionally removing branch lengths, comments, or labels.

Notes:
* By default, branch lengths and annotations are REMOVED.
* Use `--bl` to KEEP branch lengths.
* Use `--comment` to KEEP annotations (written with `--nhx`).
* Use `-I` to REMOVE internal labels.
* Use `-L` to REMOVE leaf labels.
* Internal labels are only written with `--internal`.

Examples:
1. Topology only:
   phylokit topo tree.nwk

2. Keep branch lengths and internal labels:
   phylokit topo tree.nwk --bl --internal

3. Keep the species annotation:
   phylokit topo tree.nwk --comment --nhx S
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
            Arg::new("bl")
                .long("bl")
                .short('b')
                .action(ArgAction::SetTrue)
                .help("Keep branch lengths"),
        )
        .arg(
            Arg::new("comment")
                .long("comment")
                .short('c')
                .action(ArgAction::SetTrue)
                .help("Keep annotations"),
        )
        .arg(
            Arg::new("Internal")
                .long("Internal")
                .short('I')
                .action(ArgAction::SetTrue)
                .help("Remove internal labels"),
        )
        .arg(
            Arg::new("Leaf")
                .long("Leaf")
                .short('L')
                .action(ArgAction::SetTrue)
                .help("Remove leaf labels"),
        )
        .arg(
            Arg::new("outfile")
                .short('o')
                .long("outfile")
                .num_args(1)
                .default_value("stdout")
                .help("Output filename. [stdout] for screen"),
        );
    pku::add_newick_args(cmd)
}

// command implementation
pub fn execute(args: &ArgMatches) -> anyhow::Result<()> {
    let mut writer = intspan::writer(args.get_one::<String>("outfile").unwrap());
    let infile = args.get_one::<String>("infile").unwrap();
    let options = pku::newick_options(args)?;

    let is_bl = args.get_flag("bl");
    let is_comment = args.get_flag("comment");
    let skip_internal = args.get_flag("Internal");
    let skip_leaf = args.get_flag("Leaf");

    for mut tree in Tree::from_file(infile)? {
        let ids: Vec<NodeId> = tree.nodes().collect();
        for id in ids {
            if !is_bl {
                tree.set_branch_length(id, None)?;
            }
            if let Some(node) = tree.get_node_mut(id) {
                if !is_comment {
                    node.properties.clear();
                }
                let is_leaf = node.is_leaf();
                if (is_leaf && skip_leaf) || (!is_leaf && skip_internal) {
                    node.name = None;
                }
            }
        }
        pku::write_tree(&mut writer, &tree, &options)?;
    }

    Ok(())
}
