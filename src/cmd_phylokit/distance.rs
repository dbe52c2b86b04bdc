use super::utils as pku;
use clap::*;
use itertools::Itertools;
use phylokit::libs::phylo::node::NodeId;
use phylokit::libs::phylo::tree::{LengthFormat, Tree};
use std::io::Write;
use std::str::FromStr;

// Create clap subcommand arguments
pub fn make_subcommand() -> Command {
    let cmd = Command::new("distance")
        .about("Outputs distances between nodes")
        .after_help(
            r###"
Prints distances of named nodes as TSV.

Modes:
* root: node and its distance to the root
* pairwise: every pair of selected nodes and the path length between them
* lca: every pair of selected nodes and their most recent common ancestor

Notes:
* Without --node, --file or --regex, every named terminal is selected.
* `--nodal` counts edges instead of summing branch lengths.
* Absent branch lengths count as zero.

Examples:
1. Root-to-tip distances:
   phylokit distance tree.nwk

2. Patristic distances between two tips:
   phylokit distance tree.nwk --mode pairwise -n Homo -n Pan

3. Edge counts between all tips:
   phylokit distance tree.nwk --mode pairwise --nodal
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
            Arg::new("mode")
                .long("mode")
                .short('m')
                .value_parser(["root", "pairwise", "lca"])
                .default_value("root")
                .help("Distance mode"),
        )
        .arg(
            Arg::new("nodal")
                .long("nodal")
                .action(ArgAction::SetTrue)
                .help("Count edges instead of summing lengths"),
        )
        .arg(
            Arg::new("bl_format")
                .long("bl-format")
                .num_args(1)
                .default_value("%g")
                .help("Number format: %.Nf, %.Ne or %.Ng"),
        )
        .arg(
            Arg::new("outfile")
                .short('o')
                .long("outfile")
                .num_args(1)
                .default_value("stdout")
                .help("Output filename. [stdout] for screen"),
        );
    pku::add_name_args(cmd)
}

// command implementation
pub fn execute(args: &ArgMatches) -> anyhow::Result<()> {
    let mut writer = intspan::writer(args.get_one::<String>("outfile").unwrap());
    let infile = args.get_one::<String>("infile").unwrap();
    let mode = args.get_one::<String>("mode").unwrap();
    let is_nodal = args.get_flag("nodal");
    let format = LengthFormat::from_str(args.get_one::<String>("bl_format").unwrap())?;

    let trees = Tree::from_file(infile)?;

    for tree in &trees {
        let ids: Vec<NodeId> = if pku::has_name_rules(args) {
            pku::match_names(tree, args)?.into_iter().collect()
        } else {
            tree.terminals()
                .into_iter()
                .filter(|&id| tree[id].name.is_some())
                .collect()
        };

        match mode.as_str() {
            "root" => {
                for &id in &ids {
                    let distance = if is_nodal {
                        tree.ancestors(id).map(|a| a.len()).unwrap_or(0).to_string()
                    } else {
                        format.format(tree.path_to_root(id))
                    };
                    writer.write_fmt(format_args!(
                        "{}\t{}\n",
                        tree[id].internal_name(),
                        distance
                    ))?;
                }
            }
            "pairwise" => {
                for (&a, &b) in ids.iter().tuple_combinations() {
                    let distance = if is_nodal {
                        tree.nodal_distance(a, b)?.to_string()
                    } else {
                        format.format(tree.patristic_distance(a, b)?)
                    };
                    writer.write_fmt(format_args!(
                        "{}\t{}\t{}\n",
                        tree[a].internal_name(),
                        tree[b].internal_name(),
                        distance
                    ))?;
                }
            }
            "lca" => {
                for (&a, &b) in ids.iter().tuple_combinations() {
                    let mrca = tree.most_recent_common_ancestor(a, b)?;
                    writer.write_fmt(format_args!(
                        "{}\t{}\t{}\n",
                        tree[a].internal_name(),
                        tree[b].internal_name(),
                        tree[mrca].internal_name()
                    ))?;
                }
            }
            _ => unreachable!(),
        }
    }

    Ok(())
}
