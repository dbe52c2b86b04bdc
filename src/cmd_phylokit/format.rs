use super::utils as pku;
use clap::*;
use phylokit::libs::phylo::tree::Tree;
use std::io::Write;

// Create clap subcommand arguments
pub fn make_subcommand() -> Command {
    let cmd = Command::new("format")
        .about("Rewrites trees with the chosen Newick options")
        .after_help(
            r###"
Reads Newick trees and writes them back with the output options below.

Notes:
* `--label` picks the text of each label: the node [name], the linked
  [taxon], [internal] for names with a fallback for unnamed nodes, or the
  value of any other annotation key.
* `--translate` replaces labels found in the first column of a TSV file
  by the second column.
* Labels with blanks or Newick punctuation are single-quoted.
* `--subtree` writes only the clade below the named node.

Examples:
1. Pretty print:
   phylokit format tree.nwk --indent

2. Three-decimal lengths, internal labels and species annotations:
   phylokit format tree.nwk --bl-format %.3f --internal --nhx S

3. Label tips by an annotation:
   phylokit format tree.nwk --label S
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
            Arg::new("subtree")
                .long("subtree")
                .num_args(1)
                .help("Only write the clade below this node"),
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

    for tree in Tree::from_file(infile)? {
        match args.get_one::<String>("subtree") {
            Some(name) => match tree.get_node_by_name(name) {
                Some(id) => {
                    let out_string = tree.to_newick_subtree(id, &options);
                    writer.write_all((out_string + "\n").as_ref())?;
                }
                None => log::warn!("Node {} not found", name),
            },
            None => pku::write_tree(&mut writer, &tree, &options)?,
        }
    }

    Ok(())
}
