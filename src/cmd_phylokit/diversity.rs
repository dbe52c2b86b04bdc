use clap::*;
use phylokit::libs::phylo::tree::{LengthFormat, Tree};
use std::io::Write;
use std::str::FromStr;

// Create clap subcommand arguments
pub fn make_subcommand() -> Command {
    Command::new("diversity")
        .about("Allocates phylogenetic diversity to terminals")
        .after_help(
            r###"
Splits the tree length among the terminals and prints one row per terminal.

Metrics:
* fp:      fair proportion, each edge split evenly over the terminals below it
* es:      equal splits, each edge divided by the child count at every node on the way down
* pe:      pendant edge, the terminal's own branch length
* shapley: Shapley value of the terminal as a member of the tree coalition
* all:     every metric above, one column each

Examples:
1. Fair proportion of every terminal:
   phylokit diversity tree.nwk

2. All metrics, three decimals:
   phylokit diversity tree.nwk --metric all --bl-format %.3f
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
            Arg::new("metric")
                .long("metric")
                .short('m')
                .value_parser(["fp", "es", "pe", "shapley", "all"])
                .default_value("fp")
                .help("Allocation metric"),
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
        )
}

// command implementation
pub fn execute(args: &ArgMatches) -> anyhow::Result<()> {
    let mut writer = intspan::writer(args.get_one::<String>("outfile").unwrap());
    let infile = args.get_one::<String>("infile").unwrap();
    let metric = args.get_one::<String>("metric").unwrap();
    let format = LengthFormat::from_str(args.get_one::<String>("bl_format").unwrap())?;

    let names: Vec<&str> = match metric.as_str() {
        "all" => vec!["fp", "es", "pe", "shapley"],
        one => vec![one],
    };

    for tree in Tree::from_file(infile)? {
        let columns: Vec<_> = names
            .iter()
            .map(|&m| match m {
                "fp" => tree.fair_proportion(),
                "es" => tree.equal_splits(),
                "pe" => tree.pendant_edge(),
                _ => tree.shapley_value(),
            })
            .collect();

        if names.len() > 1 {
            writer.write_fmt(format_args!("name\t{}\n", names.join("\t")))?;
        }

        for id in tree.terminals() {
            let values: Vec<String> = columns
                .iter()
                .map(|col| format.format(col.get(&id).copied().unwrap_or(0.0)))
                .collect();
            writer.write_fmt(format_args!(
                "{}\t{}\n",
                tree[id].internal_name(),
                values.join("\t")
            ))?;
        }
    }

    Ok(())
}
