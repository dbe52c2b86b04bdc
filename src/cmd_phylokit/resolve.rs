use super::utils as pku;
use clap::*;
use phylokit::libs::phylo::tree::Tree;
use rand::rngs::StdRng;
use rand::SeedableRng;

// Create clap subcommand arguments
pub fn make_subcommand() -> Command {
    let cmd = Command::new("resolve")
        .about("Randomly resolves polytomies into binary splits")
        .after_help(
            r###"
Turns every node with more than two children into a random binary subtree.

Notes:
* New internal nodes get a branch length of zero, so every root-to-tip
  path keeps its length.
* `--seed` makes the result reproducible.

Examples:
1. Resolve with a fixed seed:
   phylokit resolve tree.nwk --seed 42
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
            Arg::new("seed")
                .long("seed")
                .short('s')
                .num_args(1)
                .value_parser(value_parser!(u64))
                .help("Random seed"),
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

    let mut rng = match args.get_one::<u64>("seed") {
        Some(&seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };

    for mut tree in Tree::from_file(infile)? {
        let added = tree.resolve_polytomies(&mut rng)?;
        log::info!("Added {} internal nodes", added);
        pku::write_tree(&mut writer, &tree, &options)?;
    }

    Ok(())
}
