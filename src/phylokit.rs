extern crate clap;
use clap::*;

mod cmd_phylokit;

fn main() -> anyhow::Result<()> {
    let app = Command::new("phylokit")
        .version(crate_version!())
        .author(crate_authors!())
        .about("`phylokit` - Build, query and reshape rooted phylogenetic trees")
        .propagate_version(true)
        .arg_required_else_help(true)
        .color(ColorChoice::Auto)
        .arg(
            Arg::new("verbose")
                .long("verbose")
                .short('v')
                .global(true)
                .action(ArgAction::Count)
                .help("Increase log verbosity (-v info, -vv debug, -vvv trace)"),
        )
        .subcommand(cmd_phylokit::stat::make_subcommand())
        .subcommand(cmd_phylokit::distance::make_subcommand())
        .subcommand(cmd_phylokit::diversity::make_subcommand())
        .subcommand(cmd_phylokit::reroot::make_subcommand())
        .subcommand(cmd_phylokit::prune::make_subcommand())
        .subcommand(cmd_phylokit::resolve::make_subcommand())
        .subcommand(cmd_phylokit::topo::make_subcommand())
        .subcommand(cmd_phylokit::format::make_subcommand())
        .after_help(
            r###"Subcommand groups:

* Info:
    * stat      - Shape statistics of each tree
    * distance  - Root, patristic and nodal distances
    * diversity - Fair proportion, equal splits, pendant edge, Shapley

* Ops:
    * reroot  - Place the root on the edge above a clade
    * prune   - Remove or keep tips and clades
    * resolve - Randomly resolve polytomies
    * topo    - Strip lengths, annotations or labels

* Output:
    * format - Rewrite trees with the chosen Newick options

Logging goes to stderr. `RUST_LOG` overrides the level set by `-v`.

"###,
        );

    let matches = app.get_matches();
    init_logger(matches.get_count("verbose"));

    match matches.subcommand() {
        Some(("stat", sub_matches)) => cmd_phylokit::stat::execute(sub_matches),
        Some(("distance", sub_matches)) => cmd_phylokit::distance::execute(sub_matches),
        Some(("diversity", sub_matches)) => cmd_phylokit::diversity::execute(sub_matches),
        Some(("reroot", sub_matches)) => cmd_phylokit::reroot::execute(sub_matches),
        Some(("prune", sub_matches)) => cmd_phylokit::prune::execute(sub_matches),
        Some(("resolve", sub_matches)) => cmd_phylokit::resolve::execute(sub_matches),
        Some(("topo", sub_matches)) => cmd_phylokit::topo::execute(sub_matches),
        Some(("format", sub_matches)) => cmd_phylokit::format::execute(sub_matches),
        _ => unreachable!(),
    }?;

    Ok(())
}

fn init_logger(verbose: u8) {
    let level = match verbose {
        0 => log::LevelFilter::Warn,
        1 => log::LevelFilter::Info,
        2 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    };

    env_logger::Builder::new()
        .filter_level(level)
        .parse_default_env()
        .format_timestamp(None)
        .init();
}
