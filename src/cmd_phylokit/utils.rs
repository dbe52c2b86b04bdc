use clap::*;
use phylokit::libs::phylo::node::NodeId;
use phylokit::libs::phylo::tree::{LabelMode, LengthFormat, NewickOptions, NhxDialect, Tree};
use regex::RegexBuilder;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::io::Write;
use std::str::FromStr;

// Output flags shared by every subcommand that writes trees
pub fn add_newick_args(cmd: Command) -> Command {
    cmd.arg(
        Arg::new("bl_format")
            .long("bl-format")
            .num_args(1)
            .default_value("%.6f")
            .help("Branch length format: %.Nf, %.Ne or %.Ng"),
    )
    .arg(
        Arg::new("internal")
            .long("internal")
            .action(ArgAction::SetTrue)
            .help("Also label internal nodes"),
    )
    .arg(
        Arg::new("label")
            .long("label")
            .num_args(1)
            .default_value("name")
            .help("Label source: [name], [taxon], [internal] or an annotation key"),
    )
    .arg(
        Arg::new("nhx")
            .long("nhx")
            .num_args(1)
            .action(ArgAction::Append)
            .value_delimiter(',')
            .help("Annotation keys written to the comment block"),
    )
    .arg(
        Arg::new("dialect")
            .long("dialect")
            .num_args(1)
            .value_parser(["nhx", "percent"])
            .default_value("nhx")
            .help("Comment syntax: [nhx] for [&&NHX:k=v], [percent] for [%k=v]"),
    )
    .arg(
        Arg::new("indent")
            .long("indent")
            .num_args(0..=1)
            .default_missing_value("  ")
            .help("Pretty print with this indentation unit (two spaces when bare)"),
    )
    .arg(
        Arg::new("translate")
            .long("translate")
            .num_args(1)
            .help("A TSV file mapping labels to their replacements"),
    )
}

pub fn newick_options(args: &ArgMatches) -> anyhow::Result<NewickOptions> {
    let length_format = LengthFormat::from_str(args.get_one::<String>("bl_format").unwrap())?;
    let dialect = NhxDialect::from_str(args.get_one::<String>("dialect").unwrap())?;

    let label = match args.get_one::<String>("label").unwrap().as_str() {
        "name" => LabelMode::Name,
        "taxon" => LabelMode::Taxon,
        "internal" => LabelMode::InternalName,
        key => LabelMode::Annotation(key.to_string()),
    };

    let nhx_keys: Vec<String> = args
        .get_many::<String>("nhx")
        .map(|keys| keys.cloned().collect())
        .unwrap_or_default();

    let indent = args
        .get_one::<String>("indent")
        .cloned()
        .unwrap_or_default();

    let translate = match args.get_one::<String>("translate") {
        Some(file) => Some(read_translate(file)?),
        None => None,
    };

    Ok(NewickOptions {
        label,
        internal_labels: args.get_flag("internal"),
        translate,
        length_format,
        nhx_keys,
        dialect,
        indent,
    })
}

fn read_translate(file: &str) -> anyhow::Result<HashMap<String, String>> {
    let mut table = HashMap::new();
    for line in intspan::read_lines(file) {
        if line.trim().is_empty() || line.starts_with('#') {
            continue;
        }
        match line.split_once('\t') {
            Some((from, to)) => {
                table.insert(from.to_string(), to.trim_end().to_string());
            }
            None => anyhow::bail!("Translate lines need two tab-separated columns: {}", line),
        }
    }
    Ok(table)
}

pub fn write_tree(
    writer: &mut dyn Write,
    tree: &Tree,
    options: &NewickOptions,
) -> anyhow::Result<()> {
    writer.write_all((tree.to_newick_with(options) + "\n").as_ref())?;
    Ok(())
}

// Node selection by --node, --file and --regex
pub fn add_name_args(cmd: Command) -> Command {
    cmd.arg(
        Arg::new("node")
            .long("node")
            .short('n')
            .num_args(1)
            .action(ArgAction::Append)
            .help("Node name"),
    )
    .arg(
        Arg::new("file")
            .long("file")
            .short('f')
            .num_args(1)
            .help("A file contains node names"),
    )
    .arg(
        Arg::new("regex")
            .long("regex")
            .short('r')
            .num_args(1)
            .action(ArgAction::Append)
            .help("Nodes match the regular expression"),
    )
}

pub fn has_name_rules(args: &ArgMatches) -> bool {
    args.contains_id("node") || args.contains_id("file") || args.contains_id("regex")
}

// Named IDs that match the name rules
pub fn match_names(tree: &Tree, args: &ArgMatches) -> anyhow::Result<BTreeSet<NodeId>> {
    // IDs with names
    let id_of: BTreeMap<String, NodeId> = tree.get_name_id();

    // all matched IDs
    let mut ids = BTreeSet::new();

    if let Some(names) = args.get_many::<String>("node") {
        for name in names {
            if let Some(id) = id_of.get(name) {
                ids.insert(*id);
            }
        }
    }

    if let Some(file) = args.get_one::<String>("file") {
        for name in intspan::read_first_column(file).iter() {
            if let Some(id) = id_of.get(name) {
                ids.insert(*id);
            }
        }
    }

    if let Some(regexes) = args.get_many::<String>("regex") {
        for regex in regexes {
            let re = RegexBuilder::new(regex).case_insensitive(true).build()?;
            for (name, id) in &id_of {
                if re.is_match(name) {
                    ids.insert(*id);
                }
            }
        }
    }

    Ok(ids)
}

// Most recent common ancestor of all ids
pub fn common_ancestor(tree: &Tree, ids: &BTreeSet<NodeId>) -> anyhow::Result<Option<NodeId>> {
    let mut iter = ids.iter();
    let mut mrca = match iter.next() {
        Some(&id) => id,
        None => return Ok(None),
    };
    for &id in iter {
        mrca = tree.most_recent_common_ancestor(mrca, id)?;
    }
    Ok(Some(mrca))
}
