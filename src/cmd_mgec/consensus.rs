use clap::*;
use indexmap::IndexMap;
use mgec::libs::consensus::bin_genome;
use mgec::libs::genome::GenomeSet;
use mgec::libs::mask::MaskStore;
use mgec::libs::output::write_bins;
use mgec::libs::prediction::RawPrediction;
use rayon::prelude::*;

// Create clap subcommand arguments
pub fn make_subcommand() -> Command {
    Command::new("consensus")
        .about("Bin merged predictions into confidence tiers")
        .after_help(
            r###"
This command runs the merge and binning stages for every genome found in the raw
prediction TSV, and writes one tiered file per genome into --outdir.

Tiers, highest confidence first:

    tier1   merged span with more than two corroborating methods
    tier2   merged span with exactly two
    tier3   single primary method (agent)
    tier4   single secondary method
    tier5   standalone crispr protospacer match

A crispr match overlapping a merged span corroborates it instead of standing
alone: its tag joins the span's method list and counts toward the tier. With
--mask, predictions overlapping an excluded region are flagged and withheld
from 5-column output.

Output: `<outdir>/<prefix>.tsv`, grouped by tier in file order:

    name \t contig \t methods \t start \t end

With --full, two extra columns (tier, masked 0/1) and masked rows are kept, so
`mgec reblast` can reload the complete structure. Genomes are processed
independently; --parallel bounds the worker pool.

Examples:
1. Intermediate pass for reblast:
   mgec consensus raws.tsv layout.tsv --mask mask.tsv --full -o stage1

2. Final-format output:
   mgec consensus raws.tsv layout.tsv -o final

"###,
        )
        .arg(
            Arg::new("infile")
                .required(true)
                .index(1)
                .help("Raw prediction TSV, [stdin] for screen input"),
        )
        .arg(
            Arg::new("layout")
                .required(true)
                .index(2)
                .help("Layout table written by `mgec layout`"),
        )
        .arg(
            Arg::new("mask")
                .long("mask")
                .num_args(1)
                .help("Mask file of genome-global intervals to exclude"),
        )
        .arg(
            Arg::new("max_gap")
                .long("max-gap")
                .num_args(1)
                .default_value("3000")
                .value_parser(value_parser!(u64))
                .help("Merge predictions separated by at most this many bases"),
        )
        .arg(
            Arg::new("full")
                .long("full")
                .action(ArgAction::SetTrue)
                .help("Keep masked rows and append tier/masked columns"),
        )
        .arg(
            Arg::new("parallel")
                .long("parallel")
                .short('p')
                .num_args(1)
                .default_value("1")
                .value_parser(value_parser!(usize))
                .help("Number of threads for parallel processing"),
        )
        .arg(
            Arg::new("outdir")
                .long("outdir")
                .short('o')
                .num_args(1)
                .default_value("consensus_out")
                .help("Output directory, one tiered file per genome"),
        )
}

// command implementation
pub fn execute(args: &ArgMatches) -> anyhow::Result<()> {
    //----------------------------
    // Args
    //----------------------------
    let infile = args.get_one::<String>("infile").unwrap();
    let layout = args.get_one::<String>("layout").unwrap();
    let max_gap = *args.get_one::<u64>("max_gap").unwrap();
    let full = args.get_flag("full");
    let outdir = args.get_one::<String>("outdir").unwrap();

    let opt_parallel = *args.get_one::<usize>("parallel").unwrap();
    rayon::ThreadPoolBuilder::new()
        .num_threads(opt_parallel)
        .build_global()?;

    //----------------------------
    // Load
    //----------------------------
    let set = GenomeSet::from_layout(layout)?;
    let mask = match args.get_one::<String>("mask") {
        Some(path) => MaskStore::load(path, &set),
        None => MaskStore::new(),
    };

    let mut by_genome: IndexMap<String, Vec<RawPrediction>> = IndexMap::new();
    for ((genome, _), raws) in crate::cmd_mgec::merge::read_raws(infile)? {
        if set.genome(&genome).is_none() {
            eprintln!(
                "Dropped {} predictions for {}: not in the genome set",
                raws.len(),
                genome
            );
            continue;
        }
        by_genome.entry(genome).or_default().extend(raws);
    }

    std::fs::create_dir_all(outdir)?;

    //----------------------------
    // Bin per genome
    //----------------------------
    // every layout genome gets a file; one without detections is
    // exactly what the reconciliation pass recovers into
    let prefixes = set.prefixes();
    let results: Vec<anyhow::Result<()>> = prefixes
        .par_iter()
        .map(|prefix| {
            let raws = by_genome.get(prefix).map(|v| v.as_slice()).unwrap_or(&[]);
            let bins = bin_genome(prefix, raws, &mask, max_gap);
            let outfile = format!("{}/{}.tsv", outdir, prefix);
            write_bins(&outfile, &bins, full)
        })
        .collect();
    for result in results {
        result?;
    }

    Ok(())
}
