use clap::*;
use indexmap::IndexMap;
use mgec::libs::merge::merge_contig;
use mgec::libs::prediction::RawPrediction;
use std::io::{BufRead, Write};

// Create clap subcommand arguments
pub fn make_subcommand() -> Command {
    Command::new("merge")
        .about("Merge overlapping/nearby detector intervals per contig")
        .after_help(
            r###"
This command merges raw interval predictions from extending detection methods
into unified spans, per (genome, contig). Predictions that overlap, or that sit
within --max-gap of each other, are merged into one span whose method list is
the deduplicated union of the contributors.

Input format, one raw prediction per line:

    genome \t contig \t method \t start \t end

Known method tags: agent, virsorter, blaster, crispr, reblast. CRISPR matches
never merge; they are withheld here and re-attached at the consensus stage.
Malformed lines, unknown tags and inverted intervals are dropped with a note.

Output format:

    genome \t contig \t methods(comma-joined) \t start \t end

Merged spans for a contig never overlap and come out sorted by start; the
result does not depend on input order.

Examples:
1. Merge with the default proximity threshold:
   mgec merge raws.tsv -o merged.tsv

2. Strict overlap only:
   mgec merge raws.tsv --max-gap 0

"###,
        )
        .arg(
            Arg::new("infile")
                .required(true)
                .index(1)
                .help("Raw prediction TSV, [stdin] for screen input"),
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
            Arg::new("outfile")
                .long("outfile")
                .short('o')
                .num_args(1)
                .default_value("stdout")
                .help("Output filename. [stdout] for screen"),
        )
}

/// Read and group raw predictions by (genome, contig), keeping file
/// order of the groups. Shared with `mgec consensus`.
pub fn read_raws(infile: &str) -> anyhow::Result<IndexMap<(String, String), Vec<RawPrediction>>> {
    let mut grouped: IndexMap<(String, String), Vec<RawPrediction>> = IndexMap::new();

    let reader = mgec::reader(infile);
    for line in reader.lines() {
        let line = line?;
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        match RawPrediction::parse(&line) {
            Some(raw) => grouped
                .entry((raw.genome.clone(), raw.contig.clone()))
                .or_default()
                .push(raw),
            None => eprintln!("Dropped malformed prediction line: {}", line),
        }
    }

    Ok(grouped)
}

// command implementation
pub fn execute(args: &ArgMatches) -> anyhow::Result<()> {
    let infile = args.get_one::<String>("infile").unwrap();
    let max_gap = *args.get_one::<u64>("max_gap").unwrap();
    let mut writer = mgec::writer(args.get_one::<String>("outfile").unwrap());

    let grouped = read_raws(infile)?;

    for raws in grouped.values() {
        for merged in merge_contig(raws, max_gap) {
            writer.write_fmt(format_args!("{}", merged))?;
        }
    }

    Ok(())
}
