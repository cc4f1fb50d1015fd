use clap::*;
use mgec::libs::genome::GenomeSet;
use mgec::libs::mask::MaskStore;
use std::io::Write;

// Create clap subcommand arguments
pub fn make_subcommand() -> Command {
    Command::new("mask")
        .about("Inspect an exclusion mask against a layout")
        .after_help(
            r###"
This command parses a mask file of genome-global intervals against a layout table
and prints the clipped per-contig intervals the pipeline will actually apply.

Mask file format, one interval per line, 1-based genome-global coordinates:

    genome-prefix \t start \t end

An interval spanning several contigs is clipped once per overlapped contig.
Lines naming an unknown genome and malformed lines are skipped; they are never
fatal.

Examples:
1. Show the applied intervals:
   mgec mask layout.tsv mask.tsv

"###,
        )
        .arg(
            Arg::new("layout")
                .required(true)
                .index(1)
                .help("Layout table written by `mgec layout`"),
        )
        .arg(
            Arg::new("maskfile")
                .required(true)
                .index(2)
                .help("Mask file of genome-global intervals"),
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

// command implementation
pub fn execute(args: &ArgMatches) -> anyhow::Result<()> {
    let mut writer = mgec::writer(args.get_one::<String>("outfile").unwrap());

    let set = GenomeSet::from_layout(args.get_one::<String>("layout").unwrap())?;
    let store = MaskStore::load(args.get_one::<String>("maskfile").unwrap(), &set);

    for (genome, contig, start, end) in store.intervals() {
        writer.write_fmt(format_args!("{}\t{}\t{}\t{}\n", genome, contig, start, end))?;
    }

    Ok(())
}
