use clap::*;
use mgec::libs::genome::{genome_prefix, read_fasta, GenomeSet};

// Create clap subcommand arguments
pub fn make_subcommand() -> Command {
    Command::new("layout")
        .about("Genome/contig layout table from FASTA file(s)")
        .after_help(
            r###"
This command scans one or more genome FASTA files and writes the layout table the
rest of the pipeline works against: per genome a header line, then one row per
contig with its 1-based offsets in the genome's concatenated coordinate space.

Contigs are laid out contiguously in file order; offsets are computed here once
and never change downstream.

Notes:
* The genome prefix is the FASTA file stem (`Ec_K12.fa.gz` => `Ec_K12`)
* Supports both plain text and gzipped (.gz) files
* A genome whose FASTA cannot be read is skipped with a note; the rest continue

Examples:
1. Two genomes:
   mgec layout Ec_K12.fa Ec_O157.fa -o layout.tsv

"###,
        )
        .arg(
            Arg::new("infiles")
                .required(true)
                .num_args(1..)
                .index(1)
                .help("Input genome FASTA file(s)"),
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
    let writer = mgec::writer(args.get_one::<String>("outfile").unwrap());

    let mut set = GenomeSet::new();
    for infile in args.get_many::<String>("infiles").unwrap() {
        let prefix = genome_prefix(infile);
        if !std::path::Path::new(infile).is_file() {
            eprintln!("No such file {}, genome {} skipped", infile, prefix);
            continue;
        }
        match read_fasta(infile) {
            Ok(seqs) if !seqs.is_empty() => set.add_genome(&prefix, "fasta", &seqs),
            Ok(_) => eprintln!("No usable sequence in {}, genome {} skipped", infile, prefix),
            Err(why) => eprintln!("Could not ingest {}, genome {} skipped: {}", infile, prefix, why),
        }
    }

    set.write_layout(writer)?;

    Ok(())
}
