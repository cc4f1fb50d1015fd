use clap::*;
use indexmap::IndexMap;
use mgec::libs::genome::{read_fasta, GenomeSet};
use mgec::libs::mask::MaskStore;
use mgec::libs::output::{read_bins, write_bins};
use mgec::libs::prediction::GenomeBins;
use mgec::libs::reblast::{Blastn, Reconciler};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

// Create clap subcommand arguments
pub fn make_subcommand() -> Command {
    Command::new("reblast")
        .about("Recover elements missed in sibling genomes")
        .after_help(
            r###"
This command re-screens the binned genome set: every genome's unmasked
predictions are cut out of its FASTA and searched, via blastn, against every
other genome's full sequence. An accepted hit at a target locus not covered by
any existing prediction there (masked ones included) becomes a new `reblast`
prediction, tiered by its own support and mask-checked for the target.

The pass strictly adds. Existing predictions are never removed or re-tiered,
and running it again over an already-reconciled set adds nothing, since the
coverage check subsumes earlier reconciler output.

Inputs:
* <bindir> holds one `<prefix>.tsv` per genome, as written by
  `mgec consensus --full` (the 5-column final form also loads, but then
  masked predictions are invisible to the coverage check)
* --seq-dir holds `<prefix>.fa` genome FASTA files

Hits must reach --min-identity percent identity over at least --min-len bases.
Searches for different (query, target) pairs run in parallel; accepted hits
are merged serially in a fixed order, so results do not depend on scheduling.

Examples:
1. Reconcile and write the final 5-column files:
   mgec reblast stage1 layout.tsv --seq-dir genomes --mask mask.tsv -o final

2. Keep the full form for another pass:
   mgec reblast stage1 layout.tsv --seq-dir genomes --full -o stage2

"###,
        )
        .arg(
            Arg::new("bindir")
                .required(true)
                .index(1)
                .help("Directory of per-genome tiered files"),
        )
        .arg(
            Arg::new("layout")
                .required(true)
                .index(2)
                .help("Layout table written by `mgec layout`"),
        )
        .arg(
            Arg::new("seq_dir")
                .long("seq-dir")
                .required(true)
                .num_args(1)
                .help("Directory of `<prefix>.fa` genome FASTA files"),
        )
        .arg(
            Arg::new("mask")
                .long("mask")
                .num_args(1)
                .help("Mask file of genome-global intervals to exclude"),
        )
        .arg(
            Arg::new("min_identity")
                .long("min-identity")
                .num_args(1)
                .default_value("90.0")
                .value_parser(value_parser!(f64))
                .help("Minimum percent identity for an accepted hit"),
        )
        .arg(
            Arg::new("min_len")
                .long("min-len")
                .num_args(1)
                .default_value("1000")
                .value_parser(value_parser!(u64))
                .help("Minimum alignment length for an accepted hit"),
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
                .help("Number of threads for parallel searches"),
        )
        .arg(
            Arg::new("outdir")
                .long("outdir")
                .short('o')
                .num_args(1)
                .default_value("reblast_out")
                .help("Output directory, one tiered file per genome"),
        )
}

fn find_fasta(seq_dir: &str, prefix: &str) -> Option<PathBuf> {
    for ext in ["fa", "fa.gz", "fasta", "fasta.gz", "fna", "fna.gz"] {
        let path = Path::new(seq_dir).join(format!("{}.{}", prefix, ext));
        if path.is_file() {
            return Some(path);
        }
    }
    None
}

// command implementation
pub fn execute(args: &ArgMatches) -> anyhow::Result<()> {
    //----------------------------
    // Args
    //----------------------------
    let bindir = args.get_one::<String>("bindir").unwrap();
    let layout = args.get_one::<String>("layout").unwrap();
    let seq_dir = args.get_one::<String>("seq_dir").unwrap();
    let min_identity = *args.get_one::<f64>("min_identity").unwrap();
    let min_len = *args.get_one::<u64>("min_len").unwrap();
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

    let mut tsvs: Vec<PathBuf> = std::fs::read_dir(bindir)?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| path.extension() == Some(std::ffi::OsStr::new("tsv")))
        .collect();
    tsvs.sort();
    if tsvs.is_empty() {
        anyhow::bail!("no per-genome tiered files found in {}", bindir);
    }

    let mut bins: BTreeMap<String, GenomeBins> = BTreeMap::new();
    let mut seqs: BTreeMap<String, IndexMap<String, Vec<u8>>> = BTreeMap::new();
    let mut targets: BTreeMap<String, PathBuf> = BTreeMap::new();

    for tsv in &tsvs {
        let prefix = tsv.file_stem().unwrap().to_string_lossy().to_string();
        bins.insert(prefix.clone(), read_bins(&tsv.to_string_lossy(), &prefix)?);

        match find_fasta(seq_dir, &prefix) {
            Some(fa) => {
                seqs.insert(prefix.clone(), read_fasta(&fa.to_string_lossy())?);
                targets.insert(prefix, fa);
            }
            None => eprintln!(
                "No FASTA for genome {} in {}, used neither as query nor as target",
                prefix, seq_dir
            ),
        }
    }

    //----------------------------
    // Reconcile
    //----------------------------
    let search = Blastn::new(targets)?;
    let recon = Reconciler {
        set: &set,
        mask: &mask,
        min_identity,
        min_len,
    };
    let added = recon.reconcile(&mut bins, &seqs, &search);
    eprintln!("Recovered {} predictions", added);

    //----------------------------
    // Write
    //----------------------------
    std::fs::create_dir_all(outdir)?;
    for (prefix, genome_bins) in &bins {
        write_bins(&format!("{}/{}.tsv", outdir, prefix), genome_bins, full)?;
    }

    Ok(())
}
