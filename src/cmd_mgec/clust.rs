use clap::*;
use mgec::libs::cluster::{assign_ids, cluster_elements, ClusterParams};
use mgec::libs::genome::{read_fasta, subseq, GenomeSet};
use mgec::libs::output::read_bins;
use std::io::Write;
use std::path::{Path, PathBuf};

// Create clap subcommand arguments
pub fn make_subcommand() -> Command {
    Command::new("clust")
        .about("Group reconciled elements into clusters")
        .after_help(
            r###"
This command builds the cross-genome similarity graph over all unmasked binned
predictions and partitions it by Markov clustering.

Every pair of element sequences passing the --min-len floor is aligned; pairs
reaching --min-weight identity over aligned length become weighted edges.
Predictions with no qualifying edge come out as single-member clusters.

Cluster identifiers are assigned by decreasing cluster size, ties broken by the
earliest member; --prefix keeps a secondary pass (e.g. small elements, "S1",
"S2", ...) from colliding with the primary numbering.

Output, one cluster per line:

    id \t member1 \t member2 ...

Examples:
1. Primary pass:
   mgec clust final layout.tsv --seq-dir genomes -o clusters.tsv

2. Secondary small-element pass:
   mgec clust final layout.tsv --seq-dir genomes --min-len 200 --prefix S

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
            Arg::new("min_len")
                .long("min-len")
                .num_args(1)
                .default_value("1000")
                .value_parser(value_parser!(u64))
                .help("Minimum element length to receive edges"),
        )
        .arg(
            Arg::new("min_weight")
                .long("min-weight")
                .num_args(1)
                .default_value("0.5")
                .value_parser(value_parser!(f64))
                .help("Minimum identity for a graph edge"),
        )
        .arg(
            Arg::new("inflation")
                .long("inflation")
                .short('I')
                .num_args(1)
                .default_value("2.0")
                .value_parser(value_parser!(f64))
                .help("MCL inflation parameter"),
        )
        .arg(
            Arg::new("expansion")
                .long("expansion")
                .num_args(1)
                .default_value("2")
                .value_parser(value_parser!(u32))
                .help("MCL expansion power"),
        )
        .arg(
            Arg::new("max_iter")
                .long("max-iter")
                .num_args(1)
                .default_value("100")
                .value_parser(value_parser!(usize))
                .help("MCL iteration cap"),
        )
        .arg(
            Arg::new("prefix")
                .long("prefix")
                .num_args(1)
                .default_value("")
                .help("Cluster identifier prefix for a secondary pass"),
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
    let prefix = args.get_one::<String>("prefix").unwrap();
    let mut writer = mgec::writer(args.get_one::<String>("outfile").unwrap());

    let params = ClusterParams {
        min_len: *args.get_one::<u64>("min_len").unwrap(),
        min_weight: *args.get_one::<f64>("min_weight").unwrap(),
        inflation: *args.get_one::<f64>("inflation").unwrap(),
        expansion: *args.get_one::<u32>("expansion").unwrap(),
        max_iter: *args.get_one::<usize>("max_iter").unwrap(),
    };

    let set = GenomeSet::from_layout(layout)?;

    //----------------------------
    // Collect element sequences
    //----------------------------
    let mut tsvs: Vec<PathBuf> = std::fs::read_dir(bindir)?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| path.extension() == Some(std::ffi::OsStr::new("tsv")))
        .collect();
    tsvs.sort();
    if tsvs.is_empty() {
        anyhow::bail!("no per-genome tiered files found in {}", bindir);
    }

    let mut names: Vec<String> = vec![];
    let mut seqs: Vec<Vec<u8>> = vec![];

    for tsv in &tsvs {
        let genome = tsv.file_stem().unwrap().to_string_lossy().to_string();
        if set.genome(&genome).is_none() {
            eprintln!("Genome {} not in the genome set, skipped", genome);
            continue;
        }
        let Some(fa) = find_fasta(seq_dir, &genome) else {
            eprintln!("No FASTA for genome {} in {}, skipped", genome, seq_dir);
            continue;
        };
        let contigs = read_fasta(&fa.to_string_lossy())?;

        let bins = read_bins(&tsv.to_string_lossy(), &genome)?;
        for pred in bins.values().flatten().filter(|p| !p.masked) {
            match contigs.get(&pred.contig) {
                Some(seq) => {
                    names.push(pred.name.clone());
                    seqs.push(subseq(seq, pred.start, pred.end).to_vec());
                }
                None => eprintln!(
                    "Dropped element {}: unknown contig {}",
                    pred.name, pred.contig
                ),
            }
        }
    }

    //----------------------------
    // Cluster
    //----------------------------
    let clusters = cluster_elements(&seqs, &params);

    for cluster in assign_ids(clusters, &names, prefix) {
        writer.write_fmt(format_args!(
            "{}\t{}\n",
            cluster.id,
            cluster.members.join("\t")
        ))?;
    }

    Ok(())
}
