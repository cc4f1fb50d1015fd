use anyhow::Context;
use indexmap::IndexMap;
use std::io::{BufRead, Write};

//----------------------------
// Genome / Contig tables
//----------------------------

/// One input genome. Created at ingestion, immutable afterwards.
#[derive(Debug, Clone)]
pub struct Genome {
    pub prefix: String,
    pub name: String,
    pub length: u64,
    pub scaffolds: usize,
    pub source: String,
}

/// A contig within a genome's concatenated coordinate space.
///
/// `start`/`end` are 1-based inclusive offsets within the genome;
/// contigs are laid out contiguously and in file order.
#[derive(Debug, Clone)]
pub struct Contig {
    pub genome: String,
    pub id: String,
    pub start: u64,
    pub end: u64,
}

impl Contig {
    pub fn length(&self) -> u64 {
        self.end - self.start + 1
    }

    /// Clip a genome-global interval to this contig and translate it
    /// to contig-local 1-based coordinates.
    ///
    /// ```
    /// use mgec::libs::genome::Contig;
    /// let ctg = Contig {
    ///     genome: "Ec1".to_string(),
    ///     id: "ctg2".to_string(),
    ///     start: 1001,
    ///     end: 2000,
    /// };
    /// assert_eq!(ctg.clip_global(1500, 2500), Some((500, 1000)));
    /// assert_eq!(ctg.clip_global(1, 999), None);
    /// ```
    pub fn clip_global(&self, start: u64, end: u64) -> Option<(u64, u64)> {
        let lo = start.max(self.start);
        let hi = end.min(self.end);
        if lo > hi {
            return None;
        }
        Some((lo - self.start + 1, hi - self.start + 1))
    }
}

/// Owned genome/contig collections, keyed by genome prefix.
///
/// Replaces the hash-of-hashes state of older pipelines; every stage
/// receives this by reference and treats it as read-only.
#[derive(Debug, Default)]
pub struct GenomeSet {
    genomes: IndexMap<String, Genome>,
    contigs: IndexMap<String, Vec<Contig>>,
}

impl GenomeSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn genome(&self, prefix: &str) -> Option<&Genome> {
        self.genomes.get(prefix)
    }

    pub fn genomes(&self) -> impl Iterator<Item = &Genome> {
        self.genomes.values()
    }

    pub fn prefixes(&self) -> Vec<String> {
        self.genomes.keys().cloned().collect()
    }

    pub fn contigs(&self, prefix: &str) -> &[Contig] {
        self.contigs.get(prefix).map(|v| v.as_slice()).unwrap_or(&[])
    }

    pub fn contig(&self, prefix: &str, id: &str) -> Option<&Contig> {
        self.contigs(prefix).iter().find(|c| c.id == id)
    }

    /// Register one genome from in-memory contig sequences, assigning
    /// contiguous 1-based global offsets in record order.
    pub fn add_genome(&mut self, prefix: &str, source: &str, seqs: &IndexMap<String, Vec<u8>>) {
        let mut cursor = 1u64;
        let mut contigs = vec![];
        for (id, seq) in seqs {
            let len = seq.len() as u64;
            contigs.push(Contig {
                genome: prefix.to_string(),
                id: id.clone(),
                start: cursor,
                end: cursor + len - 1,
            });
            cursor += len;
        }

        self.genomes.insert(
            prefix.to_string(),
            Genome {
                prefix: prefix.to_string(),
                name: prefix.to_string(),
                length: cursor - 1,
                scaffolds: contigs.len(),
                source: source.to_string(),
            },
        );
        self.contigs.insert(prefix.to_string(), contigs);
    }

    /// Load a layout table written by `mgec layout`.
    ///
    /// Genome header lines start with `#`; malformed lines are dropped
    /// with a note on stderr, never fatal.
    pub fn from_layout(input: &str) -> anyhow::Result<GenomeSet> {
        let mut set = GenomeSet::new();
        let reader = crate::reader(input);

        for line in reader.lines() {
            let line = line?;
            if line.is_empty() {
                continue;
            }

            if let Some(rest) = line.strip_prefix('#') {
                let fields: Vec<&str> = rest.trim_start().split('\t').collect();
                if fields.len() != 5 {
                    eprintln!("Dropped malformed genome header: {}", line);
                    continue;
                }
                let (length, scaffolds) = match (fields[2].parse(), fields[3].parse()) {
                    (Ok(l), Ok(s)) => (l, s),
                    _ => {
                        eprintln!("Dropped malformed genome header: {}", line);
                        continue;
                    }
                };
                set.genomes.insert(
                    fields[0].to_string(),
                    Genome {
                        prefix: fields[0].to_string(),
                        name: fields[1].to_string(),
                        length,
                        scaffolds,
                        source: fields[4].to_string(),
                    },
                );
                continue;
            }

            let fields: Vec<&str> = line.split('\t').collect();
            if fields.len() < 4 {
                eprintln!("Dropped malformed contig line: {}", line);
                continue;
            }
            let (start, end) = match (fields[2].parse::<u64>(), fields[3].parse::<u64>()) {
                (Ok(s), Ok(e)) if s <= e => (s, e),
                _ => {
                    eprintln!("Dropped malformed contig line: {}", line);
                    continue;
                }
            };
            set.contigs
                .entry(fields[0].to_string())
                .or_default()
                .push(Contig {
                    genome: fields[0].to_string(),
                    id: fields[1].to_string(),
                    start,
                    end,
                });
        }

        Ok(set)
    }

    pub fn write_layout<W: Write>(&self, mut writer: W) -> anyhow::Result<()> {
        for genome in self.genomes.values() {
            writer.write_fmt(format_args!(
                "# {}\t{}\t{}\t{}\t{}\n",
                genome.prefix, genome.name, genome.length, genome.scaffolds, genome.source
            ))?;
        }
        for contigs in self.contigs.values() {
            for ctg in contigs {
                writer.write_fmt(format_args!(
                    "{}\t{}\t{}\t{}\t{}\n",
                    ctg.genome,
                    ctg.id,
                    ctg.start,
                    ctg.end,
                    ctg.length()
                ))?;
            }
        }
        Ok(())
    }
}

//----------------------------
// Sequence access
//----------------------------

/// Read a FASTA file into contig-id keyed sequences, in record order.
pub fn read_fasta(input: &str) -> anyhow::Result<IndexMap<String, Vec<u8>>> {
    let reader = crate::reader(input);
    let mut fa_in = noodles_fasta::io::Reader::new(reader);

    let mut seqs = IndexMap::new();
    for result in fa_in.records() {
        let record = result.with_context(|| format!("parsing {}", input))?;
        let name = String::from_utf8(record.name().into())?;
        let seq = record.sequence().get(..).unwrap().to_vec();
        seqs.insert(name, seq);
    }

    Ok(seqs)
}

/// Slice a contig sequence with 1-based inclusive coordinates, clipped
/// to the sequence bounds.
///
/// ```
/// use mgec::libs::genome::subseq;
/// let seq = b"ACGTACGT";
/// assert_eq!(subseq(seq, 2, 4), b"CGT");
/// assert_eq!(subseq(seq, 7, 100), b"GT");
/// ```
pub fn subseq(seq: &[u8], start: u64, end: u64) -> &[u8] {
    let lo = (start.max(1) - 1) as usize;
    let hi = (end as usize).min(seq.len());
    if lo >= hi {
        return &[];
    }
    &seq[lo..hi]
}

/// Genome prefix from a FASTA path: the file stem minus compression
/// and format suffixes.
///
/// ```
/// use mgec::libs::genome::genome_prefix;
/// assert_eq!(genome_prefix("data/Ec_K12.fa.gz"), "Ec_K12");
/// assert_eq!(genome_prefix("Ec_O157.fasta"), "Ec_O157");
/// ```
pub fn genome_prefix(path: &str) -> String {
    let mut stem = std::path::Path::new(path)
        .file_name()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| path.to_string());

    for suffix in [".gz", ".fasta", ".fna", ".fa"] {
        if let Some(s) = stem.strip_suffix(suffix) {
            stem = s.to_string();
        }
    }
    stem
}
