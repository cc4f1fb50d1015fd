use crate::libs::genome::{subseq, GenomeSet};
use crate::libs::mask::MaskStore;
use crate::libs::method::Method;
use crate::libs::output::max_name_index;
use crate::libs::prediction::{BinnedPrediction, GenomeBins, Tier};
use indexmap::IndexMap;
use rayon::prelude::*;
use std::collections::BTreeMap;
use std::io::Write;
use std::path::PathBuf;

//----------------------------
// Similarity search
//----------------------------

/// One accepted alignment of a query element against a target genome,
/// in target contig-local 1-based coordinates.
#[derive(Debug, Clone)]
pub struct Hit {
    pub contig: String,
    pub start: u64,
    pub end: u64,
    pub identity: f64,
    pub length: u64,
}

/// Seam to the external sequence-similarity tool, so reconciliation
/// logic can be exercised without a blastn install.
pub trait SimilaritySearch: Sync {
    /// Align a query sequence against one target genome's full
    /// sequence.
    fn search(&self, query: &[u8], target: &str) -> anyhow::Result<Vec<Hit>>;
}

/// blastn-backed search; one `-subject` invocation per (query,
/// target) comparison.
pub struct Blastn {
    targets: BTreeMap<String, PathBuf>,
}

impl Blastn {
    /// Fails when blastn is not in PATH; a missing external tool is a
    /// configuration error for this stage.
    pub fn new(targets: BTreeMap<String, PathBuf>) -> anyhow::Result<Self> {
        if which::which("blastn").is_err() {
            anyhow::bail!("blastn not found in PATH. Please install BLAST+ first.");
        }
        Ok(Self { targets })
    }
}

impl SimilaritySearch for Blastn {
    fn search(&self, query: &[u8], target: &str) -> anyhow::Result<Vec<Hit>> {
        let Some(target_fa) = self.targets.get(target) else {
            anyhow::bail!("no sequence file registered for genome {}", target);
        };

        let mut query_fa = tempfile::NamedTempFile::new()?;
        query_fa.write_all(b">query\n")?;
        query_fa.write_all(query)?;
        query_fa.write_all(b"\n")?;
        query_fa.flush()?;

        let output = std::process::Command::new("blastn")
            .arg("-query")
            .arg(query_fa.path())
            .arg("-subject")
            .arg(target_fa)
            .arg("-outfmt")
            .arg("6 sseqid sstart send pident length")
            .output()?;

        if !output.status.success() {
            anyhow::bail!(
                "blastn failed against {}: {}",
                target,
                String::from_utf8_lossy(&output.stderr)
            );
        }

        let mut hits = vec![];
        for line in String::from_utf8_lossy(&output.stdout).lines() {
            let fields: Vec<&str> = line.split('\t').collect();
            if fields.len() < 5 {
                continue;
            }
            let (Ok(s), Ok(e)) = (fields[1].parse::<u64>(), fields[2].parse::<u64>()) else {
                continue;
            };
            let (Ok(identity), Ok(length)) = (fields[3].parse::<f64>(), fields[4].parse::<u64>())
            else {
                continue;
            };
            // minus-strand alignments report inverted subject coords
            let (start, end) = if s <= e { (s, e) } else { (e, s) };
            hits.push(Hit {
                contig: fields[0].to_string(),
                start,
                end,
                identity,
                length,
            });
        }

        Ok(hits)
    }
}

//----------------------------
// Reconciler
//----------------------------

/// Cross-genome recovery pass. Every genome's unmasked binned
/// predictions are searched against every other genome; an accepted
/// hit at an uncovered target locus becomes a new `reblast`
/// prediction.
pub struct Reconciler<'a> {
    pub set: &'a GenomeSet,
    pub mask: &'a MaskStore,
    pub min_identity: f64,
    pub min_len: u64,
}

impl Reconciler<'_> {
    /// Run reconciliation over all genome pairs. Strictly additive:
    /// existing predictions are never removed or re-tiered, and a run
    /// over an already-reconciled set adds nothing.
    ///
    /// Searches run in parallel over (query, target) pairs; accepted
    /// hits are then resolved serially in a deterministic order, so
    /// the coverage check and the append cannot interleave and the
    /// final set does not depend on pair scheduling.
    ///
    /// Returns the number of predictions added.
    pub fn reconcile(
        &self,
        bins: &mut BTreeMap<String, GenomeBins>,
        seqs: &BTreeMap<String, IndexMap<String, Vec<u8>>>,
        search: &dyn SimilaritySearch,
    ) -> usize {
        // query snapshot: unmasked predictions with a resolvable sequence
        let mut queries: Vec<(&BinnedPrediction, &[u8])> = vec![];
        for (prefix, genome_bins) in bins.iter() {
            let Some(contigs) = seqs.get(prefix) else {
                eprintln!("No sequences for genome {}, skipped as query", prefix);
                continue;
            };
            for pred in genome_bins.values().flatten().filter(|p| !p.masked) {
                match contigs.get(&pred.contig) {
                    Some(seq) => queries.push((pred, subseq(seq, pred.start, pred.end))),
                    None => eprintln!(
                        "Dropped query {}: unknown contig {}",
                        pred.name, pred.contig
                    ),
                }
            }
        }

        let targets: Vec<&String> = bins.keys().collect();

        // phase 1: all pairwise searches, degrading failures to "no hits"
        let mut candidates: Vec<BinnedPrediction> = queries
            .par_iter()
            .flat_map(|(pred, query_seq)| {
                targets
                    .par_iter()
                    .filter(|t| t.as_str() != pred.genome)
                    .flat_map(|target| {
                        let hits = match search.search(query_seq, target) {
                            Ok(hits) => hits,
                            Err(why) => {
                                eprintln!(
                                    "Search {} vs {} failed, treated as no hits: {}",
                                    pred.name, target, why
                                );
                                vec![]
                            }
                        };
                        hits.into_iter()
                            .filter(|h| {
                                h.identity >= self.min_identity && h.length >= self.min_len
                            })
                            .filter_map(|h| self.synthesize(target, &h))
                            .collect::<Vec<_>>()
                    })
                    .collect::<Vec<_>>()
            })
            .collect();

        // phase 2: deterministic resolution; the coverage check
        // subsumes both pre-existing predictions (masked included) and
        // ones accepted earlier in this pass
        candidates.sort_by(|a, b| {
            (&a.genome, &a.contig, a.start, a.end).cmp(&(&b.genome, &b.contig, b.start, b.end))
        });

        let mut added = 0;
        for cand in candidates {
            let Some(genome_bins) = bins.get_mut(&cand.genome) else {
                continue;
            };
            let covered = genome_bins
                .values()
                .flatten()
                .any(|p| p.overlaps(&cand.contig, cand.start, cand.end));
            if covered {
                continue;
            }

            let mut cand = cand;
            cand.name = format!("{}_{}", cand.genome, max_name_index(genome_bins) + 1);
            genome_bins.get_mut(&cand.tier).unwrap().push(cand);
            added += 1;
        }

        added
    }

    /// Build the unnamed prediction for one accepted hit, dropping
    /// hits on contigs the target genome does not have.
    fn synthesize(&self, target: &str, hit: &Hit) -> Option<BinnedPrediction> {
        let ctg = self.set.contig(target, &hit.contig)?;
        let end = hit.end.min(ctg.length());
        if hit.start > end {
            return None;
        }

        let methods = vec![Method::Reblast];
        let tier = Tier::assign(&methods);
        Some(BinnedPrediction {
            name: String::new(),
            genome: target.to_string(),
            contig: hit.contig.clone(),
            methods,
            start: hit.start,
            end,
            tier,
            masked: self.mask.is_masked(target, &hit.contig, hit.start, end),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::libs::consensus::bin_genome;
    use crate::libs::prediction::RawPrediction;

    /// Canned hits per target genome, standing in for blastn.
    struct StubSearch {
        hits: BTreeMap<String, Vec<Hit>>,
    }

    impl SimilaritySearch for StubSearch {
        fn search(&self, _query: &[u8], target: &str) -> anyhow::Result<Vec<Hit>> {
            Ok(self.hits.get(target).cloned().unwrap_or_default())
        }
    }

    fn hit(contig: &str, start: u64, end: u64, identity: f64) -> Hit {
        Hit {
            contig: contig.to_string(),
            start,
            end,
            identity,
            length: end - start + 1,
        }
    }

    fn fixture() -> (GenomeSet, BTreeMap<String, IndexMap<String, Vec<u8>>>) {
        let mut set = GenomeSet::new();
        let mut seqs = BTreeMap::new();
        for prefix in ["Ec1", "Ec2"] {
            let mut contigs = IndexMap::new();
            contigs.insert("ctg1".to_string(), vec![b'A'; 10_000]);
            set.add_genome(prefix, "fasta", &contigs);
            seqs.insert(prefix.to_string(), contigs);
        }
        (set, seqs)
    }

    fn binned(prefix: &str, raws: &[RawPrediction]) -> GenomeBins {
        bin_genome(prefix, raws, &MaskStore::new(), 0)
    }

    fn raw(genome: &str, m: Method, s: u64, e: u64) -> RawPrediction {
        RawPrediction {
            genome: genome.to_string(),
            contig: "ctg1".to_string(),
            method: m,
            start: s,
            end: e,
        }
    }

    #[test]
    fn recovers_missed_locus() {
        let (set, seqs) = fixture();
        let mut bins = BTreeMap::new();
        bins.insert(
            "Ec1".to_string(),
            binned(
                "Ec1",
                &[
                    raw("Ec1", Method::Agent, 1000, 3000),
                    raw("Ec1", Method::VirSorter, 1500, 3200),
                ],
            ),
        );
        bins.insert("Ec2".to_string(), binned("Ec2", &[]));

        let mut hits = BTreeMap::new();
        hits.insert("Ec2".to_string(), vec![hit("ctg1", 4000, 6200, 97.5)]);
        let search = StubSearch { hits };

        let mask = MaskStore::new();
        let recon = Reconciler {
            set: &set,
            mask: &mask,
            min_identity: 90.0,
            min_len: 1000,
        };

        let added = recon.reconcile(&mut bins, &seqs, &search);
        assert_eq!(added, 1);

        let tier4 = &bins["Ec2"][&Tier::Tier4];
        assert_eq!(tier4.len(), 1);
        assert_eq!(tier4[0].methods, vec![Method::Reblast]);
        assert_eq!((tier4[0].start, tier4[0].end), (4000, 6200));
        assert_eq!(tier4[0].name, "Ec2_1");

        // strictly additive: the query genome is untouched
        assert_eq!(bins["Ec1"][&Tier::Tier2].len(), 1);
    }

    #[test]
    fn covered_locus_is_discarded() {
        let (set, seqs) = fixture();
        let mut bins = BTreeMap::new();
        bins.insert(
            "Ec1".to_string(),
            binned("Ec1", &[raw("Ec1", Method::Agent, 1000, 3000)]),
        );
        bins.insert(
            "Ec2".to_string(),
            binned("Ec2", &[raw("Ec2", Method::VirSorter, 4000, 5000)]),
        );

        let mut hits = BTreeMap::new();
        // overlaps Ec2's existing prediction
        hits.insert("Ec2".to_string(), vec![hit("ctg1", 4500, 6500, 98.0)]);
        let search = StubSearch { hits };

        let mask = MaskStore::new();
        let recon = Reconciler {
            set: &set,
            mask: &mask,
            min_identity: 90.0,
            min_len: 1000,
        };
        assert_eq!(recon.reconcile(&mut bins, &seqs, &search), 0);
    }

    #[test]
    fn masked_predictions_still_block_rederivation() {
        let (set, seqs) = fixture();

        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "Ec2\t4000\t5000").unwrap();
        file.flush().unwrap();
        let mask = MaskStore::load(file.path().to_str().unwrap(), &set);

        let mut bins = BTreeMap::new();
        bins.insert(
            "Ec1".to_string(),
            binned("Ec1", &[raw("Ec1", Method::Agent, 1000, 3000)]),
        );
        // Ec2's own prediction at the locus is masked, but must still
        // block a reblast duplicate there
        let mut ec2 = GenomeBins::new();
        for tier in Tier::ALL {
            ec2.insert(tier, vec![]);
        }
        ec2.get_mut(&Tier::Tier3).unwrap().push(BinnedPrediction {
            name: "Ec2_1".to_string(),
            genome: "Ec2".to_string(),
            contig: "ctg1".to_string(),
            methods: vec![Method::Agent],
            start: 4200,
            end: 5800,
            tier: Tier::Tier3,
            masked: true,
        });
        bins.insert("Ec2".to_string(), ec2);

        let mut hits = BTreeMap::new();
        hits.insert("Ec2".to_string(), vec![hit("ctg1", 4500, 6000, 98.0)]);
        let search = StubSearch { hits };

        let recon = Reconciler {
            set: &set,
            mask: &mask,
            min_identity: 90.0,
            min_len: 1000,
        };
        assert_eq!(recon.reconcile(&mut bins, &seqs, &search), 0);
    }

    #[test]
    fn rerun_adds_nothing() {
        let (set, seqs) = fixture();
        let mut bins = BTreeMap::new();
        bins.insert(
            "Ec1".to_string(),
            binned("Ec1", &[raw("Ec1", Method::Agent, 1000, 3000)]),
        );
        bins.insert("Ec2".to_string(), binned("Ec2", &[]));

        let mut hits = BTreeMap::new();
        hits.insert("Ec2".to_string(), vec![hit("ctg1", 4000, 6000, 97.0)]);
        let search = StubSearch { hits };

        let mask = MaskStore::new();
        let recon = Reconciler {
            set: &set,
            mask: &mask,
            min_identity: 90.0,
            min_len: 1000,
        };

        assert_eq!(recon.reconcile(&mut bins, &seqs, &search), 1);
        assert_eq!(recon.reconcile(&mut bins, &seqs, &search), 0);

        // locality: the synthesized span overlaps nothing pre-existing
        let ec2: Vec<_> = bins["Ec2"].values().flatten().collect();
        for (i, a) in ec2.iter().enumerate() {
            for b in ec2.iter().skip(i + 1) {
                assert!(!a.overlaps(&b.contig, b.start, b.end));
            }
        }
    }

    #[test]
    fn threshold_rejects_weak_hits() {
        let (set, seqs) = fixture();
        let mut bins = BTreeMap::new();
        bins.insert(
            "Ec1".to_string(),
            binned("Ec1", &[raw("Ec1", Method::Agent, 1000, 3000)]),
        );
        bins.insert("Ec2".to_string(), binned("Ec2", &[]));

        let mut hits = BTreeMap::new();
        hits.insert(
            "Ec2".to_string(),
            vec![hit("ctg1", 4000, 6000, 75.0), hit("ctg1", 7000, 7400, 99.0)],
        );
        let search = StubSearch { hits };

        let mask = MaskStore::new();
        let recon = Reconciler {
            set: &set,
            mask: &mask,
            min_identity: 90.0,
            min_len: 1000,
        };
        // one too diverged, one too short
        assert_eq!(recon.reconcile(&mut bins, &seqs, &search), 0);
    }
}
