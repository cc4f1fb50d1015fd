use crate::libs::mask::MaskStore;
use crate::libs::merge::merge_contig;
use crate::libs::prediction::{BinnedPrediction, GenomeBins, RawPrediction, Tier};
use indexmap::IndexMap;

//----------------------------
// Consensus binner
//----------------------------

/// Merge and tier one genome's raw predictions.
///
/// Per contig, extending raws are merged into union spans; each
/// non-extending raw overlapping a span joins its method set as
/// corroboration (and so counts toward the tier), while a standalone
/// one becomes its own lowest-tier prediction. Every prediction is
/// then mask-checked; masked ones keep their slot in the structure but
/// are excluded from output.
///
/// Names are assigned `<prefix>_<n>` in tier order, then by
/// (contig, start).
pub fn bin_genome(
    prefix: &str,
    raws: &[RawPrediction],
    mask: &MaskStore,
    max_gap: u64,
) -> GenomeBins {
    let mut by_contig: IndexMap<&str, Vec<RawPrediction>> = IndexMap::new();
    for raw in raws {
        by_contig.entry(&raw.contig).or_default().push(raw.clone());
    }

    let mut candidates: Vec<BinnedPrediction> = vec![];

    for (contig, contig_raws) in &by_contig {
        let mut merged = merge_contig(contig_raws, max_gap);

        for raw in contig_raws.iter().filter(|r| !r.method.is_extending()) {
            match merged
                .iter_mut()
                .find(|span| span.overlaps(raw.start, raw.end))
            {
                Some(span) => span.add_method(raw.method),
                None => candidates.push(BinnedPrediction {
                    name: String::new(),
                    genome: prefix.to_string(),
                    contig: contig.to_string(),
                    methods: vec![raw.method],
                    start: raw.start,
                    end: raw.end,
                    tier: Tier::Tier5,
                    masked: false,
                }),
            }
        }

        for span in merged {
            let tier = Tier::assign(&span.methods);
            candidates.push(BinnedPrediction {
                name: String::new(),
                genome: span.genome,
                contig: span.contig,
                methods: span.methods,
                start: span.start,
                end: span.end,
                tier,
                masked: false,
            });
        }
    }

    for cand in candidates.iter_mut() {
        cand.masked = mask.is_masked(prefix, &cand.contig, cand.start, cand.end);
    }

    candidates.sort_by(|a, b| {
        (a.tier, &a.contig, a.start, a.end).cmp(&(b.tier, &b.contig, b.start, b.end))
    });

    let mut bins = GenomeBins::new();
    for tier in Tier::ALL {
        bins.insert(tier, vec![]);
    }
    for (i, mut cand) in candidates.into_iter().enumerate() {
        cand.name = format!("{}_{}", prefix, i + 1);
        bins.get_mut(&cand.tier).unwrap().push(cand);
    }

    bins
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::libs::genome::GenomeSet;
    use crate::libs::method::Method;
    use std::io::Write;

    fn raw(m: Method, s: u64, e: u64) -> RawPrediction {
        RawPrediction {
            genome: "Ec1".to_string(),
            contig: "ctg1".to_string(),
            method: m,
            start: s,
            end: e,
        }
    }

    #[test]
    fn worked_example() {
        // [100,200] agent + [150,250] virsorter merge to tier2;
        // [900,950] crispr stands alone at tier5
        let raws = vec![
            raw(Method::Agent, 100, 200),
            raw(Method::VirSorter, 150, 250),
            raw(Method::Crispr, 900, 950),
        ];
        let bins = bin_genome("Ec1", &raws, &MaskStore::new(), 0);

        let tier2 = &bins[&Tier::Tier2];
        assert_eq!(tier2.len(), 1);
        assert_eq!((tier2[0].start, tier2[0].end), (100, 250));
        assert_eq!(tier2[0].name, "Ec1_1");

        let tier5 = &bins[&Tier::Tier5];
        assert_eq!(tier5.len(), 1);
        assert_eq!((tier5[0].start, tier5[0].end), (900, 950));
        assert_eq!(tier5[0].methods, vec![Method::Crispr]);
    }

    #[test]
    fn crispr_corroborates_overlapping_span() {
        let raws = vec![
            raw(Method::VirSorter, 100, 200),
            raw(Method::Crispr, 150, 180),
        ];
        let bins = bin_genome("Ec1", &raws, &MaskStore::new(), 0);

        // corroboration lifts the single-method span to two methods
        let tier2 = &bins[&Tier::Tier2];
        assert_eq!(tier2.len(), 1);
        assert_eq!(
            tier2[0].methods,
            vec![Method::VirSorter, Method::Crispr]
        );
        assert!(bins[&Tier::Tier5].is_empty());
    }

    #[test]
    fn tier_split_by_method_class() {
        let raws = vec![
            raw(Method::Agent, 100, 200),
            raw(Method::VirSorter, 1000, 1200),
        ];
        let bins = bin_genome("Ec1", &raws, &MaskStore::new(), 0);
        assert_eq!(bins[&Tier::Tier3].len(), 1);
        assert_eq!(bins[&Tier::Tier4].len(), 1);
    }

    #[test]
    fn mask_flags_but_retains() {
        let mut set = GenomeSet::new();
        let mut seqs = indexmap::IndexMap::new();
        seqs.insert("ctg1".to_string(), vec![b'A'; 1000]);
        set.add_genome("Ec1", "fasta", &seqs);

        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "Ec1\t180\t210").unwrap();
        file.flush().unwrap();
        let mask = MaskStore::load(file.path().to_str().unwrap(), &set);

        let raws = vec![
            raw(Method::Agent, 100, 200),
            raw(Method::VirSorter, 150, 250),
        ];
        let bins = bin_genome("Ec1", &raws, &mask, 0);
        let tier2 = &bins[&Tier::Tier2];
        assert_eq!(tier2.len(), 1);
        assert!(tier2[0].masked);
    }

    #[test]
    fn masking_is_idempotent() {
        let mut set = GenomeSet::new();
        let mut seqs = indexmap::IndexMap::new();
        seqs.insert("ctg1".to_string(), vec![b'A'; 1000]);
        set.add_genome("Ec1", "fasta", &seqs);

        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "Ec1\t180\t210").unwrap();
        file.flush().unwrap();
        let mask = MaskStore::load(file.path().to_str().unwrap(), &set);

        let raws = vec![
            raw(Method::Agent, 100, 200),
            raw(Method::Crispr, 900, 950),
        ];
        let once = bin_genome("Ec1", &raws, &mask, 0);

        let mut twice = once.clone();
        for preds in twice.values_mut() {
            for p in preds.iter_mut() {
                p.masked = mask.is_masked("Ec1", &p.contig, p.start, p.end);
            }
        }
        assert_eq!(twice, once);
    }
}
