use crate::libs::genome::GenomeSet;
use std::collections::HashMap;
use std::io::BufRead;

//----------------------------
// Mask store
//----------------------------

/// User-declared excluded regions, held per (genome, contig) as an
/// [intspan::IntSpan] in contig-local coordinates.
///
/// Loaded once, read-only afterwards; with no mask file every check is
/// a no-op.
#[derive(Debug, Default)]
pub struct MaskStore {
    spans: HashMap<(String, String), intspan::IntSpan>,
}

impl MaskStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.spans.is_empty()
    }

    /// Parse a mask file of `genome \t start \t end` lines in
    /// genome-global 1-based coordinates. A line spanning several
    /// contigs yields one clipped interval per overlapped contig.
    /// Malformed lines and unknown genomes are skipped; inverted
    /// intervals are dropped with a note on stderr. Never fatal.
    pub fn load(input: &str, set: &GenomeSet) -> MaskStore {
        let mut store = MaskStore::new();
        let reader = crate::reader(input);

        for line in reader.lines() {
            let Ok(line) = line else {
                continue;
            };
            let fields: Vec<&str> = line.split('\t').collect();
            if fields.len() < 3 {
                continue;
            }
            let (Ok(start), Ok(end)) = (fields[1].parse::<u64>(), fields[2].parse::<u64>()) else {
                continue;
            };
            if start > end {
                eprintln!("Dropped inverted mask interval: {}", line);
                continue;
            }
            if set.genome(fields[0]).is_none() {
                continue;
            }

            for ctg in set.contigs(fields[0]) {
                if let Some((lo, hi)) = ctg.clip_global(start, end) {
                    // the span store is i32-native
                    if hi > i32::MAX as u64 {
                        eprintln!("Dropped out-of-range mask interval: {}", line);
                        continue;
                    }
                    store
                        .spans
                        .entry((fields[0].to_string(), ctg.id.clone()))
                        .or_insert_with(intspan::IntSpan::new)
                        .add_pair(lo as i32, hi as i32);
                }
            }
        }

        store
    }

    /// Does a contig-local interval overlap any mask for its contig?
    pub fn is_masked(&self, genome: &str, contig: &str, start: u64, end: u64) -> bool {
        let Some(spans) = self
            .spans
            .get(&(genome.to_string(), contig.to_string()))
        else {
            return false;
        };
        // stored spans never pass i32::MAX, so clamping cannot create
        // a spurious overlap
        let lo = start.min(i32::MAX as u64) as i32;
        let hi = end.min(i32::MAX as u64) as i32;
        !spans
            .intersect(&intspan::IntSpan::from_pair(lo, hi))
            .is_empty()
    }

    /// Clipped per-contig intervals, for inspection output.
    pub fn intervals(&self) -> Vec<(String, String, u64, u64)> {
        let mut result = vec![];
        for ((genome, contig), spans) in &self.spans {
            for (lo, hi) in spans.spans() {
                result.push((genome.clone(), contig.clone(), lo as u64, hi as u64));
            }
        }
        result.sort();
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use indexmap::IndexMap;
    use std::io::Write;

    fn two_contig_set() -> GenomeSet {
        let mut set = GenomeSet::new();
        let mut seqs = IndexMap::new();
        seqs.insert("ctg1".to_string(), vec![b'A'; 1000]);
        seqs.insert("ctg2".to_string(), vec![b'A'; 1000]);
        set.add_genome("Ec1", "fasta", &seqs);
        set
    }

    #[test]
    fn load_clips_to_contigs() {
        let set = two_contig_set();

        let mut file = tempfile::NamedTempFile::new().unwrap();
        // spans the ctg1/ctg2 boundary; second line names an unknown
        // genome; third is malformed
        writeln!(file, "Ec1\t900\t1200").unwrap();
        writeln!(file, "Zz9\t1\t100").unwrap();
        writeln!(file, "Ec1\toops\t100").unwrap();
        file.flush().unwrap();

        let store = MaskStore::load(file.path().to_str().unwrap(), &set);
        assert_eq!(
            store.intervals(),
            vec![
                ("Ec1".to_string(), "ctg1".to_string(), 900, 1000),
                ("Ec1".to_string(), "ctg2".to_string(), 1, 200),
            ]
        );

        assert!(store.is_masked("Ec1", "ctg1", 950, 960));
        assert!(store.is_masked("Ec1", "ctg2", 150, 400));
        assert!(!store.is_masked("Ec1", "ctg2", 300, 400));
        assert!(!store.is_masked("Zz9", "ctg1", 1, 1000));
    }

    #[test]
    fn out_of_range_mask_intervals_dropped() {
        let mut layout = tempfile::NamedTempFile::new().unwrap();
        writeln!(layout, "# Big\tBig\t9000000000\t1\tfasta").unwrap();
        writeln!(layout, "Big\tctg1\t1\t9000000000\t9000000000").unwrap();
        layout.flush().unwrap();
        let set = GenomeSet::from_layout(layout.path().to_str().unwrap()).unwrap();

        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "Big\t100\t200").unwrap();
        writeln!(file, "Big\t3000000000\t3000000100").unwrap();
        file.flush().unwrap();

        let store = MaskStore::load(file.path().to_str().unwrap(), &set);
        assert_eq!(
            store.intervals(),
            vec![("Big".to_string(), "ctg1".to_string(), 100, 200)]
        );

        assert!(store.is_masked("Big", "ctg1", 150, 160));
        // queries past the span range clamp instead of wrapping
        assert!(!store.is_masked("Big", "ctg1", 5_000_000_000, 6_000_000_000));
    }

    #[test]
    fn empty_store_is_noop() {
        let store = MaskStore::new();
        assert!(store.is_empty());
        assert!(!store.is_masked("Ec1", "ctg1", 1, 1_000_000));
    }
}
