use crate::libs::method::{join_methods, parse_methods, Method};
use std::collections::BTreeMap;

//----------------------------
// Raw predictions
//----------------------------

/// One interval emitted by a detection-method adapter.
/// Contig-local 1-based inclusive coordinates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawPrediction {
    pub genome: String,
    pub contig: String,
    pub method: Method,
    pub start: u64,
    pub end: u64,
}

impl RawPrediction {
    /// Parse a `genome \t contig \t method \t start \t end` line.
    /// Returns None for malformed lines, unknown method tags and
    /// inverted intervals; callers decide whether to log the drop.
    ///
    /// ```
    /// use mgec::libs::prediction::RawPrediction;
    /// let raw = RawPrediction::parse("Ec1\tctg1\tagent\t100\t200").unwrap();
    /// assert_eq!(raw.start, 100);
    /// assert!(RawPrediction::parse("Ec1\tctg1\tagent\t300\t200").is_none());
    /// assert!(RawPrediction::parse("Ec1\tctg1\tmystery\t100\t200").is_none());
    /// ```
    pub fn parse(line: &str) -> Option<RawPrediction> {
        let fields: Vec<&str> = line.split('\t').collect();
        if fields.len() < 5 {
            return None;
        }
        let method = Method::parse(fields[2])?;
        let start = fields[3].parse::<u64>().ok()?;
        let end = fields[4].parse::<u64>().ok()?;
        if start > end {
            return None;
        }
        Some(RawPrediction {
            genome: fields[0].to_string(),
            contig: fields[1].to_string(),
            method,
            start,
            end,
        })
    }
}

//----------------------------
// Merged predictions
//----------------------------

/// The union span of one or more raw intervals on a contig, with the
/// deduplicated, first-contribution-ordered set of method tags.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergedPrediction {
    pub genome: String,
    pub contig: String,
    pub start: u64,
    pub end: u64,
    pub methods: Vec<Method>,
}

impl MergedPrediction {
    pub fn overlaps(&self, start: u64, end: u64) -> bool {
        self.start <= end && start <= self.end
    }

    /// Append a method tag unless already present.
    pub fn add_method(&mut self, method: Method) {
        if !self.methods.contains(&method) {
            self.methods.push(method);
        }
    }
}

impl std::fmt::Display for MergedPrediction {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        writeln!(
            f,
            "{}\t{}\t{}\t{}\t{}",
            self.genome,
            self.contig,
            join_methods(&self.methods),
            self.start,
            self.end
        )
    }
}

//----------------------------
// Confidence tiers
//----------------------------

/// Five ordered consensus tiers, highest confidence first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Tier {
    Tier1,
    Tier2,
    Tier3,
    Tier4,
    Tier5,
}

impl Tier {
    pub const ALL: [Tier; 5] = [Tier::Tier1, Tier::Tier2, Tier::Tier3, Tier::Tier4, Tier::Tier5];

    /// Tier from the contributing-method set alone; coordinates never
    /// enter into it.
    ///
    /// ```
    /// use mgec::libs::method::Method;
    /// use mgec::libs::prediction::Tier;
    /// assert_eq!(
    ///     Tier::assign(&[Method::Agent, Method::VirSorter, Method::Crispr]),
    ///     Tier::Tier1
    /// );
    /// assert_eq!(Tier::assign(&[Method::Agent, Method::VirSorter]), Tier::Tier2);
    /// assert_eq!(Tier::assign(&[Method::Agent]), Tier::Tier3);
    /// assert_eq!(Tier::assign(&[Method::Reblast]), Tier::Tier4);
    /// assert_eq!(Tier::assign(&[Method::Crispr]), Tier::Tier5);
    /// ```
    pub fn assign(methods: &[Method]) -> Tier {
        match methods.len() {
            n if n > 2 => Tier::Tier1,
            2 => Tier::Tier2,
            1 => {
                let m = methods[0];
                if !m.is_extending() {
                    Tier::Tier5
                } else if m.is_primary() {
                    Tier::Tier3
                } else {
                    Tier::Tier4
                }
            }
            _ => Tier::Tier5,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Tier::Tier1 => "tier1",
            Tier::Tier2 => "tier2",
            Tier::Tier3 => "tier3",
            Tier::Tier4 => "tier4",
            Tier::Tier5 => "tier5",
        }
    }
}

impl std::fmt::Display for Tier {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

//----------------------------
// Binned predictions
//----------------------------

/// A tiered prediction. `masked` predictions are excluded from output
/// but stay in the structure so reconciliation can still see them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BinnedPrediction {
    pub name: String,
    pub genome: String,
    pub contig: String,
    pub methods: Vec<Method>,
    pub start: u64,
    pub end: u64,
    pub tier: Tier,
    pub masked: bool,
}

impl BinnedPrediction {
    pub fn overlaps(&self, contig: &str, start: u64, end: u64) -> bool {
        self.contig == contig && self.start <= end && start <= self.end
    }

    /// Parse one line of a tiered file, final 5-column or full
    /// 7-column form. The tier is recomputed from the method set when
    /// absent; it depends only on the method set, so both forms round
    /// trip.
    pub fn parse(line: &str, genome: &str) -> Option<BinnedPrediction> {
        let fields: Vec<&str> = line.split('\t').collect();
        if fields.len() < 5 {
            return None;
        }
        let methods = parse_methods(fields[2]);
        if methods.is_empty() {
            return None;
        }
        let start = fields[3].parse::<u64>().ok()?;
        let end = fields[4].parse::<u64>().ok()?;
        if start > end {
            return None;
        }
        let masked = if fields.len() >= 7 {
            fields[6] == "1"
        } else {
            false
        };
        let tier = Tier::assign(&methods);
        Some(BinnedPrediction {
            name: fields[0].to_string(),
            genome: genome.to_string(),
            contig: fields[1].to_string(),
            methods,
            start,
            end,
            tier,
            masked,
        })
    }

    pub fn to_line(&self, full: bool) -> String {
        if full {
            format!(
                "{}\t{}\t{}\t{}\t{}\t{}\t{}",
                self.name,
                self.contig,
                join_methods(&self.methods),
                self.start,
                self.end,
                self.tier,
                if self.masked { 1 } else { 0 }
            )
        } else {
            format!(
                "{}\t{}\t{}\t{}\t{}",
                self.name,
                self.contig,
                join_methods(&self.methods),
                self.start,
                self.end
            )
        }
    }
}

/// Per-genome tiered lists, keyed by tier so positional indexing bugs
/// cannot arise.
pub type GenomeBins = BTreeMap<Tier, Vec<BinnedPrediction>>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tier_exhaustive_on_method_sets() {
        // every non-empty subset of tags lands in exactly one tier
        let tags = [
            Method::Agent,
            Method::VirSorter,
            Method::Blaster,
            Method::Crispr,
        ];
        for bits in 1u32..16 {
            let set: Vec<Method> = tags
                .iter()
                .enumerate()
                .filter(|(i, _)| bits & (1 << i) != 0)
                .map(|(_, m)| *m)
                .collect();
            let tier = Tier::assign(&set);
            assert!(Tier::ALL.contains(&tier));
        }
    }

    #[test]
    fn binned_round_trip() {
        let p = BinnedPrediction {
            name: "Ec1_1".to_string(),
            genome: "Ec1".to_string(),
            contig: "ctg1".to_string(),
            methods: vec![Method::Agent, Method::VirSorter],
            start: 100,
            end: 250,
            tier: Tier::Tier2,
            masked: true,
        };
        let back = BinnedPrediction::parse(&p.to_line(true), "Ec1").unwrap();
        assert_eq!(back, p);

        // the final form drops the masked flag
        let back = BinnedPrediction::parse(&p.to_line(false), "Ec1").unwrap();
        assert!(!back.masked);
        assert_eq!(back.tier, Tier::Tier2);
    }
}
