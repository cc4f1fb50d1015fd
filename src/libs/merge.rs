use crate::libs::prediction::{MergedPrediction, RawPrediction};

//----------------------------
// Prediction merger
//----------------------------

/// Merge raw intervals from extending methods on one contig into
/// non-overlapping union spans.
///
/// Sort by (start, end), then sweep left to right keeping one open
/// span; an incoming interval joins when its start falls within the
/// open span or within `max_gap` of its end. Emitted spans never
/// overlap and come out in ascending start order; the result is
/// independent of input order.
///
/// Non-extending raws are ignored here; they re-enter at binning time
/// as corroboration.
///
/// ```
/// use mgec::libs::merge::merge_contig;
/// use mgec::libs::method::Method;
/// use mgec::libs::prediction::RawPrediction;
///
/// let raw = |m: Method, s: u64, e: u64| RawPrediction {
///     genome: "Ec1".to_string(),
///     contig: "ctg1".to_string(),
///     method: m,
///     start: s,
///     end: e,
/// };
/// let merged = merge_contig(
///     &[
///         raw(Method::Agent, 100, 200),
///         raw(Method::VirSorter, 150, 250),
///         raw(Method::Crispr, 900, 950),
///     ],
///     0,
/// );
/// assert_eq!(merged.len(), 1);
/// assert_eq!((merged[0].start, merged[0].end), (100, 250));
/// assert_eq!(merged[0].methods, vec![Method::Agent, Method::VirSorter]);
/// ```
pub fn merge_contig(raws: &[RawPrediction], max_gap: u64) -> Vec<MergedPrediction> {
    let mut sorted: Vec<&RawPrediction> = raws.iter().filter(|r| r.method.is_extending()).collect();
    sorted.sort_by_key(|r| (r.start, r.end, r.method));

    let mut merged: Vec<MergedPrediction> = vec![];
    let mut open: Option<MergedPrediction> = None;

    for raw in sorted {
        match open.as_mut() {
            Some(span) if raw.start <= span.end.saturating_add(max_gap) => {
                span.end = span.end.max(raw.end);
                span.add_method(raw.method);
            }
            _ => {
                if let Some(span) = open.take() {
                    merged.push(span);
                }
                open = Some(MergedPrediction {
                    genome: raw.genome.clone(),
                    contig: raw.contig.clone(),
                    start: raw.start,
                    end: raw.end,
                    methods: vec![raw.method],
                });
            }
        }
    }
    if let Some(span) = open.take() {
        merged.push(span);
    }

    merged
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::libs::method::Method;

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
    fn spans_never_overlap() {
        let raws = vec![
            raw(Method::Agent, 100, 500),
            raw(Method::VirSorter, 200, 300),
            raw(Method::Blaster, 450, 900),
            raw(Method::Agent, 2000, 2500),
            raw(Method::VirSorter, 2400, 2600),
        ];
        let merged = merge_contig(&raws, 0);
        assert_eq!(merged.len(), 2);
        for pair in merged.windows(2) {
            assert!(pair[0].end < pair[1].start);
        }
        assert_eq!((merged[0].start, merged[0].end), (100, 900));
        assert_eq!(
            merged[0].methods,
            vec![Method::Agent, Method::VirSorter, Method::Blaster]
        );
    }

    #[test]
    fn nearby_joins_within_gap() {
        let raws = vec![raw(Method::Agent, 100, 200), raw(Method::VirSorter, 250, 400)];
        assert_eq!(merge_contig(&raws, 0).len(), 2);

        let merged = merge_contig(&raws, 100);
        assert_eq!(merged.len(), 1);
        assert_eq!((merged[0].start, merged[0].end), (100, 400));
    }

    #[test]
    fn deterministic_under_input_order() {
        let mut raws = vec![
            raw(Method::Blaster, 450, 900),
            raw(Method::Agent, 100, 500),
            raw(Method::VirSorter, 200, 300),
            raw(Method::Agent, 2000, 2500),
        ];
        let forward = merge_contig(&raws, 0);
        raws.reverse();
        assert_eq!(merge_contig(&raws, 0), forward);
    }

    #[test]
    fn non_extending_are_ignored() {
        let raws = vec![raw(Method::Crispr, 100, 200)];
        assert!(merge_contig(&raws, 0).is_empty());
    }

    #[test]
    fn coordinates_near_u64_max_do_not_panic() {
        let raws = vec![
            raw(Method::Agent, 1, 100),
            raw(Method::VirSorter, u64::MAX - 10, u64::MAX),
        ];
        let merged = merge_contig(&raws, 3000);
        assert_eq!(merged.len(), 2);
        assert_eq!((merged[1].start, merged[1].end), (u64::MAX - 10, u64::MAX));

        // with the gap saturated, anything to the right of the span joins it
        let merged = merge_contig(&raws, u64::MAX);
        assert_eq!(merged.len(), 1);
    }

    #[test]
    fn duplicate_methods_dedup() {
        let raws = vec![raw(Method::Agent, 100, 200), raw(Method::Agent, 150, 300)];
        let merged = merge_contig(&raws, 0);
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].methods, vec![Method::Agent]);
    }
}
