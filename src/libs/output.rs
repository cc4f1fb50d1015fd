use crate::libs::prediction::{BinnedPrediction, GenomeBins};
use std::io::BufRead;

//----------------------------
// Tiered TSV
//----------------------------

/// The single tiered-output routine shared by the consensus and
/// reconciliation passes.
///
/// One line per prediction, grouped by tier in file order. The final
/// form is the 5-column `name \t contig \t methods \t start \t end`
/// with masked predictions withheld; the full form keeps masked rows
/// and appends tier and masked columns so later passes can reload the
/// complete structure.
pub fn write_bins(outfile: &str, bins: &GenomeBins, full: bool) -> anyhow::Result<()> {
    let mut writer = crate::writer(outfile);

    for preds in bins.values() {
        for pred in preds {
            if pred.masked && !full {
                continue;
            }
            writer.write_fmt(format_args!("{}\n", pred.to_line(full)))?;
        }
    }

    Ok(())
}

/// Reload a tiered file (either form) into per-tier lists. Malformed
/// lines are dropped with a note on stderr.
pub fn read_bins(infile: &str, genome: &str) -> anyhow::Result<GenomeBins> {
    let mut bins = GenomeBins::new();
    for tier in crate::libs::prediction::Tier::ALL {
        bins.insert(tier, vec![]);
    }

    let reader = crate::reader(infile);
    for line in reader.lines() {
        let line = line?;
        if line.is_empty() {
            continue;
        }
        match BinnedPrediction::parse(&line, genome) {
            Some(pred) => bins.get_mut(&pred.tier).unwrap().push(pred),
            None => eprintln!("Dropped malformed prediction line: {}", line),
        }
    }

    Ok(bins)
}

/// Highest numeric `<prefix>_<n>` suffix in use, so reconciliation can
/// continue the series.
pub fn max_name_index(bins: &GenomeBins) -> usize {
    bins.values()
        .flatten()
        .filter_map(|p| p.name.rsplit('_').next())
        .filter_map(|n| n.parse::<usize>().ok())
        .max()
        .unwrap_or(0)
}
