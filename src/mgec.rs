extern crate clap;
use clap::*;

mod cmd_mgec;

fn main() -> anyhow::Result<()> {
    let app = Command::new("mgec")
        .version(crate_version!())
        .author(crate_authors!())
        .about("`mgec` - Mobile Genetic Element Consensus")
        .propagate_version(true)
        .arg_required_else_help(true)
        .color(ColorChoice::Auto)
        .subcommand(cmd_mgec::layout::make_subcommand())
        .subcommand(cmd_mgec::mask::make_subcommand())
        .subcommand(cmd_mgec::merge::make_subcommand())
        .subcommand(cmd_mgec::consensus::make_subcommand())
        .subcommand(cmd_mgec::reblast::make_subcommand())
        .subcommand(cmd_mgec::clust::make_subcommand())
        .after_help(
            r###"Subcommand groups:

* Ingestion surfaces:
    * layout - Genome/contig layout table from FASTA
    * mask   - Inspect an exclusion mask against a layout

* Consensus pipeline, in order:
    * merge     - Merge overlapping/nearby detector intervals
    * consensus - Bin predictions into confidence tiers
    * reblast   - Recover elements missed in sibling genomes
    * clust     - Group reconciled elements into clusters

"###,
        );

    // Check which subcomamnd the user ran...
    match app.get_matches().subcommand() {
        Some(("layout", sub_matches)) => cmd_mgec::layout::execute(sub_matches),
        Some(("mask", sub_matches)) => cmd_mgec::mask::execute(sub_matches),
        Some(("merge", sub_matches)) => cmd_mgec::merge::execute(sub_matches),
        Some(("consensus", sub_matches)) => cmd_mgec::consensus::execute(sub_matches),
        Some(("reblast", sub_matches)) => cmd_mgec::reblast::execute(sub_matches),
        Some(("clust", sub_matches)) => cmd_mgec::clust::execute(sub_matches),
        _ => unreachable!(),
    }?;

    Ok(())
}
