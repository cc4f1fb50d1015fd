pub mod clust;
pub mod consensus;
pub mod layout;
pub mod mask;
pub mod merge;
pub mod reblast;
