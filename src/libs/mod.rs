pub mod cluster;
pub mod consensus;
pub mod genome;
pub mod io;
pub mod mask;
pub mod merge;
pub mod method;
pub mod output;
pub mod prediction;
pub mod reblast;
