//! Subcommand implementation modules

pub mod distance;
pub mod diversity;
pub mod format;
pub mod prune;
pub mod reroot;
pub mod resolve;
pub mod stat;
pub mod topo;
pub mod utils;
