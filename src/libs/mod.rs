pub mod phylo;
