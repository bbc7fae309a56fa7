//! Inputs the engine consumes: ranked lists, gene sets, phenotype templates
//! and expression datasets.
pub mod dataset;
pub mod gene_set;
pub mod ranked_list;
pub mod template;

pub use dataset::Dataset;
pub use gene_set::GeneSet;
pub use ranked_list::{CrossoverRank, ListSide, RankedList, SortOrder};
pub use template::Template;
