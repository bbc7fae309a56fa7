pub mod cohort;
pub mod gsea;
pub mod ks_core;
pub mod metric;
pub mod pvalue;
pub mod results;
pub mod scoring;
