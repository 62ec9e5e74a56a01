mod analyze_pr;

pub use analyze_pr::{AnalyzePrJob, aggregate, process_analyze_pr_job};
