pub mod analyze;

pub use analyze::{AnalysisReport, AnalyzeHandler};
