pub mod analysis;
pub mod feedback;
pub mod formatter;
pub mod pipeline;
pub mod prompt;
pub mod scores;

pub use feedback::{persist_results, FeedbackAssembler};
pub use pipeline::AnalysisPipeline;
