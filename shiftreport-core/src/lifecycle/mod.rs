//! Report lifecycle: per-session state machine and the submission pipeline

mod machine;
mod submission;

pub use machine::ReportLifecycle;
pub use submission::{SubmissionError, SubmissionPipeline, SubmissionReceipt};
