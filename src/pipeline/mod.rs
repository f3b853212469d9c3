//! The cascading match pipeline.
//!
//! Stage 1 keeps pairs with similar page counts, Stage 2 keeps pairs whose leading text
//! is similar enough, Stage 3 sends the survivors, best first, to the verification
//! service until the budget is spent. Each stage only narrows its input.

pub mod cancel;
pub mod config;
pub mod error;
pub mod report;
pub mod runner;
pub mod stage1;
pub mod stage2;
pub mod stage3;
pub mod types;


pub use cancel::CancelFlag;
pub use config::PipelineConfig;
pub use error::{PipelineError, PipelineResult};
pub use report::{ConfidenceBands, PipelineReport, ReportRow, RunSummary};
pub use runner::Pipeline;
pub use stage1::{PagedDocument, structural_filter};
pub use stage2::content_filter;
pub use stage3::{Stage3, Stage3Stats};
pub use types::{CandidatePair, PairKey, RunOutcome};
