#![deny(warnings)]
#![deny(dead_code)]
#![deny(unused_variables)]
#![deny(unused_imports)]

pub mod cancel;
pub mod folder;
pub mod outcome;
pub mod pipeline;
pub mod retry;

pub use cancel::CancelSignal;
pub use outcome::{ImageOutcome, IngestReport, OutcomeStatus};
pub use pipeline::{IngestionPipeline, PipelineOptions, PipelinePorts, PLACEHOLDER_DESCRIPTION};
pub use retry::{with_retry, RetryPolicy};
