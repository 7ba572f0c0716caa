pub mod config;
pub mod error;
mod batch;
mod orchestrator;
mod availability;
mod sink;
mod source;
mod timer;
mod transform;

#[cfg(test)]
mod testing;

pub use batch::Batch;
pub use error::PipelineError;
pub use orchestrator::process_events;
pub use availability::AvailabilityPolicy;
pub use sink::{BULK_RETRY_BACKOFF, BatchWriter, ResidualPolicy, SinkClient, WriteOutcome};
pub use source::{POLL_RETRY_BACKOFF, SourceConsumer};
pub use timer::ScopedTimer;
pub use transform::{TIMESTAMP_FIELD, transform};
