pub mod config;
pub mod executor;
pub mod ingest;
pub mod job;
pub mod ledger;
pub mod params;
pub mod persist;
pub mod port;
pub mod progress;
pub mod run;
pub mod scheduler;
pub mod store;
pub mod summary;

#[cfg(test)]
pub(crate) mod testing;

pub use config::{BatchConfig, SchedulingMode};
pub use executor::RetryingExecutor;
pub use ingest::Ingestion;
pub use job::{Job, JobInput, JobStatus};
pub use ledger::{JobLedger, StatusCounts, Transition};
pub use params::GenerationParams;
pub use persist::JsonFileSummarySink;
pub use port::{FailureKind, GenerationFailure, GenerationOutput, GenerationPort, GenerationRequest};
pub use progress::{ProgressReporter, ProgressSink, ProgressUpdate};
pub use run::{BatchEngine, BatchRunHandle};
pub use scheduler::BoundedScheduler;
pub use store::{BatchRunStore, RunProgress, RunState, RunView};
pub use summary::{BatchSummary, FailedJob, JobOutcome, PersistenceSink, SummaryAggregator};
