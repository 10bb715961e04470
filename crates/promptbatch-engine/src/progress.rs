use std::{
    panic::{AssertUnwindSafe, catch_unwind},
    sync::Arc,
};

use promptbatch_common::error::Result;
use serde::Serialize;
use tracing::warn;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProgressUpdate {
    pub completed: usize,
    pub total: usize,
    pub message: String,
}

impl ProgressUpdate {
    pub fn percent(&self) -> f64 {
        if self.total == 0 {
            return 0.0;
        }
        (self.completed as f64 / self.total as f64) * 100.0
    }
}

pub trait ProgressSink: Send + Sync {
    fn report(&self, update: &ProgressUpdate) -> Result<()>;
}

impl<F> ProgressSink for F
where
    F: Fn(usize, usize, &str) + Send + Sync,
{
    fn report(&self, update: &ProgressUpdate) -> Result<()> {
        self(update.completed, update.total, &update.message);
        Ok(())
    }
}

/// Fan-out of progress updates to every registered sink.
///
/// The ledger calls [`ProgressReporter::publish`] while holding its write
/// lock, so sinks observe updates in transition order.
#[derive(Clone, Default)]
pub struct ProgressReporter {
    sinks: Vec<Arc<dyn ProgressSink>>,
}

impl ProgressReporter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, sink: Arc<dyn ProgressSink>) {
        self.sinks.push(sink);
    }

    pub fn with_sink(mut self, sink: Arc<dyn ProgressSink>) -> Self {
        self.register(sink);
        self
    }

    pub fn publish(&self, update: &ProgressUpdate) {
        for (index, sink) in self.sinks.iter().enumerate() {
            match catch_unwind(AssertUnwindSafe(|| sink.report(update))) {
                Ok(Ok(())) => {}
                Ok(Err(err)) => {
                    warn!(sink = index, error = %err, "progress sink failed");
                }
                Err(_) => {
                    warn!(sink = index, "progress sink panicked");
                }
            }
        }
    }
}

impl std::fmt::Debug for ProgressReporter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProgressReporter")
            .field("sinks", &self.sinks.len())
            .finish()
    }
}
