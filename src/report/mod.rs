// Report module - reporter interface and ordered fan-out

pub mod console;
pub mod streaming;

use anyhow::Result;
use serde::Serialize;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use thiserror::Error;
use tracing::warn;

use crate::event::Event;
pub use console::ConsoleReporter;
pub use streaming::StreamingJsonReporter;

/// Reporter trait
pub trait Reporter: Send + Sync {
    /// Called once for every normalized event, in publication order
    fn on_event(&self, event: &Event) -> Result<()>;
}

impl<R: Reporter + ?Sized> Reporter for Arc<R> {
    fn on_event(&self, event: &Event) -> Result<()> {
        (**self).on_event(event)
    }
}

/// A reporter returned an error or panicked while handling an event
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReporterFault {
    pub reporter_index: usize,
    pub event_index: usize,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BusError {
    #[error("reporters cannot be attached once events have been published")]
    Sealed,
}

/// Delivers each event to every attached reporter in attachment order.
///
/// A failing reporter is recorded and skipped for that event only; it keeps receiving later
/// events and never affects delivery to its siblings.
#[derive(Default)]
pub struct ReporterBus {
    reporters: Vec<Box<dyn Reporter>>,
    sealed: bool,
    published: usize,
    faults: Vec<ReporterFault>,
}

impl ReporterBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn attach(&mut self, reporter: Box<dyn Reporter>) -> Result<(), BusError> {
        if self.sealed {
            return Err(BusError::Sealed);
        }
        self.reporters.push(reporter);
        Ok(())
    }

    /// Refuse further attachments
    pub fn seal(&mut self) {
        self.sealed = true;
    }

    pub fn is_sealed(&self) -> bool {
        self.sealed
    }

    pub fn len(&self) -> usize {
        self.reporters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.reporters.is_empty()
    }

    /// Number of events published so far
    pub fn published(&self) -> usize {
        self.published
    }

    pub fn faults(&self) -> &[ReporterFault] {
        &self.faults
    }

    pub fn publish(&mut self, event: &Event) {
        self.sealed = true;
        let event_index = self.published;
        self.published += 1;

        for (reporter_index, reporter) in self.reporters.iter().enumerate() {
            if let Err(message) = deliver(reporter.as_ref(), event) {
                warn!(
                    "Reporter #{} failed on event #{} ({:?}): {}",
                    reporter_index, event_index, event.kind, message
                );
                self.faults.push(ReporterFault {
                    reporter_index,
                    event_index,
                    message,
                });
            }
        }
    }

    /// Feed a recorded event log to a single reporter with the same fault isolation
    pub fn replay(reporter: &dyn Reporter, events: &[Event]) -> Vec<ReporterFault> {
        events
            .iter()
            .enumerate()
            .filter_map(|(event_index, event)| {
                deliver(reporter, event).err().map(|message| ReporterFault {
                    reporter_index: 0,
                    event_index,
                    message,
                })
            })
            .collect()
    }
}

fn deliver(reporter: &dyn Reporter, event: &Event) -> Result<(), String> {
    match catch_unwind(AssertUnwindSafe(|| reporter.on_event(event))) {
        Ok(Ok(())) => Ok(()),
        Ok(Err(err)) => Err(format!("{:#}", err)),
        Err(payload) => {
            let message = payload
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| payload.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "reporter panicked".to_string());
            Err(format!("panic: {}", message))
        }
    }
}
