//! Per-request progress reporting
//!
//! The reporter is owned by one request. It enforces the event contract
//! (non-decreasing, bounded, nothing after the terminal result) whether or
//! not anyone is listening, so the pipeline never branches on the
//! presence of a consumer.

use tint_common::{ProgressEvent, ProgressStage};
use tokio::sync::mpsc;
use tracing::debug;

/// Optional sink for one request's progress events
#[derive(Debug)]
pub struct ProgressReporter {
    sink: Option<mpsc::UnboundedSender<ProgressEvent>>,
    last_percentage: Option<u8>,
    emitted: Vec<ProgressStage>,
    finished: bool,
}

impl ProgressReporter {
    /// Reporter with no consumer
    pub fn detached() -> Self {
        Self {
            sink: None,
            last_percentage: None,
            emitted: Vec::new(),
            finished: false,
        }
    }

    /// Reporter delivering into `sink`
    pub fn attached(sink: mpsc::UnboundedSender<ProgressEvent>) -> Self {
        Self {
            sink: Some(sink),
            ..Self::detached()
        }
    }

    /// Reporter plus the receiving end of its channel
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<ProgressEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self::attached(tx), rx)
    }

    /// Record that `stage` has been reached
    ///
    /// Returns `true` if the event was accepted. Regressing or post-terminal
    /// emissions are dropped. A consumer that has gone away is not an error.
    pub fn emit(&mut self, stage: ProgressStage) -> bool {
        if self.finished {
            debug!(?stage, "Progress after terminal result dropped");
            return false;
        }

        let percentage = stage.percentage().min(100);
        if self.last_percentage.map_or(false, |last| percentage < last) {
            debug!(?stage, percentage, "Regressing progress dropped");
            return false;
        }

        self.last_percentage = Some(percentage);
        self.emitted.push(stage);
        debug!(?stage, percentage, "Progress");

        if let Some(sink) = &self.sink {
            if sink.send(ProgressEvent::new(stage)).is_err() {
                debug!("Progress consumer gone, continuing without it");
                self.sink = None;
            }
        }
        true
    }

    /// Mark the terminal result as produced and close the channel
    pub fn finish(&mut self) {
        self.finished = true;
        self.sink = None;
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Stages accepted so far
    pub fn emitted(&self) -> &[ProgressStage] {
        &self.emitted
    }
}

impl Default for ProgressReporter {
    fn default() -> Self {
        Self::detached()
    }
}
