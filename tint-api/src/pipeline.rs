//! Request lifecycle
//!
//! One [`ColorizePipeline::run`] call takes a submission from receipt to a
//! single terminal envelope:
//!
//! ```text
//! Received -> Validating -> Rejected -----------------------------> EnvelopeSent
//!                        -> Validated -> ScopeAcquired -> Transforming
//!                                                       -> Completed -> ScopeReleased -> EnvelopeSent
//!                                                       -> Failed    -> ScopeReleased -> EnvelopeSent
//!                        -> Validated -> Failed (scope could not be created) -> EnvelopeSent
//! ```
//!
//! Every path that acquires a scope passes through `ScopeReleased`.

use futures::FutureExt;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tint_common::config::ServiceConfig;
use tint_common::params::{self, ParameterWarning};
use tint_common::{ColorizationParameters, ProgressStage};
use tracing::{error, info, info_span, warn, Instrument};
use uuid::Uuid;

use crate::backend::TransformBackend;
use crate::envelope::{ResponseEnvelope, ResultAssembler};
use crate::error::{ColorizeError, Failure, Rejection};
use crate::orchestrator::TransformOrchestrator;
use crate::progress::ProgressReporter;
use crate::scope::ScratchSpace;
use crate::validation::{ImageValidator, UploadedImage};

/// Lifecycle states of one request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestState {
    Received,
    Validating,
    Rejected,
    Validated,
    ScopeAcquired,
    Transforming,
    Completed,
    Failed,
    ScopeReleased,
    EnvelopeSent,
}

impl RequestState {
    /// Whether `self -> next` is a legal edge
    pub fn can_transition_to(self, next: RequestState) -> bool {
        use RequestState::*;
        matches!(
            (self, next),
            (Received, Validating)
                | (Validating, Rejected)
                | (Validating, Validated)
                | (Rejected, EnvelopeSent)
                | (Validated, ScopeAcquired)
                | (Validated, Failed)
                | (ScopeAcquired, Transforming)
                | (Transforming, Completed)
                | (Transforming, Failed)
                | (Completed, ScopeReleased)
                | (Failed, ScopeReleased)
                | (Failed, EnvelopeSent)
                | (ScopeReleased, EnvelopeSent)
        )
    }

    pub fn is_terminal(self) -> bool {
        self == RequestState::EnvelopeSent
    }
}

/// Visited states, in order
#[derive(Debug, Clone)]
struct StateTrace {
    states: Vec<RequestState>,
}

impl StateTrace {
    fn new() -> Self {
        Self {
            states: vec![RequestState::Received],
        }
    }

    fn current(&self) -> RequestState {
        self.states
            .last()
            .copied()
            .unwrap_or(RequestState::Received)
    }

    fn advance(&mut self, next: RequestState) {
        let current = self.current();
        if !current.can_transition_to(next) {
            error!(?current, ?next, "Illegal request state transition");
            debug_assert!(false, "illegal transition {:?} -> {:?}", current, next);
        }
        self.states.push(next);
    }
}

/// What the caller submitted, as read off the wire
#[derive(Debug, Clone)]
pub struct Submission {
    /// The `file` field, or why it could not be read
    pub file: Result<UploadedImage, Rejection>,
    /// Raw `parameters` field, if present
    pub parameters: Option<String>,
}

impl Submission {
    pub fn new(file: UploadedImage, parameters: Option<String>) -> Self {
        Self {
            file: Ok(file),
            parameters,
        }
    }

    /// A submission that already failed at the transport layer
    pub fn rejected(rejection: Rejection) -> Self {
        Self {
            file: Err(rejection),
            parameters: None,
        }
    }
}

/// Result of one pipeline run
#[derive(Debug)]
pub struct PipelineOutcome {
    pub request_id: Uuid,
    pub envelope: ResponseEnvelope,
    pub states: Vec<RequestState>,
    pub parameter_warning: Option<ParameterWarning>,
    /// Set when the scope could not be fully removed
    pub cleanup_fault: Option<String>,
}

/// Validation, parameter merge, scoped transform and envelope assembly
pub struct ColorizePipeline {
    validator: ImageValidator,
    scratch: ScratchSpace,
    orchestrator: TransformOrchestrator,
    defaults: ColorizationParameters,
}

impl ColorizePipeline {
    pub fn new(config: &ServiceConfig, backend: Arc<dyn TransformBackend>) -> Self {
        Self {
            validator: ImageValidator::from_config(config),
            scratch: ScratchSpace::new(config.scratch_dir.clone()),
            orchestrator: TransformOrchestrator::new(backend),
            defaults: ColorizationParameters::default(),
        }
    }

    pub fn validator(&self) -> &ImageValidator {
        &self.validator
    }

    pub fn scratch(&self) -> &ScratchSpace {
        &self.scratch
    }

    pub fn backend(&self) -> &Arc<dyn TransformBackend> {
        self.orchestrator.backend()
    }

    /// Run one request to its terminal envelope
    ///
    /// Never fails: every error becomes an error envelope.
    pub async fn run(&self, submission: Submission, progress: ProgressReporter) -> PipelineOutcome {
        let request_id = Uuid::new_v4();
        let span = info_span!("colorize", request_id = %request_id);
        self.run_request(request_id, submission, progress)
            .instrument(span)
            .await
    }

    async fn run_request(
        &self,
        request_id: Uuid,
        submission: Submission,
        mut progress: ProgressReporter,
    ) -> PipelineOutcome {
        let mut trace = StateTrace::new();
        trace.advance(RequestState::Validating);

        let upload = match submission
            .file
            .and_then(|upload| self.validator.validate(&upload).map(|()| upload))
        {
            Ok(upload) => upload,
            Err(rejection) => {
                info!("Upload rejected: {}", rejection);
                trace.advance(RequestState::Rejected);
                progress.finish();
                let envelope = ResultAssembler::assemble_error(&Failure::from(&ColorizeError::from(rejection)));
                trace.advance(RequestState::EnvelopeSent);
                return PipelineOutcome {
                    request_id,
                    envelope,
                    states: trace.states,
                    parameter_warning: None,
                    cleanup_fault: None,
                };
            }
        };

        let merged = params::merge(self.defaults, submission.parameters.as_deref());
        trace.advance(RequestState::Validated);
        info!(
            bytes = upload.size(),
            content_type = %upload.content_type,
            "Upload accepted"
        );

        let mut scope = match self.scratch.acquire(request_id).await {
            Ok(scope) => scope,
            Err(e) => {
                error!("Failed to acquire scratch scope: {}", e);
                trace.advance(RequestState::Failed);
                progress.finish();
                let err = ColorizeError::TransformFault(format!("scratch scope unavailable: {}", e));
                let envelope = ResultAssembler::assemble_error(&Failure::from(&err));
                trace.advance(RequestState::EnvelopeSent);
                return PipelineOutcome {
                    request_id,
                    envelope,
                    states: trace.states,
                    parameter_warning: merged.warning,
                    cleanup_fault: None,
                };
            }
        };
        trace.advance(RequestState::ScopeAcquired);
        progress.emit(ProgressStage::UploadAcknowledged);

        trace.advance(RequestState::Transforming);
        let outcome = AssertUnwindSafe(self.orchestrator.execute(
            &upload,
            merged.parameters,
            &mut scope,
            &mut progress,
        ))
        .catch_unwind()
        .await
        .unwrap_or_else(|panic| Err(ColorizeError::TransformFault(panic_message(panic))));

        progress.finish();
        let envelope = match outcome {
            Ok(result) => {
                trace.advance(RequestState::Completed);
                info!(
                    backend = result.backend,
                    width = result.dimensions.width,
                    height = result.dimensions.height,
                    elapsed_ms = result.duration.as_millis() as u64,
                    "Colorization complete"
                );
                ResultAssembler::assemble(result)
            }
            Err(err) => {
                trace.advance(RequestState::Failed);
                match &err {
                    ColorizeError::TransformFault(detail) => error!("Transform fault: {}", detail),
                    other => warn!("Colorization failed: {}", other),
                }
                ResultAssembler::assemble_error(&Failure::from(&err))
            }
        };

        drop(upload);
        let cleanup_fault = match self.scratch.release(scope) {
            Ok(_) => None,
            Err(fault) => {
                warn!("{}", fault);
                Some(fault.to_string())
            }
        };
        trace.advance(RequestState::ScopeReleased);
        trace.advance(RequestState::EnvelopeSent);

        PipelineOutcome {
            request_id,
            envelope,
            states: trace.states,
            parameter_warning: merged.warning,
            cleanup_fault,
        }
    }
}

fn panic_message(panic: Box<dyn Any + Send>) -> String {
    let detail = panic
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| panic.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string());
    format!("panic during transform: {}", detail)
}

#[cfg(test)]
mod tests {
    use super::*;
    use RequestState::*;

    #[test]
    fn test_documented_paths_are_legal() {
        let paths: [&[RequestState]; 4] = [
            &[Received, Validating, Rejected, EnvelopeSent],
            &[
                Received,
                Validating,
                Validated,
                ScopeAcquired,
                Transforming,
                Completed,
                ScopeReleased,
                EnvelopeSent,
            ],
            &[
                Received,
                Validating,
                Validated,
                ScopeAcquired,
                Transforming,
                Failed,
                ScopeReleased,
                EnvelopeSent,
            ],
            &[Received, Validating, Validated, Failed, EnvelopeSent],
        ];
        for path in paths {
            for pair in path.windows(2) {
                assert!(pair[0].can_transition_to(pair[1]), "{:?} -> {:?}", pair[0], pair[1]);
            }
            assert!(path.last().unwrap().is_terminal());
        }
    }

    #[test]
    fn test_shortcuts_are_illegal() {
        assert!(!Rejected.can_transition_to(ScopeAcquired));
        assert!(!Transforming.can_transition_to(EnvelopeSent));
        assert!(!Completed.can_transition_to(EnvelopeSent));
        assert!(!EnvelopeSent.can_transition_to(Received));
    }

    #[test]
    fn test_panic_message_extraction() {
        let from_str: Box<dyn Any + Send> = Box::new("boom");
        assert_eq!(panic_message(from_str), "panic during transform: boom");
        let from_string: Box<dyn Any + Send> = Box::new(String::from("bang"));
        assert_eq!(panic_message(from_string), "panic during transform: bang");
    }
}
