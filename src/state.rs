//! Conversion job state machine.
//!
//! ```text
//! idle ──► analyzing ──► rendering ──► generating ──► saving ──► success
//!  ▲           │             │  ▲           │            │          │
//!  │           └─────────────┴──┼───────────┴────────────┴─► error  │
//!  │                            └──────────── retry ───────────┘ │  │
//!  ├───────────────────────────── cancel ───────────────────────┘   │
//!  └───────────────────────────── reset ────────────────────────────┘
//! ```
//!
//! A job stopped through its cancel token mid-flight (analyzing, rendering,
//! generating) returns straight to idle. Saving is not interruptible.

use crate::error::Pdf2DocxError;
use crate::output::ConversionSummary;
use crate::progress::Stage;
use serde::Serialize;
use tracing::debug;

/// Why a job ended in [`ConversionState::Error`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConversionFailure {
    /// Taxonomy name, see [`Pdf2DocxError::kind`].
    pub kind: &'static str,
    /// Human-readable message, shown as-is.
    pub message: String,
    /// Stage the job was in when it failed.
    pub stage: Stage,
}

/// Current state of a conversion job.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum ConversionState {
    Idle,
    Analyzing,
    Rendering,
    Generating,
    Saving,
    Success(ConversionSummary),
    Error(ConversionFailure),
}

impl ConversionState {
    pub fn stage(&self) -> Stage {
        match self {
            ConversionState::Idle => Stage::Idle,
            ConversionState::Analyzing => Stage::Analyzing,
            ConversionState::Rendering => Stage::Rendering,
            ConversionState::Generating => Stage::Generating,
            ConversionState::Saving => Stage::Saving,
            ConversionState::Success(_) => Stage::Success,
            ConversionState::Error(_) => Stage::Error,
        }
    }
}

/// Whether `from → to` is an edge of the machine.
pub fn is_allowed(from: Stage, to: Stage) -> bool {
    use Stage::*;
    matches!(
        (from, to),
        (Idle, Analyzing)
            | (Analyzing, Rendering)
            | (Rendering, Generating)
            | (Generating, Saving)
            | (Saving, Success)
            | (Analyzing | Rendering | Generating | Saving, Error)
            | (Error, Rendering)
            | (Error, Idle)
            | (Success, Idle)
            | (Analyzing | Rendering | Generating, Idle)
    )
}

/// Validating holder of a [`ConversionState`].
#[derive(Debug, Clone)]
pub struct ConversionStateMachine {
    state: ConversionState,
}

impl Default for ConversionStateMachine {
    fn default() -> Self {
        Self::new()
    }
}

impl ConversionStateMachine {
    pub fn new() -> Self {
        Self {
            state: ConversionState::Idle,
        }
    }

    pub fn state(&self) -> &ConversionState {
        &self.state
    }

    pub fn stage(&self) -> Stage {
        self.state.stage()
    }

    /// Move to `next`.
    ///
    /// # Errors
    /// [`Pdf2DocxError::InvalidTransition`] if the edge does not exist; the
    /// state is left unchanged.
    pub fn transition(&mut self, next: ConversionState) -> Result<(), Pdf2DocxError> {
        let from = self.stage();
        let to = next.stage();
        if !is_allowed(from, to) {
            return Err(Pdf2DocxError::InvalidTransition {
                from: from.as_str(),
                to: to.as_str(),
            });
        }
        debug!("Conversion state: {} → {}", from, to);
        self.state = next;
        Ok(())
    }

    /// Move to [`ConversionState::Error`] from wherever the job is.
    ///
    /// Falls back to overwriting the state when the edge does not exist, so
    /// a failure is never lost.
    pub fn fail(&mut self, error: &Pdf2DocxError) {
        let failure = ConversionFailure {
            kind: error.kind(),
            message: error.to_string(),
            stage: self.stage(),
        };
        if self.transition(ConversionState::Error(failure.clone())).is_err() {
            self.state = ConversionState::Error(failure);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn summary() -> ConversionSummary {
        ConversionSummary {
            page_count: 1,
            file_size_bytes: 1,
            preview_image: None,
        }
    }

    #[test]
    fn happy_path() {
        let mut m = ConversionStateMachine::new();
        for next in [
            ConversionState::Analyzing,
            ConversionState::Rendering,
            ConversionState::Generating,
            ConversionState::Saving,
            ConversionState::Success(summary()),
            ConversionState::Idle,
        ] {
            m.transition(next).unwrap();
        }
        assert_eq!(m.stage(), Stage::Idle);
    }

    #[test]
    fn skipping_a_stage_is_rejected() {
        let mut m = ConversionStateMachine::new();
        let err = m.transition(ConversionState::Rendering).unwrap_err();
        assert!(matches!(
            err,
            Pdf2DocxError::InvalidTransition {
                from: "idle",
                to: "rendering"
            }
        ));
        assert_eq!(m.stage(), Stage::Idle);
    }

    #[test]
    fn error_allows_retry_and_cancel_only() {
        assert!(is_allowed(Stage::Error, Stage::Rendering));
        assert!(is_allowed(Stage::Error, Stage::Idle));
        assert!(!is_allowed(Stage::Error, Stage::Analyzing));
        assert!(!is_allowed(Stage::Error, Stage::Saving));
        assert!(!is_allowed(Stage::Success, Stage::Rendering));
        assert!(!is_allowed(Stage::Saving, Stage::Idle));
        assert!(!is_allowed(Stage::Idle, Stage::Error));
    }

    #[test]
    fn fail_records_kind_message_and_stage() {
        let mut m = ConversionStateMachine::new();
        m.transition(ConversionState::Analyzing).unwrap();
        m.fail(&Pdf2DocxError::PasswordProtected);
        match m.state() {
            ConversionState::Error(f) => {
                assert_eq!(f.kind, "password_protected");
                assert_eq!(f.stage, Stage::Analyzing);
                assert!(f.message.contains("password"));
            }
            other => panic!("expected error, got {other:?}"),
        }
    }

    #[test]
    fn state_serialises_tagged() {
        let json = serde_json::to_value(ConversionState::Success(summary())).unwrap();
        assert_eq!(json["state"], "success");
        assert_eq!(json["page_count"], 1);
    }
}
