//! Turn protocol state machine
//!
//! The per-turn control flow is an explicit enumerated state plus a
//! transition table, kept free of any transport code so the fail-closed
//! property is auditable and testable in isolation. The session driver
//! (`ConversationSession`) steps a phase value through `advance`; an
//! illegal step is a programming error surfaced as `Error::Session`,
//! never silently coerced.

use crate::error::{Error, Result};

/// Phase of the turn protocol
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnPhase {
    /// No turn in progress
    Idle,
    /// Waiting for a user submission
    AwaitingInput,
    /// Candidate input is at the input guard
    InputValidating,
    /// Completion oracle is producing a candidate reply
    Generating,
    /// Candidate reply is at the output guard
    OutputValidating,
    /// Approved or sanitized content is being shown and committed
    Displaying,
    /// Refused reply is at the redactor
    Redacting,
    /// Session terminated; no further transitions
    Closed,
}

impl TurnPhase {
    /// The transition table. Reject paths lead back to `AwaitingInput`;
    /// every oracle failure is routed by the driver onto one of these
    /// reject edges, so there is no transition that admits unguarded
    /// content.
    pub fn can_advance(self, next: TurnPhase) -> bool {
        use TurnPhase::*;
        matches!(
            (self, next),
            (Idle, AwaitingInput)
                | (Idle, Closed)
                | (AwaitingInput, InputValidating)
                | (AwaitingInput, Closed)
                // input reject path
                | (InputValidating, AwaitingInput)
                | (InputValidating, Generating)
                | (Generating, OutputValidating)
                // generation failure returns to the prompt
                | (Generating, AwaitingInput)
                | (OutputValidating, Displaying)
                | (OutputValidating, Redacting)
                // output reject path
                | (OutputValidating, AwaitingInput)
                | (Redacting, Displaying)
                // redaction failure falls back to the reject path
                | (Redacting, AwaitingInput)
                | (Displaying, Idle)
        )
    }

    pub fn is_terminal(self) -> bool {
        self == TurnPhase::Closed
    }
}

/// Step `phase` to `next`, enforcing the transition table.
pub fn advance(phase: &mut TurnPhase, next: TurnPhase) -> Result<()> {
    if !phase.can_advance(next) {
        return Err(Error::Session(format!(
            "illegal turn transition {:?} -> {:?}",
            phase, next
        )));
    }
    tracing::trace!(from = ?phase, to = ?next, "turn transition");
    *phase = next;
    Ok(())
}

/// What one resolved turn produced
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TurnOutcome {
    /// Input guard refused the submission; nothing was committed
    InputRejected { reason: String },
    /// Reply approved verbatim
    Replied { text: String },
    /// Reply was refused, then sanitized and committed
    Redacted { text: String },
    /// Reply was refused and replaced by a rejection notice
    OutputRejected { reason: String },
}
