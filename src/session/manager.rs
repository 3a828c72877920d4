//! Conversation session driver
//!
//! `ConversationSession` owns the history and drives the turn protocol:
//! receive, guard input, generate, guard output, redact or reject, then
//! display and commit. Only guard-approved or guard-sanitized content is
//! ever committed, and every message a turn produces is committed in one
//! step at the end of the turn, so an aborted turn leaves history exactly
//! as it found it.

use std::sync::Arc;

use crate::error::{Error, Result};
use crate::guard::{InputGuard, OutputGuard, Redactor};
use crate::oracle::{ChatClient, ChatMessage};
use crate::session::history::{History, Message, Role};
use crate::session::turn::{advance, TurnOutcome, TurnPhase};

/// One guarded conversation: history, guards, and the turn state machine
pub struct ConversationSession {
    history: History,
    chat: Arc<dyn ChatClient>,
    input_guard: InputGuard,
    output_guard: OutputGuard,
    redactor: Arc<dyn Redactor>,
    soft_response: bool,
    revalidate_redactions: bool,
    phase: TurnPhase,
}

impl ConversationSession {
    pub fn new(
        chat: Arc<dyn ChatClient>,
        input_guard: InputGuard,
        output_guard: OutputGuard,
        redactor: Arc<dyn Redactor>,
        history: History,
    ) -> Self {
        Self {
            history,
            chat,
            input_guard,
            output_guard,
            redactor,
            soft_response: true,
            revalidate_redactions: false,
            phase: TurnPhase::Idle,
        }
    }

    /// Redact (true) or hard-reject (false) on output violations.
    /// A deployment-time choice, not a per-message one.
    pub fn with_soft_response(mut self, soft_response: bool) -> Self {
        self.soft_response = soft_response;
        self
    }

    /// Run redactor output through the output guard a second time.
    /// Off by default; see the residual-risk note in `guard::redact`.
    pub fn with_revalidation(mut self, revalidate_redactions: bool) -> Self {
        self.revalidate_redactions = revalidate_redactions;
        self
    }

    pub fn history(&self) -> &History {
        &self.history
    }

    pub fn phase(&self) -> TurnPhase {
        self.phase
    }

    pub fn is_closed(&self) -> bool {
        self.phase.is_terminal()
    }

    /// Terminate the session. Only legal between turns.
    pub fn close(&mut self) -> Result<()> {
        if self.is_closed() {
            return Ok(());
        }
        advance(&mut self.phase, TurnPhase::Closed)
    }

    /// Drive one full turn for a candidate user input.
    ///
    /// The phase value is stepped locally and written back only when the
    /// turn resolves; together with the single `commit` call per turn,
    /// dropping the returned future mid-flight (a cancelled turn) leaves
    /// both the phase and the history untouched.
    pub async fn submit(&mut self, input: &str) -> Result<TurnOutcome> {
        if self.is_closed() {
            return Err(Error::Session("session is closed".into()));
        }

        let mut phase = self.phase;
        if phase == TurnPhase::Idle {
            advance(&mut phase, TurnPhase::AwaitingInput)?;
        }

        advance(&mut phase, TurnPhase::InputValidating)?;
        let input_verdict = self.input_guard.check(input).await;
        if !input_verdict.is_allowed() {
            // The rejected input is not committed: a verbose echo of a
            // crafted request would itself be an exfiltration channel.
            advance(&mut phase, TurnPhase::AwaitingInput)?;
            self.phase = phase;
            tracing::info!(reason = input_verdict.reason(), "input rejected");
            return Ok(TurnOutcome::InputRejected {
                reason: input_verdict.reason().to_string(),
            });
        }

        advance(&mut phase, TurnPhase::Generating)?;
        let user_message = Message::user(input);
        let candidate = match self.generate(&user_message).await {
            Ok(text) => text,
            Err(e) => {
                advance(&mut phase, TurnPhase::AwaitingInput)?;
                self.phase = phase;
                return Err(e);
            }
        };

        advance(&mut phase, TurnPhase::OutputValidating)?;
        let output_verdict = self.output_guard.check(&candidate).await;
        if output_verdict.is_allowed() {
            advance(&mut phase, TurnPhase::Displaying)?;
            self.commit(vec![user_message, Message::assistant(&candidate)]);
            advance(&mut phase, TurnPhase::Idle)?;
            self.phase = phase;
            return Ok(TurnOutcome::Replied { text: candidate });
        }

        tracing::info!(reason = output_verdict.reason(), "output rejected");

        if self.soft_response {
            advance(&mut phase, TurnPhase::Redacting)?;
            match self.redactor.sanitize(&candidate).await {
                Ok(sanitized) => {
                    let still_unsafe = self.revalidate_redactions
                        && !self.output_guard.check(&sanitized).await.is_allowed();
                    if !still_unsafe {
                        advance(&mut phase, TurnPhase::Displaying)?;
                        self.commit(vec![user_message, Message::redacted(&sanitized)]);
                        advance(&mut phase, TurnPhase::Idle)?;
                        self.phase = phase;
                        return Ok(TurnOutcome::Redacted { text: sanitized });
                    }
                    tracing::warn!("redacted reply still fails the output guard, rejecting");
                }
                Err(e) => {
                    tracing::warn!(error = %e, "redaction failed, rejecting");
                }
            }
        }

        // Rejection path. The synthetic notice deliberately enters history
        // so later turns retain the context that this line of questioning
        // was refused.
        advance(&mut phase, TurnPhase::AwaitingInput)?;
        let reason = output_verdict.reason().to_string();
        let notice = Message::rejection_notice(format!(
            "A disallowed request was attempted; the response was withheld: {}",
            reason
        ));
        self.commit(vec![user_message, notice]);
        self.phase = phase;
        Ok(TurnOutcome::OutputRejected { reason })
    }

    /// Invoke the completion oracle with the committed history plus the
    /// staged user message.
    async fn generate(&self, staged: &Message) -> Result<String> {
        let (system, mut wire) = self.chat_payload();
        wire.push(ChatMessage::user(staged.content.clone()));

        let reply = self
            .chat
            .complete(system.as_deref(), &wire)
            .await
            .map_err(|e| Error::Generation(e.to_string()))?;

        if reply.trim().is_empty() {
            return Err(Error::Generation("completion oracle returned an empty reply".into()));
        }

        Ok(reply)
    }

    /// Project the committed history onto the chat wire format. The first
    /// system message becomes the system prompt; rejection notices travel
    /// as ordinary assistant content, which is exactly their purpose.
    fn chat_payload(&self) -> (Option<String>, Vec<ChatMessage>) {
        let mut system = None;
        let mut wire = Vec::with_capacity(self.history.len());

        for message in self.history.messages() {
            match message.role {
                Role::System if system.is_none() => {
                    system = Some(message.content.clone());
                }
                Role::System => wire.push(ChatMessage::system(message.content.clone())),
                Role::User => wire.push(ChatMessage::user(message.content.clone())),
                Role::Assistant => wire.push(ChatMessage::assistant(message.content.clone())),
            }
        }

        (system, wire)
    }

    /// The single history mutation point of a turn
    fn commit(&mut self, messages: Vec<Message>) {
        for message in messages {
            self.history.append(message);
        }
    }
}
