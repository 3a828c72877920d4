//! Console chat surface
//!
//! Line-oriented read-eval loop over a `ConversationSession`. The console
//! is the only user-facing surface: it prints approved or sanitized
//! replies as `Assistant:` lines, rejection reasons on the fixed reject
//! lines, and terminates on a case-insensitive `exit`.

use std::io::Write;

use tokio::io::{AsyncBufReadExt, BufReader};

use crate::error::{Error, Result};
use crate::session::{ConversationSession, TurnOutcome};

/// Interactive console over one conversation session
pub struct Console {
    session: ConversationSession,
}

impl Console {
    pub fn new(session: ConversationSession) -> Self {
        Self { session }
    }

    /// Run the read-eval loop until `exit` or end of input.
    pub async fn run(&mut self) -> Result<()> {
        let stdin = BufReader::new(tokio::io::stdin());
        let mut lines = stdin.lines();

        println!("You can start chatting with the model now. Type 'exit' to quit.");

        loop {
            print!("User: ");
            std::io::stdout().flush()?;

            let Some(line) = lines.next_line().await? else {
                break;
            };
            let input = line.trim();

            if input.is_empty() {
                continue;
            }
            if input.eq_ignore_ascii_case("exit") {
                break;
            }

            match self.session.submit(input).await {
                Ok(TurnOutcome::Replied { text }) | Ok(TurnOutcome::Redacted { text }) => {
                    println!("Assistant: {}", text);
                }
                Ok(TurnOutcome::InputRejected { reason }) => {
                    println!("Input rejected: {}", reason);
                }
                Ok(TurnOutcome::OutputRejected { reason }) => {
                    println!(
                        "Assistant: Your request has been rejected due to the following reason: {}",
                        reason
                    );
                }
                Err(Error::Generation(e)) => {
                    // Generation failures never skip guarding; the turn was
                    // abandoned whole, so the user can simply retry.
                    tracing::error!(error = %e, "generation failed");
                    println!("Assistant: I couldn't produce a response just now. Please try again or type 'exit'.");
                }
                Err(e) => return Err(e),
            }
        }

        self.session.close()?;
        tracing::info!(messages = self.session.history().len(), "session closed");
        Ok(())
    }
}
