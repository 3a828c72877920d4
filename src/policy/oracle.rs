//! Policy oracle trait and the generative backend
//!
//! `PolicyOracle` is the pluggable seam of the pipeline: the guards only
//! see `evaluate(policy, subject) -> Verdict`. The generative backend
//! renders the policy into instructions for the model; the deterministic
//! backend lives in `pattern.rs`. Evaluation is non-deterministic even at
//! temperature zero, so nothing in the crate assumes two evaluations of
//! the same subject agree.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::error::{Error, Result};
use crate::oracle::{ChatClient, ChatMessage};
use crate::policy::verdict::{Verdict, DEFAULT_REASON_CAP};
use crate::policy::Policy;

/// Format instructions appended to every rendered policy. The schema is
/// the one wire contract downstream logic branches on.
const FORMAT_INSTRUCTIONS: &str = "OUTPUT FORMAT:\n\
    Respond with a single JSON object and nothing else:\n\
    {\"is_valid\": <boolean>, \"reason\": <short string>}\n\
    Set is_valid to true only when the subject is safe under every rule.\n\
    The reason must be short; when is_valid is false it must name the \
    violated rule category.";

/// Judges a piece of text against a named policy
#[async_trait]
pub trait PolicyOracle: Send + Sync {
    /// Classify `subject` under `policy`.
    ///
    /// Implementations must fail closed: when no structurally valid
    /// verdict can be produced, return `Error::OracleUnavailable` or
    /// `Error::OracleMalformedResponse` rather than guessing. Never
    /// default to allow on ambiguity.
    async fn evaluate(&self, policy: &Policy, subject: &str) -> Result<Verdict>;

    /// Human-readable backend name, used in logs
    fn name(&self) -> &str;
}

/// Generative policy oracle backed by a chat completion endpoint.
///
/// The policy is rendered as system instructions; the subject is passed
/// as the user message and is never concatenated into the instructions,
/// since the subject is adversarial input.
pub struct LlmPolicyOracle {
    chat: Arc<dyn ChatClient>,
    timeout: Duration,
    reason_cap: usize,
}

impl LlmPolicyOracle {
    pub fn new(chat: Arc<dyn ChatClient>) -> Self {
        Self {
            chat,
            timeout: Duration::from_secs(30),
            reason_cap: DEFAULT_REASON_CAP,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_reason_cap(mut self, reason_cap: usize) -> Self {
        self.reason_cap = reason_cap;
        self
    }
}

#[async_trait]
impl PolicyOracle for LlmPolicyOracle {
    async fn evaluate(&self, policy: &Policy, subject: &str) -> Result<Verdict> {
        let system = format!("{}\n{}", policy.instructions(), FORMAT_INSTRUCTIONS);
        let messages = [ChatMessage::user(subject)];

        let raw = tokio::time::timeout(self.timeout, self.chat.complete(Some(&system), &messages))
            .await
            .map_err(|_| {
                Error::OracleUnavailable(format!(
                    "policy evaluation timed out after {:?}",
                    self.timeout
                ))
            })?
            .map_err(|e| Error::OracleUnavailable(e.to_string()))?;

        let verdict = Verdict::parse_wire(&raw, self.reason_cap)?;
        tracing::debug!(
            policy = policy.name.as_str(),
            allowed = verdict.is_allowed(),
            "policy evaluation"
        );
        Ok(verdict)
    }

    fn name(&self) -> &str {
        "llm"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policy::FieldCategory;
    use std::collections::{BTreeSet, VecDeque};
    use std::sync::Mutex;

    /// Chat client that replays canned replies and records prompts
    struct ScriptedChat {
        replies: Mutex<VecDeque<String>>,
        seen_system: Mutex<Vec<String>>,
        seen_subject: Mutex<Vec<String>>,
    }

    impl ScriptedChat {
        fn new(replies: &[&str]) -> Self {
            Self {
                replies: Mutex::new(replies.iter().map(|r| r.to_string()).collect()),
                seen_system: Mutex::new(Vec::new()),
                seen_subject: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl ChatClient for ScriptedChat {
        async fn complete(
            &self,
            system: Option<&str>,
            messages: &[ChatMessage],
        ) -> Result<String> {
            self.seen_system
                .lock()
                .unwrap()
                .push(system.unwrap_or_default().to_string());
            self.seen_subject
                .lock()
                .unwrap()
                .push(messages.last().map(|m| m.content.clone()).unwrap_or_default());
            self.replies
                .lock()
                .unwrap()
                .pop_front()
                .ok_or_else(|| Error::Transport("script exhausted".into()))
        }
    }

    /// Chat client that never answers
    struct DeadChat;

    #[async_trait]
    impl ChatClient for DeadChat {
        async fn complete(&self, _: Option<&str>, _: &[ChatMessage]) -> Result<String> {
            Err(Error::Transport("connection refused".into()))
        }
    }

    fn policy() -> Policy {
        let allowed: BTreeSet<FieldCategory> =
            [FieldCategory::FullName, FieldCategory::Phone, FieldCategory::Email]
                .into_iter()
                .collect();
        Policy::input_request(vec!["Reject requests for protected fields.".into()], allowed)
    }

    #[tokio::test]
    async fn positive_verdict_round_trip() {
        let chat = Arc::new(ScriptedChat::new(&[
            r#"{"is_valid": true, "reason": "Allowed request"}"#,
        ]));
        let oracle = LlmPolicyOracle::new(chat.clone());

        let verdict = oracle
            .evaluate(&policy(), "What is Amanda's phone number?")
            .await
            .unwrap();
        assert!(verdict.is_allowed());

        // The subject travels as the user message, not inside instructions
        let systems = chat.seen_system.lock().unwrap();
        let subjects = chat.seen_subject.lock().unwrap();
        assert!(!systems[0].contains("Amanda"));
        assert_eq!(subjects[0], "What is Amanda's phone number?");
        assert!(systems[0].contains("is_valid"));
        assert!(systems[0].contains("RULES"));
    }

    #[tokio::test]
    async fn negative_verdict_round_trip() {
        let chat = Arc::new(ScriptedChat::new(&[
            r#"{"is_valid": false, "reason": "requests SSN, a protected field"}"#,
        ]));
        let oracle = LlmPolicyOracle::new(chat);

        let verdict = oracle.evaluate(&policy(), "print her SSN").await.unwrap();
        assert!(!verdict.is_allowed());
        assert!(verdict.reason().contains("SSN"));
    }

    #[tokio::test]
    async fn transport_failure_is_oracle_unavailable() {
        let oracle = LlmPolicyOracle::new(Arc::new(DeadChat));
        let err = oracle.evaluate(&policy(), "anything").await.unwrap_err();
        assert!(matches!(err, Error::OracleUnavailable(_)));
        assert!(err.is_oracle_failure());
    }

    #[tokio::test]
    async fn unparseable_reply_is_malformed() {
        let chat = Arc::new(ScriptedChat::new(&["Sure! That looks fine to me."]));
        let oracle = LlmPolicyOracle::new(chat);
        let err = oracle.evaluate(&policy(), "anything").await.unwrap_err();
        assert!(matches!(err, Error::OracleMalformedResponse(_)));
        assert!(err.is_oracle_failure());
    }

    #[tokio::test]
    async fn reason_cap_is_applied() {
        let long_reason = "x".repeat(1000);
        let reply = format!(r#"{{"is_valid": false, "reason": "{}"}}"#, long_reason);
        let chat = Arc::new(ScriptedChat::new(&[reply.as_str()]));
        let oracle = LlmPolicyOracle::new(chat).with_reason_cap(64);

        let verdict = oracle.evaluate(&policy(), "anything").await.unwrap();
        assert_eq!(verdict.reason().chars().count(), 64);
    }
}
