//! Redaction of unsafe assistant replies
//!
//! When the output guard refuses a reply and the deployment runs in
//! soft-response mode, the reply is rewritten instead of dropped: every
//! protected span is replaced with a neutral visible placeholder, and only
//! allow-listed fields survive.
//!
//! Residual risk, by contract rather than accident: in the baseline
//! configuration the redactor's output is NOT re-validated by the output
//! guard, so an imperfect redaction can still leak. The session offers
//! `revalidate_redactions` as an explicit second mode (see
//! `ConversationSession`); it is off by default.

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::error::{Error, Result};
use crate::oracle::{ChatClient, ChatMessage};
use crate::policy::pattern::compile_value_rules;
use crate::policy::FieldCategory;
use regex::Regex;

/// The neutral marker substituted for every removed span
pub const REDACTION_PLACEHOLDER: &str = "[REDACTED]";

/// Rewrites an unsafe reply into a sanitized one
#[async_trait]
pub trait Redactor: Send + Sync {
    /// Return `unsafe_text` with all protected content removed.
    ///
    /// Implementations must never fabricate plausible-looking replacement
    /// data; removed spans become visible placeholders. Errors mean the
    /// rewrite could not be trusted; the caller falls back to rejection.
    async fn sanitize(&self, unsafe_text: &str) -> Result<String>;
}

/// Generative redactor backed by a chat completion endpoint
pub struct LlmRedactor {
    chat: Arc<dyn ChatClient>,
    allowed_fields: BTreeSet<FieldCategory>,
    timeout: Duration,
}

impl LlmRedactor {
    pub fn new(chat: Arc<dyn ChatClient>, allowed_fields: BTreeSet<FieldCategory>) -> Self {
        Self {
            chat,
            allowed_fields,
            timeout: Duration::from_secs(30),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    fn instructions(&self) -> String {
        let allowed = self
            .allowed_fields
            .iter()
            .map(FieldCategory::label)
            .collect::<Vec<_>>()
            .join(", ");

        format!(
            "You are a secure redaction assistant. Rewrite the given text to remove \
             all sensitive personal data.\n\n\
             REDACTION RULES (in priority order):\n\
             1) Replace every piece of sensitive personal data with the neutral token {placeholder}.\n\
             2) Do NOT infer, reconstruct, or invent replacement data of any kind.\n\
             3) Preserve only these fields: {allowed}.\n\
             4) If unsure whether something is sensitive, redact it.\n\
             5) Keep the response concise and business-appropriate.\n\n\
             Output only the redacted text.",
            placeholder = REDACTION_PLACEHOLDER,
            allowed = allowed,
        )
    }
}

#[async_trait]
impl Redactor for LlmRedactor {
    async fn sanitize(&self, unsafe_text: &str) -> Result<String> {
        let system = self.instructions();
        let messages = [ChatMessage::user(unsafe_text)];

        let rewritten = tokio::time::timeout(
            self.timeout,
            self.chat.complete(Some(&system), &messages),
        )
        .await
        .map_err(|_| {
            Error::OracleUnavailable(format!("redaction timed out after {:?}", self.timeout))
        })?
        .map_err(|e| Error::OracleUnavailable(e.to_string()))?;

        let rewritten = rewritten.trim().to_string();
        if rewritten.is_empty() {
            return Err(Error::OracleMalformedResponse(
                "redactor returned empty output".into(),
            ));
        }

        Ok(rewritten)
    }
}

/// Deterministic redactor over the shared value-pattern tables.
///
/// Replaces every span a protected-category pattern matches with the
/// placeholder. Used in pattern mode and tests; shares its patterns with
/// `PatternOracle`, so anything that oracle flags is removed here.
pub struct PatternRedactor {
    rules: Vec<(FieldCategory, Regex)>,
}

impl PatternRedactor {
    pub fn new(allowed_fields: &BTreeSet<FieldCategory>) -> Result<Self> {
        let rules = compile_value_rules()?
            .into_iter()
            .filter(|(category, _)| !allowed_fields.contains(category))
            .collect();
        Ok(Self { rules })
    }
}

#[async_trait]
impl Redactor for PatternRedactor {
    async fn sanitize(&self, unsafe_text: &str) -> Result<String> {
        let mut result = unsafe_text.to_string();
        for (category, pattern) in &self.rules {
            if pattern.is_match(&result) {
                tracing::debug!(category = %category, "redacting span");
                result = pattern
                    .replace_all(&result, REDACTION_PLACEHOLDER)
                    .into_owned();
            }
        }
        Ok(result)
    }
}
