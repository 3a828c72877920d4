//! Verdicts and the verdict wire contract
//!
//! A `Verdict` is the immutable result of one oracle evaluation. The wire
//! schema the generative oracle must produce is two fields:
//! `{"is_valid": <bool>, "reason": <short string>}`. Downstream logic
//! branches on this one contract, so parsing is strict about structure and
//! forgiving about packaging (code fences, surrounding prose).

use serde::Deserialize;

use crate::error::{Error, Result};

/// Default cap on verdict reason length, in characters.
///
/// The rationale field is bounded so the oracle cannot leak sensitive
/// content back through its own explanation.
pub const DEFAULT_REASON_CAP: usize = 240;

/// Reason recorded when an oracle failure is normalized to a denial
pub const FAIL_CLOSED_REASON: &str = "oracle failure: treated as unsafe";

/// Fallback reason when the oracle returned an empty rationale
const UNSPECIFIED_REASON: &str = "policy violation (unspecified category)";

/// Immutable result of one policy evaluation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Verdict {
    allowed: bool,
    reason: String,
}

impl Verdict {
    /// Build a verdict, enforcing the reason invariants: never empty,
    /// never longer than `reason_cap` characters.
    pub fn new(allowed: bool, reason: impl Into<String>, reason_cap: usize) -> Self {
        let mut reason: String = reason.into();
        let trimmed = reason.trim();
        if trimmed.is_empty() {
            reason = if allowed {
                "Allowed request".to_string()
            } else {
                UNSPECIFIED_REASON.to_string()
            };
        } else if trimmed.len() != reason.len() {
            reason = trimmed.to_string();
        }

        if reason.chars().count() > reason_cap {
            reason = reason.chars().take(reason_cap).collect();
        }

        Self { allowed, reason }
    }

    /// Positive verdict with the default reason cap
    pub fn allow(reason: impl Into<String>) -> Self {
        Self::new(true, reason, DEFAULT_REASON_CAP)
    }

    /// Negative verdict with the default reason cap
    pub fn deny(reason: impl Into<String>) -> Self {
        Self::new(false, reason, DEFAULT_REASON_CAP)
    }

    /// The denial substituted for any oracle failure (fail closed)
    pub fn deny_fail_closed() -> Self {
        Self::deny(FAIL_CLOSED_REASON)
    }

    pub fn is_allowed(&self) -> bool {
        self.allowed
    }

    pub fn reason(&self) -> &str {
        &self.reason
    }

    /// Parse a raw oracle reply into a verdict.
    ///
    /// Accepts the reply as-is, fenced, or embedded in prose: the outermost
    /// JSON object is extracted and must carry the wire schema. Anything
    /// else is `Error::OracleMalformedResponse`; the caller converts that
    /// to a denial at the guard boundary.
    pub fn parse_wire(raw: &str, reason_cap: usize) -> Result<Verdict> {
        let object = extract_json_object(raw).ok_or_else(|| {
            Error::OracleMalformedResponse("reply contains no JSON object".into())
        })?;

        let wire: WireVerdict = serde_json::from_str(object)
            .map_err(|e| Error::OracleMalformedResponse(e.to_string()))?;

        Ok(Verdict::new(wire.is_valid, wire.reason, reason_cap))
    }
}

/// The one wire contract shared with every oracle implementation.
/// `is_valid` is canonical; the `isAllowed` spelling is accepted on parse.
#[derive(Debug, Deserialize)]
struct WireVerdict {
    #[serde(alias = "isAllowed", alias = "is_allowed")]
    is_valid: bool,
    #[serde(default)]
    reason: String,
}

/// Extract the outermost balanced JSON object from `raw`, if any.
///
/// Walks from the first `{` tracking brace depth, skipping over string
/// literals and escapes so braces inside reasons do not confuse the scan.
fn extract_json_object(raw: &str) -> Option<&str> {
    let start = raw.find('{')?;
    let bytes = raw.as_bytes();
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (offset, &byte) in bytes[start..].iter().enumerate() {
        if escaped {
            escaped = false;
            continue;
        }
        match byte {
            b'\\' if in_string => escaped = true,
            b'"' => in_string = !in_string,
            b'{' if !in_string => depth += 1,
            b'}' if !in_string => {
                depth -= 1;
                if depth == 0 {
                    return Some(&raw[start..start + offset + 1]);
                }
            }
            _ => {}
        }
    }

    None
}
