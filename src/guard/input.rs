//! Input guard
//!
//! Evaluates candidate user messages against the input-request policy
//! strictly before they are appended to history and before any generation
//! call is made: a rejected input must never reach the completion oracle.

use std::sync::Arc;

use crate::policy::{Policy, PolicyName, PolicyOracle, Verdict};

/// Guards the user-to-assistant direction of the pipeline
pub struct InputGuard {
    oracle: Arc<dyn PolicyOracle>,
    policy: Policy,
}

impl InputGuard {
    /// Create an input guard. The policy must be the input-request policy.
    pub fn new(oracle: Arc<dyn PolicyOracle>, policy: Policy) -> Self {
        debug_assert_eq!(policy.name, PolicyName::InputRequest);
        Self { oracle, policy }
    }

    /// Judge a candidate user message.
    ///
    /// Never returns an error: any oracle failure is normalized to a
    /// denial (fail closed) and the underlying cause is logged, not shown
    /// to the user.
    pub async fn check(&self, candidate: &str) -> Verdict {
        match self.oracle.evaluate(&self.policy, candidate).await {
            Ok(verdict) => verdict,
            Err(e) => {
                tracing::warn!(
                    oracle = self.oracle.name(),
                    error = %e,
                    "input guard oracle failure, failing closed"
                );
                Verdict::deny_fail_closed()
            }
        }
    }
}
