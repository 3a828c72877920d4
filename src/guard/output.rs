//! Output guard
//!
//! Evaluates candidate assistant replies against the output-exposure
//! policy after generation but before anything is shown to the user or
//! committed to history. What happens on a negative verdict (reject or
//! redact) is the session's deployment-time choice, not decided here.

use std::sync::Arc;

use crate::policy::{Policy, PolicyName, PolicyOracle, Verdict};

/// Guards the assistant-to-user direction of the pipeline
pub struct OutputGuard {
    oracle: Arc<dyn PolicyOracle>,
    policy: Policy,
}

impl OutputGuard {
    /// Create an output guard. The policy must be the output-exposure
    /// policy.
    pub fn new(oracle: Arc<dyn PolicyOracle>, policy: Policy) -> Self {
        debug_assert_eq!(policy.name, PolicyName::OutputExposure);
        Self { oracle, policy }
    }

    /// Judge a candidate assistant reply.
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
                    "output guard oracle failure, failing closed"
                );
                Verdict::deny_fail_closed()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{Error, Result};
    use crate::policy::verdict::FAIL_CLOSED_REASON;
    use crate::policy::{FieldCategory, PatternOracle};
    use async_trait::async_trait;
    use std::collections::BTreeSet;

    struct MalformedOracle;

    #[async_trait]
    impl PolicyOracle for MalformedOracle {
        async fn evaluate(&self, _: &Policy, _: &str) -> Result<Verdict> {
            Err(Error::OracleMalformedResponse("not a verdict".into()))
        }

        fn name(&self) -> &str {
            "malformed"
        }
    }

    fn policy() -> Policy {
        let allowed: BTreeSet<FieldCategory> =
            [FieldCategory::FullName, FieldCategory::Phone, FieldCategory::Email]
                .into_iter()
                .collect();
        Policy::output_exposure(vec!["rules".into()], allowed)
    }

    #[tokio::test]
    async fn clean_reply_passes() {
        let guard = OutputGuard::new(Arc::new(PatternOracle::new().unwrap()), policy());
        let verdict = guard
            .check("Amanda's phone number is (206) 555-0683.")
            .await;
        assert!(verdict.is_allowed());
    }

    #[tokio::test]
    async fn leaking_reply_is_denied() {
        let guard = OutputGuard::new(Arc::new(PatternOracle::new().unwrap()), policy());
        let verdict = guard.check("Her SSN is 890-12-3456.").await;
        assert!(!verdict.is_allowed());
        assert!(verdict.reason().contains("SSN"));
    }

    #[tokio::test]
    async fn malformed_oracle_reply_fails_closed() {
        let guard = OutputGuard::new(Arc::new(MalformedOracle), policy());
        let verdict = guard.check("any reply").await;
        assert!(!verdict.is_allowed());
        assert_eq!(verdict.reason(), FAIL_CLOSED_REASON);
    }
}
