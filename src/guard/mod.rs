//! Trust-boundary guards
//!
//! A guard issues an allow/deny `Verdict` before content crosses a trust
//! boundary: `InputGuard` before a user message enters history or reaches
//! generation, `OutputGuard` before an assistant reply is shown or
//! committed. Both normalize oracle failures to a denial here, at the
//! boundary, so callers only ever see a verdict; `Redactor` rewrites
//! replies the output guard refused.

pub mod input;
pub mod output;
pub mod redact;

pub use input::InputGuard;
pub use output::OutputGuard;
pub use redact::{LlmRedactor, PatternRedactor, Redactor, REDACTION_PLACEHOLDER};
