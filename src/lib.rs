//! dirguard - Two-sided PII guardrail pipeline for a directory assistant
//!
//! dirguard wraps a conversational colleague-directory assistant in a
//! bidirectional guardrail: every inbound user message and every outbound
//! assistant reply is independently judged safe or unsafe by a policy
//! oracle before it may cross into history or onto the screen.
//!
//! ## Architecture
//!
//! ```text
//!                       ┌──────────────────────────────┐
//!   User: ...  ────────▶│          InputGuard          │──reject──▶ "Input rejected: ..."
//!                       │   (input-request policy)     │            (nothing committed)
//!                       └──────────────┬───────────────┘
//!                                      │ allow
//!                       ┌──────────────▼───────────────┐
//!                       │      Completion oracle       │
//!                       │      (full history in)       │
//!                       └──────────────┬───────────────┘
//!                                      │ candidate reply
//!                       ┌──────────────▼───────────────┐
//!                       │          OutputGuard         │──allow──▶ display + commit
//!                       │   (output-exposure policy)   │
//!                       └──────────────┬───────────────┘
//!                                      │ deny
//!                         soft_response┴───────────────┐
//!                       ┌──────────────▼─────┐  ┌──────▼────────────┐
//!                       │      Redactor      │  │  Rejection notice │
//!                       │ commit (redacted)  │  │ commit (notice)   │
//!                       └────────────────────┘  └───────────────────┘
//! ```
//!
//! Both guards fail closed: an oracle that cannot produce a structurally
//! valid verdict is treated as having said "unsafe". The policy oracle is
//! a pluggable seam with a generative backend and a deterministic
//! pattern-matching backend for reproducible testing.
//!
//! ## Modules
//!
//! - [`oracle`]: model endpoint transport (chat client, retry policy)
//! - [`policy`]: policies, verdicts, and the two oracle backends
//! - [`guard`]: input/output guards and redaction
//! - [`session`]: append-only history, turn state machine, session driver
//! - [`console`]: line-oriented chat surface
//! - [`config`]: configuration management

pub mod config;
pub mod console;
pub mod error;
pub mod guard;
pub mod oracle;
pub mod policy;
pub mod session;

pub use config::DirguardConfig;
pub use error::{Error, Result};
