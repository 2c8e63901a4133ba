//! Chat runtime for slotbot.
//!
//! Wraps the pure dialogue engine from `slotbot-core` with per-session state:
//! - `session` keeps one conversation state per session id, with idle expiry
//! - `runtime` resolves the session, runs one turn under its lock and maps errors
//!
//! Both the HTTP server and the CLI drive conversations through [`ChatRuntime`].

pub mod runtime;
pub mod session;

pub use runtime::{ChatReply, ChatRuntime, DynEngine};
pub use session::{SessionError, SessionSnapshot, SessionStore};
