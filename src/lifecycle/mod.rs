//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Identity (identity.rs):
//!     Resolve account → Keep / Drop privileges / Refuse
//!
//! Startup (startup.rs):
//!     INIT → MIGRATING (blocking steps) → SERVING (exec or supervise)
//!                                       ↘ FAILED (exit with step status)
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT/SIGQUIT/SIGHUP/SIGUSR1/SIGUSR2 → forwarded to the foreground child
//! ```
//!
//! # Design Decisions
//! - Identity first, then signal handlers, then the first child
//! - The server step only runs after every fatal step exited 0
//! - The orchestrator's exit status is the server's exit status

pub mod identity;
pub mod signals;
pub mod startup;

pub use startup::{launch, Orchestrator, Phase};
