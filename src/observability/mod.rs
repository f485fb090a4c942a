//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! identity / phases / steps / signals
//!     → logging.rs (structured log events on stderr)
//!     → container log sink, interleaved with the steps' own output
//! ```
//!
//! # Design Decisions
//! - Step output is never captured or rewritten; only our own events are formatted
//! - Structured fields (step, pid, signal, exit) for machine parsing

pub mod logging;

pub use logging::init_logging;
