//! Request/response engine for Hayes AT command modems.
//!
//! The serial link to an AT modem is half duplex in practice: only one
//! command may be awaiting an answer at any time, the modem echoes every
//! command it accepts, and it is free to interleave unsolicited notifications
//! (`RING`, `+CREG: ...`) with solicited traffic. This crate implements the
//! machinery needed to drive such a link reliably:
//!
//! - a request registry and send scheduler enforcing single-outstanding
//!   discipline, with an `urgent` escape hatch,
//! - a re-entrant line framer that reassembles raw reads into logical lines,
//!   consumes command echoes and recognizes terminating status lines
//!   (`OK`, `ERROR`, `+CME ERROR: <n>`, ...),
//! - a dedicated dispatch thread that matches framed responses to their
//!   originating request or to prefix-registered unsolicited handlers,
//! - a recovery controller that freezes in-flight requests when the
//!   transport fails, reopens it (escalating to a modem power cycle), and
//!   replays the frozen requests afterwards.
//!
//! The physical channel and power controls live behind the [`Device`] trait;
//! per-command string construction and response parsing are the caller's
//! business. The engine carries text and an opaque correlation token, nothing
//! more.

mod config;
mod digest;
mod dispatch;
mod engine;
mod helpers;
mod recovery;
mod request;
mod response;

pub mod device;
pub mod error;

pub use config::Config;
pub use device::Device;
pub use dispatch::DispatchStatus;
pub use engine::{Engine, EngineBuilder};
pub use error::{CmeError, Error, ResponseCode};
pub use request::{Delimiters, RequestFlags};

/// Upper bound on a single transport read, and on the framer's line
/// accumulation buffer. A response longer than this is a framing error and is
/// treated like a transport failure.
pub const AT_RECV_BYTES_MAX: usize = 1024;

/// Opaque correlation value attached to a request and handed back, untouched,
/// to its completion callback.
///
/// `Default` supplies the token for engine-internal submissions (the AT setup
/// sequence) and for [`Engine::submit_locked`], where the original caller has
/// nothing to correlate; wrapping a richer token in `Option` is the usual way
/// to satisfy it. `Clone` lets the dispatch thread hand the token to the
/// callback while the request itself stays registered.
pub trait Token: Clone + PartialEq + Default + Send + 'static {}

impl<T> Token for T where T: Clone + PartialEq + Default + Send + 'static {}
