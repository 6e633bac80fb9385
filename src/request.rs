use std::sync::Arc;

use crate::dispatch::DispatchStatus;
use crate::error::ResponseCode;
use crate::Token;

/// Line terminator(s) wrapped around an outgoing command. Most modems want
/// `\r\n`, but some firmwares only accept a bare `\r` (or `\n`) for specific
/// commands.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Delimiters {
    #[default]
    CrLf,
    Cr,
    Lf,
}

impl Delimiters {
    pub(crate) fn as_str(self) -> &'static str {
        match self {
            Delimiters::CrLf => "\r\n",
            Delimiters::Cr => "\r",
            Delimiters::Lf => "\n",
        }
    }
}

/// Per-request submission flags, replacing the bit constants of older AT
/// stacks with named fields.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RequestFlags {
    pub delimiters: Delimiters,
    /// Transmit immediately, bypassing the single-outstanding discipline and
    /// the freeze flag. Used for the setup sequence after a transport reopen.
    pub urgent: bool,
    /// Set on requests issued through [`Engine::submit_locked`].
    ///
    /// [`Engine::submit_locked`]: crate::Engine::submit_locked
    pub locked: bool,
    /// The modem swallows the echo of the command *following* this one, and
    /// sends no response of its own (in-call DTMF via `AT+VTS`). The framer
    /// synthesizes an `OK` on echo and arms a one-shot flag confirming the
    /// next pending request without its echo.
    pub no_wait: bool,
}

impl RequestFlags {
    pub fn urgent() -> Self {
        RequestFlags {
            urgent: true,
            ..Default::default()
        }
    }

    pub fn no_wait() -> Self {
        RequestFlags {
            no_wait: true,
            ..Default::default()
        }
    }
}

/// Request lifecycle. At most one request may be in `Pending`, `Sent` or
/// `Freezed` at any time; the scheduler enforces it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestState {
    /// Queued, not yet transmitted.
    Waiting,
    /// Transmitted, awaiting the modem's echo.
    Pending,
    /// Echo consumed, awaiting the terminating status line.
    Sent,
    /// Parked while the transport is being recovered; returns to `Waiting`
    /// once the transport is reopened.
    Freezed,
}

/// Completion callback: response body (if any), decoded status, and the
/// caller's correlation token. Runs on the dispatch thread.
pub(crate) type RequestCallback<T> =
    Arc<dyn Fn(Option<&str>, ResponseCode, &T) -> DispatchStatus + Send + Sync>;

/// Handle to a registered request. Stable across registry mutations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct RequestId(u64);

pub(crate) struct Request<T> {
    pub(crate) id: RequestId,
    pub(crate) command: String,
    pub(crate) token: T,
    pub(crate) callback: RequestCallback<T>,
    pub(crate) flags: RequestFlags,
    pub(crate) state: RequestState,
}

/// Ordered collection of in-flight requests. Insertion order is submission
/// order; every lookup scans from the front so "find by state" always yields
/// the oldest matching request.
pub(crate) struct RequestRegistry<T> {
    entries: Vec<Request<T>>,
    next_id: u64,
}

impl<T: Token> RequestRegistry<T> {
    pub(crate) fn new() -> Self {
        RequestRegistry {
            entries: Vec::new(),
            next_id: 0,
        }
    }

    pub(crate) fn register(
        &mut self,
        command: &str,
        token: T,
        callback: RequestCallback<T>,
        flags: RequestFlags,
    ) -> RequestId {
        let id = RequestId(self.next_id);
        self.next_id += 1;
        self.entries.push(Request {
            id,
            command: command.to_owned(),
            token,
            callback,
            flags,
            state: RequestState::Waiting,
        });
        id
    }

    pub(crate) fn unregister(&mut self, id: RequestId) {
        self.entries.retain(|r| r.id != id);
    }

    pub(crate) fn get(&self, id: RequestId) -> Option<&Request<T>> {
        self.entries.iter().find(|r| r.id == id)
    }

    pub(crate) fn get_mut(&mut self, id: RequestId) -> Option<&mut Request<T>> {
        self.entries.iter_mut().find(|r| r.id == id)
    }

    /// Oldest request in the given state.
    pub(crate) fn find_state(&self, state: RequestState) -> Option<&Request<T>> {
        self.entries.iter().find(|r| r.state == state)
    }

    pub(crate) fn find_urgent_waiting(&self) -> Option<&Request<T>> {
        self.entries
            .iter()
            .find(|r| r.flags.urgent && r.state == RequestState::Waiting)
    }

    pub(crate) fn find_token(&self, token: &T) -> Option<&Request<T>> {
        self.entries.iter().find(|r| r.token == *token)
    }

    /// Park every in-flight request while the transport is recovered.
    pub(crate) fn freeze_in_flight(&mut self) {
        for request in &mut self.entries {
            if matches!(request.state, RequestState::Pending | RequestState::Sent) {
                request.state = RequestState::Freezed;
            }
        }
    }

    /// Return every frozen request to the send queue, in original order.
    pub(crate) fn thaw(&mut self) {
        for request in &mut self.entries {
            if request.state == RequestState::Freezed {
                request.state = RequestState::Waiting;
            }
        }
    }

    /// Drop everything. Completion callbacks are dropped unresolved, which
    /// releases any locked submitter blocked on them.
    pub(crate) fn clear(&mut self) {
        self.entries.clear();
    }
}
