use std::sync::Arc;

use log::{debug, warn};

use crate::device::Device;
use crate::engine::{send_next, Inner};
use crate::error::ResponseCode;
use crate::helpers::lock;
use crate::response::Response;
use crate::Token;

/// Returned by response and unsolicited callbacks to report whether the
/// payload was recognized.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchStatus {
    Handled,
    Unhandled,
}

/// Registered handler for unsolicited result codes, matched by line prefix
/// (`+CREG`, `RING`, ...).
pub(crate) struct UnsolHandler {
    pub(crate) prefix: &'static str,
    pub(crate) callback: Box<dyn Fn(&str, ResponseCode) -> DispatchStatus + Send + Sync>,
}

/// Dispatch thread body: drain the response queue, invoke completion
/// callbacks, then give the scheduler a chance to transmit the next queued
/// command. Exits when the queue is shut down.
pub(crate) fn run<D: Device, T: Token>(inner: Arc<Inner<D, T>>) {
    loop {
        while let Some(response) = inner.responses.try_pop() {
            dispatch_one(&inner, response);
        }

        send_next(&inner);

        match inner.responses.wait_pop() {
            Some(response) => dispatch_one(&inner, response),
            None => break,
        }
    }
    debug!("Dispatch thread exiting");
}

fn dispatch_one<D: Device, T: Token>(inner: &Inner<D, T>, response: Response) {
    let Some(id) = response.request else {
        unsolicited(inner, &response);
        return;
    };

    // The request stays registered while its callback runs: a data
    // continuation for an expect-data prompt is issued from inside the
    // callback, and it must still find the request. Only the callback and
    // token leave the lock (the callback may submit follow-up commands).
    let Some((callback, token)) = lock(&inner.requests)
        .get(id)
        .map(|r| (r.callback.clone(), r.token.clone()))
    else {
        // Completed during recovery; whatever this was, treat it as traffic.
        unsolicited(inner, &response);
        return;
    };

    let status = (callback)(response.text.as_deref(), response.code, &token);

    if response.code != ResponseCode::OkExpectData {
        lock(&inner.requests).unregister(id);
    }

    if status == DispatchStatus::Unhandled {
        // The requester did not recognize the payload; give the unsolicited
        // handlers a look before dropping it.
        unsolicited(inner, &response);
    }
}

fn unsolicited<D: Device, T: Token>(inner: &Inner<D, T>, response: &Response) {
    let Some(text) = response.text.as_deref() else {
        return;
    };

    for handler in &inner.unsol_handlers {
        if text.starts_with(handler.prefix)
            && (handler.callback)(text, response.code) == DispatchStatus::Handled
        {
            return;
        }
    }

    warn!("Ignored unsolicited: {:?}", text);
}
