use std::collections::VecDeque;
use std::sync::{Condvar, Mutex};

use crate::error::ResponseCode;
use crate::helpers::lock;
use crate::request::RequestId;

/// A framed response line (or multi-line block) handed from the reader to the
/// dispatch thread.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Response {
    /// Body text preceding the status line, lines joined with `\n`. `None`
    /// for bare status responses.
    pub(crate) text: Option<String>,
    pub(crate) code: ResponseCode,
    /// Request this response completes, or `None` for unsolicited traffic.
    pub(crate) request: Option<RequestId>,
}

struct QueueState {
    items: VecDeque<Response>,
    shutdown: bool,
}

/// MPSC handoff between the reader and the dispatch thread. The reader pushes,
/// the dispatch thread blocks in [`wait_pop`] until woken.
///
/// [`wait_pop`]: ResponseQueue::wait_pop
pub(crate) struct ResponseQueue {
    state: Mutex<QueueState>,
    available: Condvar,
}

impl ResponseQueue {
    pub(crate) fn new() -> Self {
        ResponseQueue {
            state: Mutex::new(QueueState {
                items: VecDeque::new(),
                shutdown: false,
            }),
            available: Condvar::new(),
        }
    }

    pub(crate) fn push(&self, response: Response) {
        let mut state = lock(&self.state);
        state.items.push_back(response);
        self.available.notify_one();
    }

    pub(crate) fn try_pop(&self) -> Option<Response> {
        lock(&self.state).items.pop_front()
    }

    /// Block until a response is available. Returns `None` once the queue has
    /// been shut down and drained.
    pub(crate) fn wait_pop(&self) -> Option<Response> {
        let mut state = lock(&self.state);
        loop {
            if let Some(response) = state.items.pop_front() {
                return Some(response);
            }
            if state.shutdown {
                return None;
            }
            state = self
                .available
                .wait(state)
                .unwrap_or_else(std::sync::PoisonError::into_inner);
        }
    }

    /// Wake the dispatch thread and make it exit once the queue drains.
    pub(crate) fn shutdown(&self) {
        let mut state = lock(&self.state);
        state.shutdown = true;
        self.available.notify_one();
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    fn response(code: ResponseCode) -> Response {
        Response {
            text: None,
            code,
            request: None,
        }
    }

    #[test]
    fn push_pop_fifo() {
        let queue = ResponseQueue::new();
        queue.push(response(ResponseCode::Ok));
        queue.push(response(ResponseCode::Error));
        assert_eq!(queue.try_pop().unwrap().code, ResponseCode::Ok);
        assert_eq!(queue.try_pop().unwrap().code, ResponseCode::Error);
        assert!(queue.try_pop().is_none());
    }

    #[test]
    fn wait_pop_blocks_until_push() {
        let queue = Arc::new(ResponseQueue::new());
        let waiter = {
            let queue = queue.clone();
            thread::spawn(move || queue.wait_pop())
        };
        queue.push(response(ResponseCode::NoCarrier));
        let popped = waiter.join().unwrap();
        assert_eq!(popped.unwrap().code, ResponseCode::NoCarrier);
    }

    #[test]
    fn shutdown_drains_then_stops() {
        let queue = ResponseQueue::new();
        queue.push(response(ResponseCode::Ok));
        queue.shutdown();
        assert!(queue.wait_pop().is_some());
        assert!(queue.wait_pop().is_none());
    }
}
