use std::sync::Mutex;

use log::{debug, error, trace};

use crate::error::{Error, ResponseCode};
use crate::helpers::{lock, LossyStr};
use crate::request::{RequestRegistry, RequestState};
use crate::response::{Response, ResponseQueue};
use crate::{Token, AT_RECV_BYTES_MAX};

/// Incremental framer for the byte stream coming out of the modem.
///
/// Raw reads arrive in arbitrary chunks. The digester splits them into lines,
/// consumes the echo of the in-flight command, accumulates body lines until a
/// terminating status line arrives, and pushes framed [`Response`]s onto the
/// dispatch queue. Lines without a recognizable status while no command is
/// awaiting its response are flushed immediately as unsolicited.
pub(crate) struct Digester<const L: usize = AT_RECV_BYTES_MAX> {
    buf: heapless::Vec<u8, L>,
    /// Armed by a no-wait request: the modem swallowed the echo of the next
    /// command, so the next pending request is confirmed without one.
    confirm_next_pending: bool,
}

impl<const L: usize> Digester<L> {
    pub(crate) fn new() -> Self {
        Digester {
            buf: heapless::Vec::new(),
            confirm_next_pending: false,
        }
    }

    /// Discard partial state after a transport recovery. Whatever half-line
    /// the old descriptor produced is meaningless on the new one.
    pub(crate) fn reset(&mut self) {
        self.buf.clear();
        self.confirm_next_pending = false;
    }

    pub(crate) fn digest<T: Token>(
        &mut self,
        chunk: &[u8],
        registry: &Mutex<RequestRegistry<T>>,
        responses: &ResponseQueue,
    ) -> Result<(), Error> {
        trace!("Digesting: {:?}", LossyStr(chunk));

        let mut reg = lock(registry);

        if self.confirm_next_pending {
            if let Some(id) = reg.find_state(RequestState::Pending).map(|r| r.id) {
                self.confirm_next_pending = false;
                if let Some(request) = reg.get_mut(id) {
                    request.state = RequestState::Sent;
                }
            }
        }

        // A chunk boundary closes the current line just like a terminator
        // does; a straddled body line comes through as two joined lines.
        for line in chunk.split(|b| matches!(b, b'\r' | b'\n' | b'\0')) {
            if line.is_empty() {
                continue;
            }

            // Echo of the command we just transmitted.
            let pending = reg
                .find_state(RequestState::Pending)
                .map(|r| (r.id, r.flags));
            if let Some((id, flags)) = pending {
                let command = reg.get(id).map(|r| r.command.clone()).unwrap_or_default();
                if line.starts_with(command.as_bytes()) {
                    if let Some(request) = reg.get_mut(id) {
                        request.state = RequestState::Sent;
                    }
                    if flags.no_wait {
                        // The modem answers this command with silence and
                        // eats the next echo. Complete it here and arm the
                        // one-shot confirmation.
                        self.confirm_next_pending = true;
                        responses.push(Response {
                            text: None,
                            code: ResponseCode::Ok,
                            request: Some(id),
                        });
                    }
                    self.buf.clear();
                    continue;
                }
            }

            let separator = usize::from(!self.buf.is_empty());
            if self.buf.len() + separator + line.len() > L {
                error!("Receive buffer overflow ({} bytes)", L);
                return Err(Error::Overflow);
            }
            let body_len = self.buf.len();
            if separator == 1 {
                let _ = self.buf.push(b'\n');
            }
            let _ = self.buf.extend_from_slice(line);

            let code = ResponseCode::decode(&String::from_utf8_lossy(line));
            let sent = reg.find_state(RequestState::Sent).map(|r| r.id);

            if code != ResponseCode::Undef {
                let text = (body_len > 0)
                    .then(|| String::from_utf8_lossy(&self.buf[..body_len]).into_owned());
                debug!("Response {:?}: {:?}", code, LossyStr(&self.buf[..body_len]));
                responses.push(Response {
                    text,
                    code,
                    request: sent,
                });
                self.buf.clear();
            } else if sent.is_none() {
                // Nothing in flight: unsolicited line, flush as-is.
                let text = String::from_utf8_lossy(&self.buf).into_owned();
                debug!("Unsolicited: {:?}", LossyStr(self.buf.as_slice()));
                responses.push(Response {
                    text: Some(text),
                    code: ResponseCode::Undef,
                    request: None,
                });
                self.buf.clear();
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::dispatch::DispatchStatus;
    use crate::error::CmeError;
    use crate::request::{RequestCallback, RequestFlags, RequestId};
    use std::sync::Arc;

    fn noop_callback() -> RequestCallback<u32> {
        Arc::new(|_, _, _| DispatchStatus::Handled)
    }

    fn setup() -> (Mutex<RequestRegistry<u32>>, ResponseQueue) {
        (Mutex::new(RequestRegistry::new()), ResponseQueue::new())
    }

    fn submit_pending(
        registry: &Mutex<RequestRegistry<u32>>,
        command: &str,
        flags: RequestFlags,
    ) -> RequestId {
        let mut reg = lock(registry);
        let id = reg.register(command, 0, noop_callback(), flags);
        reg.get_mut(id).unwrap().state = RequestState::Pending;
        id
    }

    #[test]
    fn echo_is_consumed() {
        let (registry, responses) = setup();
        let id = submit_pending(&registry, "AT+CLCC", RequestFlags::default());

        let mut digester: Digester = Digester::new();
        digester
            .digest(b"AT+CLCC\r\r\n", &registry, &responses)
            .unwrap();

        assert_eq!(
            lock(&registry).get(id).unwrap().state,
            RequestState::Sent
        );
        assert!(responses.try_pop().is_none());
    }

    #[test]
    fn status_terminates_accumulated_body() {
        let (registry, responses) = setup();
        let id = submit_pending(&registry, "AT+CSQ", RequestFlags::default());

        let mut digester: Digester = Digester::new();
        digester
            .digest(b"AT+CSQ\r\r\n+CSQ: 14,99\r\n\r\nOK\r\n", &registry, &responses)
            .unwrap();

        let response = responses.try_pop().unwrap();
        assert_eq!(response.code, ResponseCode::Ok);
        assert_eq!(response.text.as_deref(), Some("+CSQ: 14,99"));
        assert_eq!(response.request, Some(id));
        assert!(responses.try_pop().is_none());
    }

    #[test]
    fn body_straddling_chunks_is_joined() {
        let (registry, responses) = setup();
        submit_pending(&registry, "AT+CSQ", RequestFlags::default());

        let mut digester: Digester = Digester::new();
        digester
            .digest(b"AT+CSQ\r\r\n+CSQ: 14,", &registry, &responses)
            .unwrap();
        digester.digest(b"99\r\nOK\r\n", &registry, &responses).unwrap();

        let response = responses.try_pop().unwrap();
        assert_eq!(response.code, ResponseCode::Ok);
        assert_eq!(response.text.as_deref(), Some("+CSQ: 14,\n99"));
    }

    #[test]
    fn no_wait_synthesizes_ok_and_confirms_next() {
        let (registry, responses) = setup();
        let dtmf = submit_pending(&registry, "AT+VTS=5", RequestFlags::no_wait());

        let mut digester: Digester = Digester::new();
        digester.digest(b"AT+VTS=5\r", &registry, &responses).unwrap();

        let synthetic = responses.try_pop().unwrap();
        assert_eq!(synthetic.code, ResponseCode::Ok);
        assert_eq!(synthetic.request, Some(dtmf));

        // Next command's echo is swallowed by the modem. Its OK must still
        // land on it via the one-shot confirmation.
        {
            let mut reg = lock(&registry);
            reg.unregister(dtmf);
        }
        let next = submit_pending(&registry, "AT+CLCC", RequestFlags::default());
        digester.digest(b"\r\nOK\r\n", &registry, &responses).unwrap();

        let response = responses.try_pop().unwrap();
        assert_eq!(response.code, ResponseCode::Ok);
        assert_eq!(response.request, Some(next));
    }

    // Two back-to-back silent commands: the one-shot flag only covers one
    // lost echo, so the second command is promoted to awaiting-status but is
    // not completed until real traffic arrives.
    #[test]
    fn back_to_back_no_wait_promotes_without_completing() {
        let (registry, responses) = setup();
        let first = submit_pending(&registry, "AT+VTS=1", RequestFlags::no_wait());

        let mut digester: Digester = Digester::new();
        digester.digest(b"AT+VTS=1\r", &registry, &responses).unwrap();
        assert_eq!(responses.try_pop().unwrap().request, Some(first));
        {
            let mut reg = lock(&registry);
            reg.unregister(first);
        }

        let second = submit_pending(&registry, "AT+VTS=2", RequestFlags::no_wait());
        digester.digest(b"\r\n", &registry, &responses).unwrap();

        assert_eq!(
            lock(&registry).get(second).unwrap().state,
            RequestState::Sent
        );
        assert!(responses.try_pop().is_none());
    }

    #[test]
    fn unsolicited_line_flushes_immediately() {
        let (registry, responses) = setup();

        let mut digester: Digester = Digester::new();
        digester.digest(b"\r\nRING\r\n", &registry, &responses).unwrap();

        let response = responses.try_pop().unwrap();
        assert_eq!(response.code, ResponseCode::Undef);
        assert_eq!(response.text.as_deref(), Some("RING"));
        assert_eq!(response.request, None);
    }

    #[test]
    fn cme_error_carries_subcode() {
        let (registry, responses) = setup();
        let id = submit_pending(&registry, "AT+CPIN=\"0000\"", RequestFlags::default());

        let mut digester: Digester = Digester::new();
        digester
            .digest(
                b"AT+CPIN=\"0000\"\r\r\n+CME ERROR: 16\r\n",
                &registry,
                &responses,
            )
            .unwrap();

        let response = responses.try_pop().unwrap();
        assert_eq!(
            response.code,
            ResponseCode::Cme(CmeError::IncorrectPassword)
        );
        assert_eq!(response.text, None);
        assert_eq!(response.request, Some(id));
    }

    #[test]
    fn overflow_is_reported() {
        let (registry, responses) = setup();

        let mut digester: Digester<16> = Digester::new();
        let result = digester.digest(&[b'x'; 32], &registry, &responses);
        assert!(matches!(result, Err(Error::Overflow)));
    }
}
