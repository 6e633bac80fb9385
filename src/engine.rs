use std::io;
use std::marker::PhantomData;
use std::sync::mpsc;
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle, ThreadId};

use log::{debug, error, warn};

use crate::config::Config;
use crate::device::Device;
use crate::dispatch::{self, DispatchStatus, UnsolHandler};
use crate::error::{Error, ResponseCode};
use crate::helpers::{lock, LossyStr};
use crate::recovery::{self, RecoveryState};
use crate::request::{RequestFlags, RequestRegistry, RequestState};
use crate::response::{Response, ResponseQueue};
use crate::Token;

/// Commands issued to every modem before anything else: echo on, result
/// codes on and verbose, numeric `+CME ERROR` reporting. The echo is load
/// bearing, the framer relies on it to confirm transmission.
const SETUP_COMMANDS: [&str; 2] = ["ATE1Q0V1", "AT+CMEE=1"];

/// Shared state behind an [`Engine`] and its worker threads.
pub(crate) struct Inner<D, T> {
    pub(crate) device: D,
    pub(crate) config: Config,
    /// Serializes send, recv and open/close/power against each other. The
    /// readability poll runs outside it, see [`Device`].
    pub(crate) io_lock: Mutex<()>,
    pub(crate) requests: Mutex<RequestRegistry<T>>,
    pub(crate) responses: ResponseQueue,
    pub(crate) recovery: Mutex<RecoveryState>,
    pub(crate) unsol_handlers: Vec<UnsolHandler>,
    pub(crate) dispatch_thread: Mutex<Option<ThreadId>>,
    threads: Mutex<Vec<JoinHandle<()>>>,
}

/// Builder for [`Engine`]. Unsolicited handlers can only be registered here,
/// before any traffic flows.
pub struct EngineBuilder<D, T> {
    device: D,
    config: Config,
    unsol_handlers: Vec<UnsolHandler>,
    _token: PhantomData<T>,
}

impl<D: Device, T: Token> EngineBuilder<D, T> {
    pub fn config(mut self, config: Config) -> Self {
        self.config = config;
        self
    }

    /// Register a handler for unsolicited result codes starting with
    /// `prefix`. Handlers are tried in registration order; the first one
    /// returning [`DispatchStatus::Handled`] wins.
    pub fn unsol(
        mut self,
        prefix: &'static str,
        callback: impl Fn(&str, ResponseCode) -> DispatchStatus + Send + Sync + 'static,
    ) -> Self {
        self.unsol_handlers.push(UnsolHandler {
            prefix,
            callback: Box::new(callback),
        });
        self
    }

    pub fn build(self) -> Engine<D, T> {
        Engine {
            inner: Arc::new(Inner {
                device: self.device,
                config: self.config,
                io_lock: Mutex::new(()),
                requests: Mutex::new(RequestRegistry::new()),
                responses: ResponseQueue::new(),
                recovery: Mutex::new(RecoveryState::new()),
                unsol_handlers: self.unsol_handlers,
                dispatch_thread: Mutex::new(None),
                threads: Mutex::new(Vec::new()),
            }),
        }
    }
}

/// Asynchronous AT command engine.
///
/// Owns a [`Device`], a receive thread that frames the byte stream and a
/// dispatch thread that runs completion callbacks. Commands are queued with
/// [`submit`] and transmitted one at a time; the next command goes out only
/// once the previous one has been answered.
///
/// Cloning is cheap and yields a handle to the same engine.
///
/// [`submit`]: Engine::submit
pub struct Engine<D, T> {
    pub(crate) inner: Arc<Inner<D, T>>,
}

impl<D, T> Clone for Engine<D, T> {
    fn clone(&self) -> Self {
        Engine {
            inner: self.inner.clone(),
        }
    }
}

impl<D: Device, T: Token> Engine<D, T> {
    pub fn builder(device: D) -> EngineBuilder<D, T> {
        EngineBuilder {
            device,
            config: Config::default(),
            unsol_handlers: Vec::new(),
            _token: PhantomData,
        }
    }

    /// Power-cycle and open the device, spawn the worker threads and run the
    /// setup sequence.
    pub fn start(&self) -> Result<(), Error> {
        {
            let _io = lock(&self.inner.io_lock);
            self.inner.device.power_off().map_err(Error::Power)?;
            self.inner.device.power_on().map_err(Error::Power)?;
            self.inner.device.boot().map_err(Error::Power)?;
            self.inner.device.open().map_err(Error::Open)?;
        }

        let dispatch = {
            let inner = self.inner.clone();
            thread::Builder::new()
                .name("at-dispatch".into())
                .spawn(move || {
                    *lock(&inner.dispatch_thread) = Some(thread::current().id());
                    dispatch::run(inner);
                })
                .map_err(Error::Thread)?
        };
        let recv = {
            let engine = self.clone();
            thread::Builder::new()
                .name("at-recv".into())
                .spawn(move || recovery::recv_thread(engine))
                .map_err(Error::Thread)?
        };
        {
            let mut threads = lock(&self.inner.threads);
            threads.push(dispatch);
            threads.push(recv);
        }

        self.run_setup()
    }

    /// Queue a command. `callback` runs on the dispatch thread once the
    /// terminating status line (or a transport failure) resolves it; `token`
    /// is handed back to the callback for correlation.
    pub fn submit(
        &self,
        command: &str,
        token: T,
        callback: impl Fn(Option<&str>, ResponseCode, &T) -> DispatchStatus + Send + Sync + 'static,
        flags: RequestFlags,
    ) -> Result<(), Error> {
        if lock(&self.inner.recovery).fatal {
            return Err(Error::Fatal);
        }
        debug!("Queueing {:?}", command);
        lock(&self.inner.requests).register(command, token, Arc::new(callback), flags);
        send_next(&self.inner);
        Ok(())
    }

    /// Queue a command and block the calling thread until its status line
    /// arrives. Must not be called from a completion callback; that would
    /// deadlock the dispatch thread, and is rejected with
    /// [`Error::WouldDeadlock`].
    pub fn submit_locked(
        &self,
        command: &str,
        mut flags: RequestFlags,
    ) -> Result<ResponseCode, Error> {
        if Some(thread::current().id()) == *lock(&self.inner.dispatch_thread) {
            return Err(Error::WouldDeadlock);
        }
        flags.locked = true;

        let (tx, rx) = mpsc::sync_channel(1);
        self.submit(
            command,
            T::default(),
            move |_, code, _| {
                let _ = tx.send(code);
                DispatchStatus::Handled
            },
            flags,
        )?;
        // The sender is dropped unresolved if the engine tears down.
        rx.recv().map_err(|_| Error::Fatal)
    }

    /// Transmit the data payload of a command that was answered with the
    /// `"> "` prompt (`AT+CMGS` and friends), terminated with Ctrl-Z. The
    /// request identified by `token` must still be awaiting its final status.
    pub fn send_request_data(&self, token: &T, data: &[u8]) -> Result<(), Error> {
        {
            let requests = lock(&self.inner.requests);
            match requests.find_token(token) {
                Some(request) if request.state == RequestState::Sent => {}
                _ => return Err(Error::NotExpectingData),
            }
        }

        let mut payload = data.to_vec();
        payload.push(0x1a);
        debug!("Tx data: {:?}", LossyStr(&payload));
        let _io = lock(&self.inner.io_lock);
        write_all(&self.inner.device, &payload).map_err(Error::Write)
    }

    /// Wait for the worker threads to exit. They only do after an
    /// unrecoverable transport failure.
    pub fn join(&self) {
        let handles: Vec<_> = lock(&self.inner.threads).drain(..).collect();
        for handle in handles {
            let _ = handle.join();
        }
    }

    /// Built-in setup sequence plus the device's own, issued urgent so it
    /// goes through even while ordinary traffic is frozen during recovery.
    pub(crate) fn run_setup(&self) -> Result<(), Error> {
        if self.inner.config.builtin_setup {
            for command in SETUP_COMMANDS {
                self.setup_command(command)?;
            }
        }
        for command in self.inner.device.setup_commands() {
            self.setup_command(&command)?;
        }
        Ok(())
    }

    fn setup_command(&self, command: &str) -> Result<(), Error> {
        let code = self.submit_locked(command, RequestFlags::urgent())?;
        if !code.is_success() {
            warn!("Setup command {:?} answered {}", command, code.as_str());
        }
        Ok(())
    }
}

/// Transmit the next queued command, if the line discipline allows one.
///
/// Urgent requests jump the queue and ignore the freeze flag; everything
/// else waits until nothing is in flight and the transport is not being
/// recovered.
pub(crate) fn send_next<D: Device, T: Token>(inner: &Inner<D, T>) {
    let mut requests = lock(&inner.requests);

    let id = match requests.find_urgent_waiting().map(|r| r.id) {
        Some(id) => id,
        None => {
            if requests.find_state(RequestState::Pending).is_some()
                || requests.find_state(RequestState::Sent).is_some()
                || requests.find_state(RequestState::Freezed).is_some()
            {
                return;
            }
            if lock(&inner.recovery).frozen {
                return;
            }
            match requests.find_state(RequestState::Waiting).map(|r| r.id) {
                Some(id) => id,
                None => return,
            }
        }
    };

    let Some(request) = requests.get_mut(id) else {
        return;
    };
    request.state = RequestState::Pending;
    let sep = request.flags.delimiters.as_str();
    let frame = format!("{sep}{}{sep}", request.command);

    debug!("Tx: {:?}", LossyStr(frame.as_bytes()));
    let result = {
        let _io = lock(&inner.io_lock);
        write_all(&inner.device, frame.as_bytes())
    };
    if let Err(err) = result {
        error!("Transmit failed: {}", err);
        // Resolve the request through the dispatch queue so a blocked locked
        // submitter is released; dispatch unregisters it.
        inner.responses.push(Response {
            text: None,
            code: ResponseCode::Internal,
            request: Some(id),
        });
    }
}

pub(crate) fn write_all<D: Device>(device: &D, mut data: &[u8]) -> io::Result<()> {
    while !data.is_empty() {
        match device.send(data)? {
            0 => {
                return Err(io::Error::new(
                    io::ErrorKind::WriteZero,
                    "device accepted no bytes",
                ))
            }
            n => data = &data[n..],
        }
    }
    Ok(())
}
