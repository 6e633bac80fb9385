//! Scriptable in-memory modem for integration tests.

use std::collections::VecDeque;
use std::io;
use std::sync::mpsc;
use std::sync::{Arc, Condvar, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use hayes_engine::Device;

enum Event {
    Chunk(Vec<u8>),
    ReadError,
}

struct MockInner {
    events: Mutex<VecDeque<Event>>,
    readable: Condvar,
    sent: Mutex<mpsc::Sender<Vec<u8>>>,
    calls: Mutex<Vec<&'static str>>,
    setup_commands: Vec<String>,
}

impl MockInner {
    fn record(&self, call: &'static str) -> io::Result<()> {
        self.calls.lock().unwrap().push(call);
        Ok(())
    }
}

/// The [`Device`] half: handed to the engine.
pub struct MockDevice {
    inner: Arc<MockInner>,
}

/// The test half: feeds bytes and failures in, observes transmitted frames
/// and recorded device calls.
pub struct MockHandle {
    inner: Arc<MockInner>,
    sent: mpsc::Receiver<Vec<u8>>,
}

/// Clonable feeder for use from responder threads.
#[derive(Clone)]
pub struct MockFeeder {
    inner: Arc<MockInner>,
}

pub fn mock_device(setup_commands: &[&str]) -> (MockDevice, MockHandle) {
    let _ = env_logger::builder().is_test(true).try_init();
    let (tx, rx) = mpsc::channel();
    let inner = Arc::new(MockInner {
        events: Mutex::new(VecDeque::new()),
        readable: Condvar::new(),
        sent: Mutex::new(tx),
        calls: Mutex::new(Vec::new()),
        setup_commands: setup_commands.iter().map(|s| s.to_string()).collect(),
    });
    (
        MockDevice {
            inner: inner.clone(),
        },
        MockHandle { inner, sent: rx },
    )
}

impl Device for MockDevice {
    fn open(&self) -> io::Result<()> {
        self.inner.record("open")
    }

    fn close(&self) -> io::Result<()> {
        self.inner.record("close")
    }

    fn send(&self, data: &[u8]) -> io::Result<usize> {
        self.inner
            .sent
            .lock()
            .unwrap()
            .send(data.to_vec())
            .map_err(|_| io::Error::new(io::ErrorKind::BrokenPipe, "test dropped the handle"))?;
        Ok(data.len())
    }

    fn recv(&self, buf: &mut [u8]) -> io::Result<usize> {
        let event = self.inner.events.lock().unwrap().pop_front();
        match event {
            Some(Event::Chunk(bytes)) => {
                let n = bytes.len().min(buf.len());
                buf[..n].copy_from_slice(&bytes[..n]);
                Ok(n)
            }
            Some(Event::ReadError) => {
                Err(io::Error::new(io::ErrorKind::Other, "scripted read error"))
            }
            None => Err(io::Error::new(io::ErrorKind::WouldBlock, "nothing queued")),
        }
    }

    fn recv_poll(&self) -> io::Result<()> {
        let mut events = self.inner.events.lock().unwrap();
        while events.is_empty() {
            events = self.inner.readable.wait(events).unwrap();
        }
        Ok(())
    }

    fn power_on(&self) -> io::Result<()> {
        self.inner.record("power_on")
    }

    fn power_off(&self) -> io::Result<()> {
        self.inner.record("power_off")
    }

    fn boot(&self) -> io::Result<()> {
        self.inner.record("boot")
    }

    fn setup_commands(&self) -> Vec<String> {
        self.inner.setup_commands.clone()
    }
}

impl MockHandle {
    pub fn feeder(&self) -> MockFeeder {
        MockFeeder {
            inner: self.inner.clone(),
        }
    }

    pub fn feed(&self, bytes: &[u8]) {
        self.feeder().feed(bytes);
    }

    pub fn fail_read(&self) {
        self.feeder().fail_read();
    }

    /// Next transmitted frame, or panic after `timeout`.
    pub fn expect_sent(&self, timeout: Duration) -> Vec<u8> {
        match self.sent.recv_timeout(timeout) {
            Ok(frame) => frame,
            Err(err) => panic!("no frame transmitted within {:?}: {}", timeout, err),
        }
    }

    pub fn calls(&self) -> Vec<&'static str> {
        self.inner.calls.lock().unwrap().clone()
    }
}

impl MockFeeder {
    pub fn calls(&self) -> Vec<&'static str> {
        self.inner.calls.lock().unwrap().clone()
    }

    pub fn feed(&self, bytes: &[u8]) {
        let mut events = self.inner.events.lock().unwrap();
        events.push_back(Event::Chunk(bytes.to_vec()));
        self.inner.readable.notify_one();
    }

    pub fn fail_read(&self) {
        let mut events = self.inner.events.lock().unwrap();
        events.push_back(Event::ReadError);
        self.inner.readable.notify_one();
    }
}

/// Answer every transmitted frame from a background thread. `reply` gets the
/// frame with its delimiters trimmed and returns the bytes to feed back, or
/// `None` to stay silent. Commands are also appended to the returned log.
pub fn auto_responder<F>(handle: MockHandle, reply: F) -> Arc<Mutex<Vec<String>>>
where
    F: Fn(&str) -> Option<String> + Send + 'static,
{
    let log = Arc::new(Mutex::new(Vec::new()));
    let thread_log = log.clone();
    thread::spawn(move || {
        while let Ok(frame) = handle.sent.recv() {
            let command = String::from_utf8_lossy(&frame)
                .trim_matches(&['\r', '\n'][..])
                .to_string();
            thread_log.lock().unwrap().push(command.clone());
            if let Some(response) = reply(&command) {
                handle.feed(response.as_bytes());
            }
        }
    });
    log
}

/// Echo the command back followed by `OK`, the way a happy modem would.
pub fn echo_ok(command: &str) -> Option<String> {
    Some(format!("{command}\r\r\nOK\r\n"))
}

/// Spin until `condition` holds or the deadline passes.
pub fn wait_for(mut condition: impl FnMut() -> bool, timeout: Duration) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        thread::sleep(Duration::from_millis(5));
    }
    condition()
}
