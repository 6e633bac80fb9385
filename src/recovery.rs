//! Transport failure handling: freeze in-flight traffic, reopen (and if
//! necessary power-cycle) the device, re-run the setup sequence, thaw.

use std::io;
use std::thread;

use log::{error, info, warn};

use crate::device::Device;
use crate::digest::Digester;
use crate::engine::{send_next, Engine};
use crate::error::Error;
use crate::helpers::lock;
use crate::{Token, AT_RECV_BYTES_MAX};

pub(crate) struct RecoveryState {
    /// Ordinary traffic is deferred while set; urgent requests go through.
    pub(crate) frozen: bool,
    /// Consecutive transport failures, reset by a successful read.
    pub(crate) failures: u32,
    /// Recovery has given up; the engine rejects further submissions.
    pub(crate) fatal: bool,
}

impl RecoveryState {
    pub(crate) fn new() -> Self {
        RecoveryState {
            frozen: false,
            failures: 0,
            fatal: false,
        }
    }
}

/// Receive thread body. Only returns once recovery gives up, after tearing
/// the engine down.
pub(crate) fn recv_thread<D: Device, T: Token>(engine: Engine<D, T>) {
    if let Err(err) = recv_loop(&engine) {
        error!("Receive thread giving up: {}", err);
        teardown(&engine);
    }
}

fn recv_loop<D: Device, T: Token>(engine: &Engine<D, T>) -> Result<(), Error> {
    let inner = &engine.inner;
    let mut digester: Digester = Digester::new();
    let mut buf = [0u8; AT_RECV_BYTES_MAX];
    // Cleared when a reopen fails, so the next lap skips straight to another
    // recovery attempt (which then counts as a failure of its own).
    let mut open = true;

    loop {
        while open {
            if let Err(err) = inner.device.recv_poll() {
                warn!("Poll failed: {}", err);
                break;
            }
            let read = {
                let _io = lock(&inner.io_lock);
                inner.device.recv(&mut buf)
            };
            match read {
                Ok(0) => {
                    warn!("Device closed the stream");
                    break;
                }
                Ok(n) => {
                    lock(&inner.recovery).failures = 0;
                    if let Err(err) = digester.digest(&buf[..n], &inner.requests, &inner.responses)
                    {
                        warn!("{}", err);
                        break;
                    }
                }
                Err(err) => {
                    warn!("Read failed: {}", err);
                    break;
                }
            }
        }

        // Lock order: requests before recovery.
        let failures = {
            let mut requests = lock(&inner.requests);
            let mut recovery = lock(&inner.recovery);
            requests.freeze_in_flight();
            recovery.frozen = true;
            recovery.failures += 1;
            recovery.failures
        };
        // Half-framed bytes from the dead descriptor are garbage now.
        digester.reset();

        warn!(
            "Transport failure {} of {}",
            failures, inner.config.give_up_after
        );
        if failures >= inner.config.give_up_after {
            return Err(Error::Fatal);
        }

        let was_open = open;
        open = {
            let _io = lock(&inner.io_lock);
            let result = (|| -> io::Result<()> {
                if was_open {
                    inner.device.close()?;
                }
                if failures >= inner.config.power_cycle_after {
                    inner.device.power_off()?;
                    inner.device.power_on()?;
                    inner.device.boot()?;
                }
                inner.device.open()
            })();
            match result {
                Ok(()) => true,
                Err(err) => {
                    warn!("Reopen failed: {}", err);
                    false
                }
            }
        };

        if open {
            // Setup and thaw run off-thread so reading can resume; the setup
            // commands need their responses framed.
            let engine = engine.clone();
            let spawned = thread::Builder::new()
                .name("at-unfreeze".into())
                .spawn(move || unfreeze(engine));
            if let Err(err) = spawned {
                error!("Failed to spawn unfreeze thread: {}", err);
                return Err(Error::Thread(err));
            }
        }
    }
}

fn unfreeze<D: Device, T: Token>(engine: Engine<D, T>) {
    // Echo and error reporting must be reconfigured before frozen requests
    // are retransmitted; their urgent flag lets them through the freeze.
    if let Err(err) = engine.run_setup() {
        warn!("Setup after recovery failed: {}", err);
    }

    {
        let mut requests = lock(&engine.inner.requests);
        let mut recovery = lock(&engine.inner.recovery);
        requests.thaw();
        recovery.frozen = false;
    }
    info!("Transport recovered");
    send_next(&engine.inner);
}

fn teardown<D: Device, T: Token>(engine: &Engine<D, T>) {
    let inner = &engine.inner;
    {
        let mut recovery = lock(&inner.recovery);
        recovery.fatal = true;
        recovery.frozen = true;
    }
    {
        let _io = lock(&inner.io_lock);
        let _ = inner.device.close();
        let _ = inner.device.power_off();
    }
    // Dropping the requests resolves nothing, but it does release any
    // blocked locked submitter.
    lock(&inner.requests).clear();
    inner.responses.shutdown();
}
