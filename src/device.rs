//! Transport abstraction over the modem device.

use std::io;

/// Byte transport plus power control for a modem.
///
/// All methods take `&self`: the engine serializes `send`/`recv` and the
/// open/close/power operations behind its own I/O lock, but [`recv_poll`]
/// runs outside it so transmission is never blocked on a quiet line.
/// Implementations must tolerate `send` racing `recv_poll`.
///
/// Short reads and writes are fine; the engine loops on `send` until the
/// buffer is drained and treats a zero-byte `recv` as end of stream.
///
/// [`recv_poll`]: Device::recv_poll
pub trait Device: Send + Sync + 'static {
    fn open(&self) -> io::Result<()>;

    fn close(&self) -> io::Result<()>;

    /// Write at most `data.len()` bytes, returning how many were accepted.
    fn send(&self, data: &[u8]) -> io::Result<usize>;

    /// Read into `buf`, returning the number of bytes read. Zero means the
    /// peer closed the stream.
    fn recv(&self, buf: &mut [u8]) -> io::Result<usize>;

    /// Block until the device is readable.
    fn recv_poll(&self) -> io::Result<()>;

    fn power_on(&self) -> io::Result<()>;

    fn power_off(&self) -> io::Result<()>;

    /// Hook for firmware upload or similar one-time bring-up between power-on
    /// and the first open.
    fn boot(&self) -> io::Result<()> {
        Ok(())
    }

    /// Device-specific AT commands issued after the built-in setup sequence,
    /// both at startup and after every transport recovery.
    fn setup_commands(&self) -> Vec<String> {
        Vec::new()
    }
}
