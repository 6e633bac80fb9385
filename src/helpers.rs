use std::sync::{Mutex, MutexGuard, PoisonError};

/// Wrapper for a byte slice that formats printable ASCII as-is and escapes
/// the rest, so raw modem traffic can go through `log` without tripping on
/// invalid UTF-8.
pub(crate) struct LossyStr<'a>(pub &'a [u8]);

impl std::fmt::Debug for LossyStr<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        for &b in self.0 {
            match b {
                b'\r' => write!(f, "\\r")?,
                b'\n' => write!(f, "\\n")?,
                0x20..=0x7f => write!(f, "{}", b as char)?,
                _ => write!(f, "\\x{b:02x}")?,
            }
        }
        Ok(())
    }
}

/// Lock a mutex, disregarding poisoning.
///
/// A panicking completion callback must not wedge the whole engine; the
/// registries it might have poisoned only hold plain data.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn lossy_str_escapes() {
        let s = format!("{:?}", LossyStr(b"AT+CSQ\r\n\x1a"));
        assert_eq!(s, "AT+CSQ\\r\\n\\x1a");
    }
}
