mod cme_error;

pub use cme_error::CmeError;

use nom::{
    bytes::complete::tag,
    character::complete::{digit1, space0},
    combinator::{map_res, opt},
    sequence::{preceded, tuple},
    IResult,
};

/// Errors surfaced by the engine itself, as opposed to AT-level failures
/// which are delivered to the request callback as a [`ResponseCode`].
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("transport write failed")]
    Write(#[source] std::io::Error),
    #[error("transport open failed")]
    Open(#[source] std::io::Error),
    #[error("device power control failed")]
    Power(#[source] std::io::Error),
    #[error("failed to spawn engine thread")]
    Thread(#[source] std::io::Error),
    #[error("line accumulation buffer overflow")]
    Overflow,
    #[error("request is not awaiting a data continuation")]
    NotExpectingData,
    #[error("locked submission from the dispatch thread would deadlock")]
    WouldDeadlock,
    #[error("engine has shut down after unrecoverable transport failures")]
    Fatal,
}

/// Decoded status of one framed response line.
///
/// The numeric sub-code of a `+CME ERROR` line travels inside the variant;
/// use [`ResponseCode::cme`] to get at it rather than comparing whole codes
/// when only the base status matters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseCode {
    /// No recognized status line yet. Lines decoding to this accumulate as
    /// response body until a terminating status arrives.
    Undef,
    Ok,
    /// The `> ` prompt: the command expects a raw data continuation
    /// (multi-stage commands like SMS PDU upload).
    OkExpectData,
    Connect,
    Error,
    Cme(CmeError),
    NoCarrier,
    /// Engine-level fault reported in place of a modem status.
    Internal,
}

fn cme_subcode(input: &str) -> IResult<&str, u16> {
    preceded(
        tuple((tag("+CME ERROR"), opt(tag(":")), space0)),
        map_res(digit1, str::parse),
    )(input)
}

impl ResponseCode {
    /// Decode a single line against the fixed status vocabulary.
    ///
    /// Matching is by literal prefix; later entries win so that e.g.
    /// `NO CARRIER` is never shadowed by a sloppier match.
    pub fn decode(line: &str) -> Self {
        let mut code = ResponseCode::Undef;

        if line.starts_with("OK") {
            code = ResponseCode::Ok;
        }
        if line.starts_with("> ") {
            code = ResponseCode::OkExpectData;
        }
        if line.starts_with("ERROR") {
            code = ResponseCode::Error;
        }
        if line.starts_with("CONNECT") {
            code = ResponseCode::Connect;
        }
        if line.starts_with("+CME ERROR") {
            // A missing or garbled sub-code still decodes as a CME error.
            let sub = cme_subcode(line).map(|(_, n)| n).unwrap_or(0);
            code = ResponseCode::Cme(CmeError::from(sub));
        }
        if line.starts_with("NO CARRIER") {
            code = ResponseCode::NoCarrier;
        }

        code
    }

    /// The CME sub-code, if this is a `+CME ERROR` status.
    pub fn cme(&self) -> Option<CmeError> {
        match self {
            ResponseCode::Cme(e) => Some(*e),
            _ => None,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(
            self,
            ResponseCode::Ok | ResponseCode::OkExpectData | ResponseCode::Connect
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ResponseCode::Undef => "UNDEF",
            ResponseCode::Ok => "OK",
            ResponseCode::OkExpectData => "OK EXPECT DATA",
            ResponseCode::Connect => "CONNECT",
            ResponseCode::Error => "ERROR",
            ResponseCode::Cme(_) => "CME ERROR",
            ResponseCode::NoCarrier => "NO CARRIER",
            ResponseCode::Internal => "INTERNAL ERROR",
        }
    }
}
