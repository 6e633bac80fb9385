/// Mobile-equipment error result codes reported through `+CME ERROR: <n>`
/// lines, as defined in 3GPP TS 27.007 section 9.2.
///
/// Only the codes the engine has been seen handling in the field are named;
/// anything else decodes to [`CmeError::Unknown`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u16)]
pub enum CmeError {
    PhoneFailure = 0,
    NoConnection = 1,
    LinkReserved = 2,
    NotAllowed = 3,
    NotSupported = 4,
    PhSimPin = 5,
    PhFsimPin = 6,
    PhFsimPuk = 7,
    SimNotInserted = 10,
    SimPin = 11,
    SimPuk = 12,
    SimFailure = 13,
    SimBusy = 14,
    SimWrong = 15,
    IncorrectPassword = 16,
    SimPin2 = 17,
    SimPuk2 = 18,
    MemoryFull = 20,
    InvalidIndex = 21,
    NotFound = 22,
    MemoryFailure = 23,
    TextTooLong = 24,
    InvalidChars = 25,
    DialStringTooLong = 26,
    DialStringInvalid = 27,
    NoNetwork = 30,
    NetworkTimeout = 31,
    NetworkNotAllowed = 32,
    NetworkPin = 40,
    NetworkPuk = 41,
    NetworkSubsetPin = 42,
    NetworkSubsetPuk = 43,
    ProviderPin = 44,
    ProviderPuk = 45,
    CorpPin = 46,
    CorpPuk = 47,
    PhSimPuk = 48,
    Unknown = 100,
    IllegalMs = 103,
    IllegalMe = 106,
    GprsNotAllowed = 107,
    PlmnNotAllowed = 111,
    LocationNotAllowed = 112,
    RoamingNotAllowed = 113,
    TemporarilyNotAllowed = 126,
    ServiceOptionNotSupported = 132,
    ServiceOptionNotSubscribed = 133,
    ServiceOptionOutOfOrder = 134,
    UnspecifiedGprsError = 148,
    PdpAuthenticationFailure = 149,
    InvalidMobileClass = 150,
    OperationTempNotAllowed = 256,
    CallBarred = 257,
    PhoneBusy = 258,
    UserAbort = 259,
    InvalidDialString = 260,
    SsNotExecuted = 261,
    SimBlocked = 262,
    InvalidBlock = 263,
    SimPoweredDown = 772,
}

impl From<u16> for CmeError {
    fn from(v: u16) -> Self {
        match v {
            0 => Self::PhoneFailure,
            1 => Self::NoConnection,
            2 => Self::LinkReserved,
            3 => Self::NotAllowed,
            4 => Self::NotSupported,
            5 => Self::PhSimPin,
            6 => Self::PhFsimPin,
            7 => Self::PhFsimPuk,
            10 => Self::SimNotInserted,
            11 => Self::SimPin,
            12 => Self::SimPuk,
            13 => Self::SimFailure,
            14 => Self::SimBusy,
            15 => Self::SimWrong,
            16 => Self::IncorrectPassword,
            17 => Self::SimPin2,
            18 => Self::SimPuk2,
            20 => Self::MemoryFull,
            21 => Self::InvalidIndex,
            22 => Self::NotFound,
            23 => Self::MemoryFailure,
            24 => Self::TextTooLong,
            25 => Self::InvalidChars,
            26 => Self::DialStringTooLong,
            27 => Self::DialStringInvalid,
            30 => Self::NoNetwork,
            31 => Self::NetworkTimeout,
            32 => Self::NetworkNotAllowed,
            40 => Self::NetworkPin,
            41 => Self::NetworkPuk,
            42 => Self::NetworkSubsetPin,
            43 => Self::NetworkSubsetPuk,
            44 => Self::ProviderPin,
            45 => Self::ProviderPuk,
            46 => Self::CorpPin,
            47 => Self::CorpPuk,
            48 => Self::PhSimPuk,
            103 => Self::IllegalMs,
            106 => Self::IllegalMe,
            107 => Self::GprsNotAllowed,
            111 => Self::PlmnNotAllowed,
            112 => Self::LocationNotAllowed,
            113 => Self::RoamingNotAllowed,
            126 => Self::TemporarilyNotAllowed,
            132 => Self::ServiceOptionNotSupported,
            133 => Self::ServiceOptionNotSubscribed,
            134 => Self::ServiceOptionOutOfOrder,
            148 => Self::UnspecifiedGprsError,
            149 => Self::PdpAuthenticationFailure,
            150 => Self::InvalidMobileClass,
            256 => Self::OperationTempNotAllowed,
            257 => Self::CallBarred,
            258 => Self::PhoneBusy,
            259 => Self::UserAbort,
            260 => Self::InvalidDialString,
            261 => Self::SsNotExecuted,
            262 => Self::SimBlocked,
            263 => Self::InvalidBlock,
            772 => Self::SimPoweredDown,
            _ => Self::Unknown,
        }
    }
}
