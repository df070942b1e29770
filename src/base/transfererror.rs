use thiserror::Error;

/// Terminal failure of a single transfer, as reported by the engine.
///
/// Codes match the native engine's numbering so callers comparing against
/// engine documentation (or logs from the engine itself) see the same values.
/// Unmapped codes survive round-trips through [`TransferError::Unknown`].
#[derive(Debug, Error, PartialEq, Eq, Clone, Copy)]
pub enum TransferError {
    #[error("Unsupported protocol")]
    UnsupportedProtocol,
    #[error("Engine initialization failed")]
    FailedInit,
    #[error("Malformed URL")]
    UrlMalformat,
    #[error("Could not resolve proxy")]
    CouldntResolveProxy,
    #[error("Could not resolve host")]
    CouldntResolveHost,
    #[error("Could not connect")]
    CouldntConnect,
    #[error("Weird server reply")]
    WeirdServerReply,
    #[error("HTTP returned error")]
    HttpReturnedError,
    #[error("Write callback error")]
    WriteError,
    #[error("Operation timed out")]
    OperationTimedOut,
    #[error("SSL connect error")]
    SslConnectError,
    #[error("Aborted by callback")]
    AbortedByCallback,
    #[error("Too many redirects")]
    TooManyRedirects,
    #[error("Server returned nothing")]
    GotNothing,
    #[error("Failed sending data to the peer")]
    SendError,
    #[error("Failure receiving data from the peer")]
    RecvError,
    #[error("Problem with the local SSL certificate")]
    SslCertProblem,
    #[error("Peer certificate verification failed")]
    PeerFailedVerification,
    #[error("HTTP/2 framing layer problem")]
    Http2,
    #[error("HTTP/2 stream error")]
    Http2Stream,
    #[error("Unknown engine error {0}")]
    Unknown(i32),
}

impl TransferError {
    /// The engine-native numeric code for this error.
    pub fn as_code(&self) -> i32 {
        match self {
            TransferError::UnsupportedProtocol => 1,
            TransferError::FailedInit => 2,
            TransferError::UrlMalformat => 3,
            TransferError::CouldntResolveProxy => 5,
            TransferError::CouldntResolveHost => 6,
            TransferError::CouldntConnect => 7,
            TransferError::WeirdServerReply => 8,
            TransferError::Http2 => 16,
            TransferError::HttpReturnedError => 22,
            TransferError::WriteError => 23,
            TransferError::OperationTimedOut => 28,
            TransferError::SslConnectError => 35,
            TransferError::AbortedByCallback => 42,
            TransferError::TooManyRedirects => 47,
            TransferError::GotNothing => 52,
            TransferError::SendError => 55,
            TransferError::RecvError => 56,
            TransferError::SslCertProblem => 58,
            TransferError::PeerFailedVerification => 60,
            TransferError::Http2Stream => 92,
            TransferError::Unknown(code) => *code,
        }
    }
}

impl From<i32> for TransferError {
    fn from(code: i32) -> Self {
        match code {
            1 => TransferError::UnsupportedProtocol,
            2 => TransferError::FailedInit,
            3 => TransferError::UrlMalformat,
            5 => TransferError::CouldntResolveProxy,
            6 => TransferError::CouldntResolveHost,
            7 => TransferError::CouldntConnect,
            8 => TransferError::WeirdServerReply,
            16 => TransferError::Http2,
            22 => TransferError::HttpReturnedError,
            23 => TransferError::WriteError,
            28 => TransferError::OperationTimedOut,
            35 => TransferError::SslConnectError,
            42 => TransferError::AbortedByCallback,
            47 => TransferError::TooManyRedirects,
            52 => TransferError::GotNothing,
            55 => TransferError::SendError,
            56 => TransferError::RecvError,
            58 => TransferError::SslCertProblem,
            60 => TransferError::PeerFailedVerification,
            92 => TransferError::Http2Stream,
            _ => TransferError::Unknown(code),
        }
    }
}
