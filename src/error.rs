// SPDX-License-Identifier: Apache-2.0

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
#[non_exhaustive]
pub enum ErrorKind {
    /// Datagram shorter than the fixed header or longer than 548 bytes
    InvalidLength,
    /// Fixed header invariant violated
    InvalidMessage,
    MissingMessageType,
    TruncatedOption,
    DuplicateOption,
    /// Registered decoder rejected the payload of the contained option tag
    OptionDecodeError(u8),
    UnterminatedOptions,
    Timeout,
    Nak,
    ArpConflict,
    InvalidArgument,
    IoError,
    Bug,
}

#[derive(Debug, PartialEq, Eq, Clone)]
pub struct DhcpError {
    kind: ErrorKind,
    msg: String,
}

impl DhcpError {
    pub fn new(kind: ErrorKind, msg: String) -> Self {
        Self { kind, msg }
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub fn msg(&self) -> &str {
        self.msg.as_str()
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{self:?}")
    }
}

impl std::fmt::Display for DhcpError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.kind, self.msg)
    }
}

impl std::error::Error for DhcpError {}

impl From<std::io::Error> for DhcpError {
    fn from(e: std::io::Error) -> Self {
        Self::new(ErrorKind::IoError, format!("IO error: {e}"))
    }
}

pub(crate) trait ErrorContext<T> {
    fn context<C: std::fmt::Display>(self, ctx: C) -> Result<T, DhcpError>;
}

impl<T> ErrorContext<T> for Result<T, DhcpError> {
    fn context<C: std::fmt::Display>(self, ctx: C) -> Result<T, DhcpError> {
        self.map_err(|e| DhcpError::new(e.kind, format!("{ctx}: {}", e.msg)))
    }
}
