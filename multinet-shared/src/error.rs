#![allow(dead_code)]

use std::io;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug, PartialEq)]
#[non_exhaustive]
pub enum Error {
    #[error("buffer: short")]
    ErrBufferShort,
    #[error("packet too big")]
    ErrPacketTooBig,
    #[error("no interface is available")]
    ErrNoInterface,

    //DNS message errors
    #[error("insufficient data for base length type")]
    ErrBaseLen,
    #[error("insufficient data for calculated length type")]
    ErrCalcLen,
    #[error("segment length too long")]
    ErrSegTooLong,
    #[error("zero length segment")]
    ErrZeroSegLen,
    #[error("name too long")]
    ErrNameTooLong,
    #[error("too many pointers (>10)")]
    ErrTooManyPtr,
    #[error("invalid pointer")]
    ErrInvalidPtr,
    #[error("insufficient data for resource body length")]
    ErrResourceLen,
    #[error("resource length too long")]
    ErrResTooLong,
    #[error("character string exceeds maximum length (255)")]
    ErrStringTooLong,
    #[error("nsec type bitmap is malformed")]
    ErrInvalidTypeBitmap,
    #[error("too many questions to pack (>65535)")]
    ErrTooManyQuestions,
    #[error("too many answers to pack (>65535)")]
    ErrTooManyAnswers,
    #[error("too many authorities to pack (>65535)")]
    ErrTooManyAuthorities,
    #[error("too many additionals to pack (>65535)")]
    ErrTooManyAdditionals,

    //mDNS socket client errors
    #[error("listener is already registered")]
    ErrListenerAlreadyRegistered,
    #[error("socket has not joined a multicast group for the destination address family")]
    ErrNoSocketForFamily,
    #[error("interface {0} has no usable address")]
    ErrInterfaceHasNoAddress(String),
    #[error("connection closed")]
    ErrConnectionClosed,

    #[error("{0}")]
    Io(#[source] IoError),
    #[error("Other mDNS Err: {0}")]
    OtherMdnsErr(String),
    #[error("{0}")]
    Other(String),
}

#[derive(Debug, Error)]
#[error("io error: {0}")]
pub struct IoError(#[from] pub io::Error);

// Workaround for wanting PartialEq for io::Error.
impl PartialEq for IoError {
    fn eq(&self, other: &Self) -> bool {
        self.0.kind() == other.0.kind()
    }
}

impl From<io::Error> for Error {
    fn from(e: io::Error) -> Self {
        Error::Io(IoError(e))
    }
}

impl Error {
    /// Returns true when the error is a non-blocking socket reporting that
    /// no more datagrams are queued.
    pub fn is_would_block(&self) -> bool {
        matches!(self, Error::Io(IoError(e)) if e.kind() == io::ErrorKind::WouldBlock)
    }
}

/// flatten_errs flattens multiple errors into one
pub fn flatten_errs(errs: Vec<impl Into<Error>>) -> Result<()> {
    if errs.is_empty() {
        Ok(())
    } else {
        let errs_strs: Vec<String> = errs.into_iter().map(|e| e.into().to_string()).collect();
        Err(Error::Other(errs_strs.join("\n")))
    }
}
