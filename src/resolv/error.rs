//! Errors and results.

use super::conf::ConfError;
use crate::base::wire::ComposeError;
use crate::sip::SipError;
use std::{error, fmt, io, result};

//------------ Error --------------------------------------------------------

/// An error preventing a query from being started.
///
/// Once started, a query never fails with an error of this type. Its
/// failure is reported through an error record instead.
#[derive(Debug)]
pub enum Error {
    /// The domain name is longer than allowed.
    NameTooLong,

    /// The domain name could not be encoded.
    InvalidName(ComposeError),

    /// There are no name servers to ask.
    NetworkDown,

    /// The query could not be sent to any server.
    Send(io::Error),

    /// The configuration could not be loaded.
    Conf(ConfError),

    /// Some other IO error happened.
    Io(io::Error),

    /// A SIP URI could not be resolved.
    Sip(SipError),
}

impl From<ComposeError> for Error {
    fn from(error: ComposeError) -> Error {
        Error::InvalidName(error)
    }
}

impl From<ConfError> for Error {
    fn from(error: ConfError) -> Error {
        Error::Conf(error)
    }
}

impl From<SipError> for Error {
    fn from(error: SipError) -> Error {
        Error::Sip(error)
    }
}

impl From<io::Error> for Error {
    fn from(error: io::Error) -> Error {
        Error::Io(error)
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            Error::NameTooLong => f.write_str("domain name too long"),
            Error::InvalidName(ref err) => {
                write!(f, "invalid domain name: {}", err)
            }
            Error::NetworkDown => f.write_str("no name servers available"),
            Error::Send(ref err) => write!(f, "cannot send query: {}", err),
            Error::Conf(ref err) => write!(f, "configuration: {}", err),
            Error::Io(ref err) => err.fmt(f),
            Error::Sip(ref err) => err.fmt(f),
        }
    }
}

impl error::Error for Error {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        match *self {
            Error::InvalidName(ref err) => Some(err),
            Error::Send(ref err) | Error::Io(ref err) => Some(err),
            Error::Conf(ref err) => Some(err),
            Error::Sip(ref err) => Some(err),
            Error::NameTooLong | Error::NetworkDown => None,
        }
    }
}

//------------ Result -------------------------------------------------------

pub type Result<T> = result::Result<T, Error>;
