//! Sending messages to name servers.
//!
//! The resolver does not do any networking itself. Whenever it needs to
//! send a query it hands the message to a [`Transport`]. Responses and
//! errors find their way back into the resolver through
//! [`Resolver::receive`] and [`Resolver::report_error`].
//!
//! [`Resolver::receive`]: super::Resolver::receive
//! [`Resolver::report_error`]: super::Resolver::report_error

use std::net::SocketAddr;
use std::{error, fmt, io};

//------------ Transport -----------------------------------------------------

/// Something that can send datagrams to name servers.
///
/// Sending must not block. A transport that cannot send right away should
/// drop the message: the resolver will retransmit it.
pub trait Transport: fmt::Debug + Send + Sync {
    /// Sends `data` to the name server at `server`.
    fn send(&self, server: SocketAddr, data: &[u8]) -> Result<(), SendError>;
}

//------------ SendError -----------------------------------------------------

/// Sending a message failed.
#[derive(Debug)]
pub enum SendError {
    /// There is no usable socket for the server.
    ///
    /// The server will not be used again.
    Socket(io::Error),

    /// Sending itself failed.
    ///
    /// The server is avoided for a while.
    Send(io::Error),
}

impl SendError {
    /// Converts the error into the underlying IO error.
    pub fn into_io(self) -> io::Error {
        match self {
            SendError::Socket(err) | SendError::Send(err) => err,
        }
    }
}

impl fmt::Display for SendError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            SendError::Socket(ref err) => write!(f, "socket: {}", err),
            SendError::Send(ref err) => write!(f, "send: {}", err),
        }
    }
}

impl error::Error for SendError {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        match *self {
            SendError::Socket(ref err) | SendError::Send(ref err) => Some(err),
        }
    }
}
