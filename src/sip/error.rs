//! Errors of the SIP resolution procedure.

use std::{error, fmt};

//------------ SipError ------------------------------------------------------

/// The reason a SIP URI could not be resolved.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum SipError {
    /// The URI is not a valid SIP or SIPS URI.
    BadUri,

    /// The URI or the NAPTR records name no transport we can use.
    NoTransport,

    /// The target domain does not exist.
    NoName,

    /// Something was found but nothing to contact.
    NoData,

    /// A temporary failure, trying again later may help.
    Again,

    /// Resolving failed for good.
    Fail,
}

impl fmt::Display for SipError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(match *self {
            SipError::BadUri => "invalid SIP URI",
            SipError::NoTransport => "no supported transport",
            SipError::NoName => "domain not found",
            SipError::NoData => "no usable records",
            SipError::Again => "temporary resolver failure",
            SipError::Fail => "resolver failure",
        })
    }
}

impl error::Error for SipError {}
