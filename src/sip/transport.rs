//! The SIP transport protocols.

use std::fmt;
use std::str::FromStr;

//------------ Scheme --------------------------------------------------------

/// The scheme of a SIP URI.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum Scheme {
    /// `sip:`
    Sip,

    /// `sips:`, requiring a secure transport.
    Sips,
}

impl Scheme {
    /// Returns the default port for URIs of this scheme.
    pub fn default_port(self) -> u16 {
        match self {
            Scheme::Sip => 5060,
            Scheme::Sips => 5061,
        }
    }

    /// Returns the scheme as it appears in a URI, without the colon.
    pub fn as_str(self) -> &'static str {
        match self {
            Scheme::Sip => "sip",
            Scheme::Sips => "sips",
        }
    }
}

impl fmt::Display for Scheme {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

//------------ SipTransport --------------------------------------------------

/// A transport protocol for SIP.
///
/// Each transport comes with the service tag used in NAPTR records, the
/// prefix of its SRV domain, and a default port.
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub enum SipTransport {
    Udp,
    Tcp,
    Tls,
    Sctp,
    TlsSctp,
}

impl SipTransport {
    /// All transports in order of preference.
    pub const ALL: [SipTransport; 5] = [
        SipTransport::Udp,
        SipTransport::Tcp,
        SipTransport::Tls,
        SipTransport::Sctp,
        SipTransport::TlsSctp,
    ];

    /// Returns the name of the transport as used in URI parameters.
    pub fn name(self) -> &'static str {
        match self {
            SipTransport::Udp => "udp",
            SipTransport::Tcp => "tcp",
            SipTransport::Tls => "tls",
            SipTransport::Sctp => "sctp",
            SipTransport::TlsSctp => "tls-sctp",
        }
    }

    /// Returns the NAPTR service tag for the transport.
    pub fn service(self) -> &'static str {
        match self {
            SipTransport::Udp => "SIP+D2U",
            SipTransport::Tcp => "SIP+D2T",
            SipTransport::Tls => "SIPS+D2T",
            SipTransport::Sctp => "SIP+D2S",
            SipTransport::TlsSctp => "SIPS+D2S",
        }
    }

    /// Returns the prefix of the SRV domain for the transport.
    pub fn srv_prefix(self) -> &'static str {
        match self {
            SipTransport::Udp => "_sip._udp.",
            SipTransport::Tcp => "_sip._tcp.",
            SipTransport::Tls => "_sips._tcp.",
            SipTransport::Sctp => "_sip._sctp.",
            SipTransport::TlsSctp => "_sips._sctp.",
        }
    }

    /// Returns the port used when nothing else is known.
    pub fn default_port(self) -> u16 {
        if self.is_secure() {
            5061
        } else {
            5060
        }
    }

    /// Returns whether the transport is secured by TLS.
    pub fn is_secure(self) -> bool {
        matches!(self, SipTransport::Tls | SipTransport::TlsSctp)
    }

    /// Returns the URI scheme the transport is the native choice for.
    ///
    /// Without an explicit transport, only native transports are tried
    /// when falling back to address records. SCTP transports are never
    /// native.
    pub fn native_scheme(self) -> Option<Scheme> {
        match self {
            SipTransport::Udp | SipTransport::Tcp => Some(Scheme::Sip),
            SipTransport::Tls => Some(Scheme::Sips),
            SipTransport::Sctp | SipTransport::TlsSctp => None,
        }
    }

    /// Returns the secure variant of the transport.
    ///
    /// This is what `transport=tcp` means in a `sips:` URI. UDP has no
    /// secure variant.
    pub fn secure(self) -> Option<SipTransport> {
        match self {
            SipTransport::Udp => None,
            SipTransport::Tcp | SipTransport::Tls => Some(SipTransport::Tls),
            SipTransport::Sctp | SipTransport::TlsSctp => {
                Some(SipTransport::TlsSctp)
            }
        }
    }
}

impl FromStr for SipTransport {
    type Err = UnknownTransport;

    /// Parses a transport name, ignoring ASCII case.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        SipTransport::ALL
            .iter()
            .copied()
            .find(|tp| tp.name().eq_ignore_ascii_case(s))
            .ok_or(UnknownTransport)
    }
}

impl fmt::Display for SipTransport {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.name())
    }
}

//------------ UnknownTransport ----------------------------------------------

/// A transport name was not recognized.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct UnknownTransport;

impl fmt::Display for UnknownTransport {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("unknown transport")
    }
}

impl std::error::Error for UnknownTransport {}

//============ Testing =======================================================

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn transport_table() {
        assert_eq!("UDP".parse(), Ok(SipTransport::Udp));
        assert_eq!("tls-sctp".parse(), Ok(SipTransport::TlsSctp));
        assert_eq!("ws".parse::<SipTransport>(), Err(UnknownTransport));

        assert_eq!(SipTransport::Tls.srv_prefix(), "_sips._tcp.");
        assert_eq!(SipTransport::Tls.default_port(), 5061);
        assert_eq!(SipTransport::Tcp.secure(), Some(SipTransport::Tls));
        assert_eq!(SipTransport::Udp.secure(), None);
        assert_eq!(SipTransport::Sctp.native_scheme(), None);
    }
}
