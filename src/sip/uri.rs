//! Parsing SIP URIs.
//!
//! Only the parts relevant for locating a server are kept: the scheme,
//! the host, the port, and the `maddr` and `transport` parameters. The
//! user part and any headers are skipped.

use super::error::SipError;
use super::transport::{Scheme, SipTransport};
use std::net::{IpAddr, Ipv6Addr};
use std::fmt;
use std::str::FromStr;

//------------ SipUri --------------------------------------------------------

/// The server location parts of a SIP URI.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct SipUri {
    scheme: Scheme,
    host: String,
    port: Option<u16>,
    maddr: Option<String>,
    transport: Option<SipTransport>,
}

impl SipUri {
    /// Returns the scheme.
    pub fn scheme(&self) -> Scheme {
        self.scheme
    }

    /// Returns the host part, including brackets for an IPv6 reference.
    pub fn host(&self) -> &str {
        &self.host
    }

    /// Returns the explicit port.
    pub fn port(&self) -> Option<u16> {
        self.port
    }

    /// Returns the `maddr` parameter.
    pub fn maddr(&self) -> Option<&str> {
        self.maddr.as_deref()
    }

    /// Returns the transport named by the `transport` parameter.
    pub fn transport(&self) -> Option<SipTransport> {
        self.transport
    }

    /// Returns the host to resolve.
    ///
    /// This is the `maddr` parameter if present, the host otherwise.
    pub fn target(&self) -> &str {
        self.maddr.as_deref().unwrap_or(&self.host)
    }
}

impl FromStr for SipUri {
    type Err = SipError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let (scheme, rest) = match s.find(':') {
            Some(pos) => (&s[..pos], &s[pos + 1..]),
            None => return Err(SipError::BadUri),
        };
        let scheme = if scheme.eq_ignore_ascii_case("sip") {
            Scheme::Sip
        } else if scheme.eq_ignore_ascii_case("sips") {
            Scheme::Sips
        } else {
            return Err(SipError::BadUri);
        };

        let rest = match rest.find('?') {
            Some(pos) => &rest[..pos],
            None => rest,
        };
        let rest = match rest.rfind('@') {
            Some(pos) => &rest[pos + 1..],
            None => rest,
        };
        let mut parts = rest.split(';');
        let (host, port) = parse_hostport(parts.next().unwrap_or(""))?;

        let mut maddr = None;
        let mut transport = None;
        for param in parts {
            let (name, value) = match param.find('=') {
                Some(pos) => (&param[..pos], Some(&param[pos + 1..])),
                None => (param, None),
            };
            if name.eq_ignore_ascii_case("maddr") {
                match value {
                    Some(value) if !value.is_empty() => {
                        maddr = Some(value.to_string())
                    }
                    _ => return Err(SipError::BadUri),
                }
            } else if name.eq_ignore_ascii_case("transport") {
                transport = Some(
                    value
                        .unwrap_or("")
                        .parse()
                        .map_err(|_| SipError::NoTransport)?,
                );
            }
        }

        Ok(SipUri {
            scheme,
            host: host.to_string(),
            port,
            maddr,
            transport,
        })
    }
}

impl fmt::Display for SipUri {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}:{}", self.scheme, self.host)?;
        if let Some(port) = self.port {
            write!(f, ":{}", port)?;
        }
        if let Some(maddr) = self.maddr.as_ref() {
            write!(f, ";maddr={}", maddr)?;
        }
        if let Some(transport) = self.transport {
            write!(f, ";transport={}", transport)?;
        }
        Ok(())
    }
}

/// Splits host and port.
///
/// An empty port is the same as no port. Port zero and ports that do not
/// fit into 16 bits are rejected.
fn parse_hostport(hostport: &str) -> Result<(&str, Option<u16>), SipError> {
    let (host, port) = if hostport.starts_with('[') {
        match hostport.find(']') {
            Some(pos) => {
                let port = &hostport[pos + 1..];
                let port = match port.strip_prefix(':') {
                    Some(port) => Some(port),
                    None if port.is_empty() => None,
                    None => return Err(SipError::BadUri),
                };
                (&hostport[..=pos], port)
            }
            None => return Err(SipError::BadUri),
        }
    } else {
        match hostport.find(':') {
            Some(pos) => (&hostport[..pos], Some(&hostport[pos + 1..])),
            None => (hostport, None),
        }
    };
    if host.is_empty() {
        return Err(SipError::BadUri);
    }
    let port = match port {
        None | Some("") => None,
        Some(port) => match port.parse::<u32>() {
            Ok(port) if (1..=0xFFFF).contains(&port) => Some(port as u16),
            _ => return Err(SipError::BadUri),
        },
    };
    Ok((host, port))
}

//------------ Helper Functions ----------------------------------------------

/// Returns whether a host looks like a numeric address.
///
/// This includes bracketed IPv6 references.
pub fn is_numeric(host: &str) -> bool {
    host.starts_with('[') || host.parse::<IpAddr>().is_ok()
}

/// Parses a numeric host.
pub fn parse_numeric(host: &str) -> Option<IpAddr> {
    match host.strip_prefix('[').and_then(|h| h.strip_suffix(']')) {
        Some(inner) => inner.parse::<Ipv6Addr>().ok().map(IpAddr::V6),
        None => host.parse().ok(),
    }
}

//============ Testing =======================================================

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn parse_uris() {
        let uri: SipUri = "sip:alice@example.com".parse().unwrap();
        assert_eq!(uri.scheme(), Scheme::Sip);
        assert_eq!(uri.host(), "example.com");
        assert_eq!(uri.port(), None);
        assert_eq!(uri.target(), "example.com");

        let uri: SipUri =
            "SIPS:bob;x=y@Example.COM:5071;maddr=10.0.0.1;transport=TCP?a=b"
                .parse()
                .unwrap();
        assert_eq!(uri.scheme(), Scheme::Sips);
        assert_eq!(uri.host(), "Example.COM");
        assert_eq!(uri.port(), Some(5071));
        assert_eq!(uri.target(), "10.0.0.1");
        assert_eq!(uri.transport(), Some(SipTransport::Tcp));

        let uri: SipUri = "sip:[2001:db8::1]:5062".parse().unwrap();
        assert_eq!(uri.host(), "[2001:db8::1]");
        assert_eq!(uri.port(), Some(5062));
        let uri: SipUri = "sip:example.com:".parse().unwrap();
        assert_eq!(uri.port(), None);
    }

    #[test]
    fn bad_uris() {
        for uri in [
            "tel:+123456",
            "example.com",
            "sip:",
            "sip:example.com:0",
            "sip:example.com:65536",
            "sip:example.com:x",
            "sip:[::1",
            "sip:[::1]x",
            "sip:example.com;maddr",
        ] {
            assert_eq!(uri.parse::<SipUri>(), Err(SipError::BadUri), "{}", uri);
        }
        assert_eq!(
            "sip:example.com;transport=ws".parse::<SipUri>(),
            Err(SipError::NoTransport)
        );
    }

    #[test]
    fn numeric_hosts() {
        assert!(is_numeric("192.0.2.1"));
        assert!(is_numeric("[::1]"));
        assert!(is_numeric("2001:db8::1"));
        assert!(!is_numeric("example.com"));
        assert_eq!(
            parse_numeric("[2001:db8::1]"),
            Some("2001:db8::1".parse().unwrap())
        );
        assert_eq!(parse_numeric("[192.0.2.1]"), None);
    }
}
