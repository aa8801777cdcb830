//! Resource records.
//!
//! A [`Record`] consists of the common header every resource record
//! carries (owner name, type, class, TTL, and the length of the record
//! data as found on the wire) plus the record data itself, represented by
//! the [`RecordData`] enum for the types the resolver understands. All
//! other types are kept as opaque octets so they survive caching.
//!
//! Records are shared via `Arc` between the cache and any number of
//! answer lists handed out to callers. They are immutable with two
//! exceptions: the TTL and the priority of an SRV record can be adjusted
//! through the cache for graylisting a misbehaving target.
//!
//! A record may also be a synthesized error record. Those carry a
//! non-OK [`Status`], the name, type, and class of the failed query, and
//! no data.

use super::iana::{Class, Rcode, Rtype};
use super::name::{compose_name, parse_name};
use super::wire::{ComposeError, Composer, ParseError, Parser};
use bytes::Bytes;
use core::cmp::Ordering;
use core::fmt;
use core::sync::atomic::{AtomicU16, AtomicU32};
use std::net::{Ipv4Addr, Ipv6Addr};
use std::sync::atomic::Ordering::Relaxed;
use std::sync::Arc;

/// The TTL in seconds given to synthesized error records.
pub const ERROR_TTL: u32 = 10 * 60;

/// A list of records delivered as the answer to a query.
///
/// A finalized query always produces a non-empty list: either usable
/// records or a single error record.
pub type Answers = Vec<Arc<Record>>;

//------------ Status --------------------------------------------------------

/// The status of a record or query result.
///
/// The first six values map directly to DNS response codes. The others
/// are produced by the resolver itself.
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub enum Status {
    /// A valid record.
    Ok,

    /// The server could not interpret the query.
    FormatErr,

    /// The server failed.
    ServerErr,

    /// The domain name does not exist.
    NameErr,

    /// The server does not implement the query.
    UnimplErr,

    /// The server refused the query.
    AuthErr,

    /// No response arrived after all retries.
    TimeoutErr,

    /// The response had no records of the requested type.
    RecordErr,

    /// Something went wrong inside the resolver.
    InternalErr,

    /// No server could be reached.
    NetworkErr,
}

impl Status {
    /// Returns the status for a response code.
    pub fn from_rcode(rcode: Rcode) -> Self {
        match rcode {
            Rcode::NOERROR => Status::Ok,
            Rcode::FORMERR => Status::FormatErr,
            Rcode::NXDOMAIN => Status::NameErr,
            Rcode::NOTIMP => Status::UnimplErr,
            Rcode::REFUSED => Status::AuthErr,
            _ => Status::ServerErr,
        }
    }

    /// Returns the numeric status code.
    pub fn to_int(self) -> u16 {
        match self {
            Status::Ok => 0,
            Status::FormatErr => 1,
            Status::ServerErr => 2,
            Status::NameErr => 3,
            Status::UnimplErr => 4,
            Status::AuthErr => 5,
            Status::TimeoutErr => 16,
            Status::RecordErr => 17,
            Status::InternalErr => 18,
            Status::NetworkErr => 19,
        }
    }

    /// Returns whether this is an error status.
    pub fn is_error(self) -> bool {
        self != Status::Ok
    }

    /// Returns whether an error record with this status may be cached.
    ///
    /// Only definite negative answers are. Transient failures must not
    /// keep a name unresolvable for the lifetime of an error record.
    pub fn is_cacheable(self) -> bool {
        matches!(
            self,
            Status::Ok | Status::NameErr | Status::RecordErr | Status::UnimplErr
        )
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(match *self {
            Status::Ok => "OK",
            Status::FormatErr => "FORMAT_ERR",
            Status::ServerErr => "SERVER_ERR",
            Status::NameErr => "NAME_ERR",
            Status::UnimplErr => "UNIMPL_ERR",
            Status::AuthErr => "AUTH_ERR",
            Status::TimeoutErr => "TIMEOUT_ERR",
            Status::RecordErr => "RECORD_ERR",
            Status::InternalErr => "INTERNAL_ERR",
            Status::NetworkErr => "NETWORK_ERR",
        })
    }
}

//------------ Record --------------------------------------------------------

/// A resource record.
#[derive(Debug)]
pub struct Record {
    /// The owner name, always ending in a dot.
    name: String,

    /// The record type.
    rtype: Rtype,

    /// The record class.
    class: Class,

    /// The time to live in seconds.
    ttl: AtomicU32,

    /// The length of the record data as found on the wire.
    rdlen: u16,

    /// Whether this is a real record or an error placeholder.
    status: Status,

    /// The record data.
    data: RecordData,
}

impl Record {
    /// Creates a new record.
    pub fn new(
        name: impl Into<String>,
        rtype: Rtype,
        class: Class,
        ttl: u32,
        data: RecordData,
    ) -> Self {
        Record {
            name: name.into(),
            rtype,
            class,
            ttl: AtomicU32::new(ttl),
            rdlen: 0,
            status: Status::Ok,
            data,
        }
    }

    /// Creates a synthesized error record for a query.
    pub fn error(
        name: impl Into<String>,
        rtype: Rtype,
        class: Class,
        status: Status,
    ) -> Self {
        Record {
            name: name.into(),
            rtype,
            class,
            ttl: AtomicU32::new(ERROR_TTL),
            rdlen: 0,
            status,
            data: RecordData::Error,
        }
    }

    /// Takes a complete record from the parser.
    ///
    /// The record data is parsed within the limits of its declared
    /// length. Data that ends early or leaves octets unread is an error.
    pub fn parse(parser: &mut Parser) -> Result<Self, ParseError> {
        let name = parse_name(parser);
        let rtype = Rtype::from_int(parser.get_u16());
        let class = Class::from_int(parser.get_u16());
        let ttl = parser.get_u32();
        let rdlen = parser.get_u16();
        parser.check()?;

        let limit = parser.limit_to(rdlen.into());
        let data = RecordData::parse(rtype, parser);
        if parser.error().is_none() && parser.remaining() != 0 {
            parser.fail(ParseError::form_error("record data length mismatch"));
        }
        parser.restore_limit(limit);
        parser.check()?;

        Ok(Record {
            name,
            rtype,
            class,
            ttl: AtomicU32::new(ttl),
            rdlen,
            status: Status::Ok,
            data: data?,
        })
    }

    /// Returns the owner name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the record type.
    pub fn rtype(&self) -> Rtype {
        self.rtype
    }

    /// Returns the record class.
    pub fn class(&self) -> Class {
        self.class
    }

    /// Returns the time to live in seconds.
    pub fn ttl(&self) -> u32 {
        self.ttl.load(Relaxed)
    }

    /// Changes the time to live.
    pub(crate) fn set_ttl(&self, ttl: u32) {
        self.ttl.store(ttl, Relaxed)
    }

    /// Returns the length of the record data on the wire.
    pub fn rdlen(&self) -> u16 {
        self.rdlen
    }

    /// Returns the status of the record.
    pub fn status(&self) -> Status {
        self.status
    }

    /// Returns whether this is a synthesized error record.
    pub fn is_error(&self) -> bool {
        self.status.is_error()
    }

    /// Returns the record data.
    pub fn data(&self) -> &RecordData {
        &self.data
    }

    /// Returns the SRV data if this is a valid SRV record.
    pub fn as_srv(&self) -> Option<&Srv> {
        match self.data {
            RecordData::Srv(ref srv) => Some(srv),
            _ => None,
        }
    }

    /// Returns the NAPTR data if this is a valid NAPTR record.
    pub fn as_naptr(&self) -> Option<&Naptr> {
        match self.data {
            RecordData::Naptr(ref naptr) => Some(naptr),
            _ => None,
        }
    }

    /// Returns the canonical name if this is a valid CNAME record.
    pub fn as_cname(&self) -> Option<&str> {
        match self.data {
            RecordData::Cname(ref cname) => Some(cname),
            _ => None,
        }
    }

    /// Returns the SOA data if this is a valid SOA record.
    pub fn as_soa(&self) -> Option<&Soa> {
        match self.data {
            RecordData::Soa(ref soa) => Some(soa),
            _ => None,
        }
    }

    /// Compares two records.
    ///
    /// Records are ordered by status, class, and type first. Two error
    /// records with the same status, class, and type are equal. Valid
    /// records of the same type are ordered by their data: addresses
    /// numerically, names as strings, SRV records by ascending priority
    /// with larger weights first, NAPTR records by order and preference.
    pub fn compare(&self, other: &Record) -> Ordering {
        self.status
            .cmp(&other.status)
            .then(self.class.cmp(&other.class))
            .then(self.rtype.cmp(&other.rtype))
            .then_with(|| {
                if self.status.is_error() {
                    Ordering::Equal
                } else {
                    self.data.compare(&other.data)
                }
            })
    }
}

impl fmt::Display for Record {
    /// Formats the record in zone file format.
    ///
    /// Error records show their status in place of the data.
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        if self.is_error() {
            write!(
                f,
                "{} {} {} ; {}",
                self.name, self.class, self.rtype, self.status
            )
        } else {
            write!(
                f,
                "{} {} {} {} {}",
                self.name,
                self.ttl(),
                self.class,
                self.rtype,
                self.data
            )
        }
    }
}

//------------ RecordData ----------------------------------------------------

/// The data of a resource record.
#[derive(Debug)]
pub enum RecordData {
    /// An IPv4 host address.
    A(Ipv4Addr),

    /// An IPv6 host address.
    Aaaa(Ipv6Addr),

    /// The canonical name for an alias.
    Cname(String),

    /// A domain name pointer.
    Ptr(String),

    /// A service location.
    Srv(Srv),

    /// A naming authority pointer.
    Naptr(Naptr),

    /// The start of a zone of authority.
    Soa(Soa),

    /// A historic IPv6 address fragment.
    A6(A6),

    /// The content of an OPT pseudo-record.
    Opt(Bytes),

    /// The data of any other record type.
    Unknown(Bytes),

    /// No data: the record is an error placeholder.
    Error,
}

impl RecordData {
    /// Parses the data for a record of the given type.
    ///
    /// The parser must be limited to the record data.
    fn parse(rtype: Rtype, parser: &mut Parser) -> Result<Self, ParseError> {
        let res = match rtype {
            Rtype::A => RecordData::A(Ipv4Addr::from(parser.get_u32())),
            Rtype::AAAA => {
                let mut octets = [0u8; 16];
                let slice = parser.get_slice(16);
                if slice.len() == 16 {
                    octets.copy_from_slice(slice);
                }
                RecordData::Aaaa(Ipv6Addr::from(octets))
            }
            Rtype::CNAME => RecordData::Cname(parse_name(parser)),
            Rtype::PTR => RecordData::Ptr(parse_name(parser)),
            Rtype::SRV => RecordData::Srv(Srv::parse(parser)),
            Rtype::NAPTR => RecordData::Naptr(Naptr::parse(parser)),
            Rtype::SOA => RecordData::Soa(Soa::parse(parser)),
            Rtype::A6 => RecordData::A6(A6::parse(parser)),
            Rtype::OPT => {
                let len = parser.remaining();
                RecordData::Opt(Bytes::copy_from_slice(parser.get_slice(len)))
            }
            _ => {
                let len = parser.remaining();
                RecordData::Unknown(Bytes::copy_from_slice(
                    parser.get_slice(len),
                ))
            }
        };
        parser.check()?;
        Ok(res)
    }

    /// Appends the wire format of the record data without its length.
    pub fn compose(&self, target: &mut Composer) -> Result<(), ComposeError> {
        match *self {
            RecordData::A(addr) => target.put_slice(&addr.octets()),
            RecordData::Aaaa(addr) => target.put_slice(&addr.octets()),
            RecordData::Cname(ref name) | RecordData::Ptr(ref name) => {
                compose_name(target, name, None)
            }
            RecordData::Srv(ref srv) => {
                target.put_u16(srv.priority())?;
                target.put_u16(srv.weight)?;
                target.put_u16(srv.port)?;
                compose_name(target, &srv.target, None)
            }
            RecordData::Naptr(ref naptr) => {
                target.put_u16(naptr.order)?;
                target.put_u16(naptr.preference)?;
                target.put_string(naptr.flags.as_bytes())?;
                target.put_string(naptr.services.as_bytes())?;
                target.put_string(naptr.regexp.as_bytes())?;
                compose_name(target, &naptr.replacement, None)
            }
            RecordData::Soa(ref soa) => {
                compose_name(target, &soa.mname, None)?;
                compose_name(target, &soa.rname, None)?;
                target.put_u32(soa.serial)?;
                target.put_u32(soa.refresh)?;
                target.put_u32(soa.retry)?;
                target.put_u32(soa.expire)?;
                target.put_u32(soa.minimum)
            }
            RecordData::A6(ref a6) => {
                target.put_u8(a6.prefix_len)?;
                let suffix_len = a6.suffix_len();
                target.put_slice(&a6.suffix.octets()[16 - suffix_len..])?;
                match a6.prefix_name {
                    Some(ref name) if a6.prefix_len > 0 => {
                        compose_name(target, name, None)
                    }
                    _ => Ok(()),
                }
            }
            RecordData::Opt(ref data) | RecordData::Unknown(ref data) => {
                target.put_slice(data)
            }
            RecordData::Error => Ok(()),
        }
    }

    /// Compares the data of two records of the same type.
    fn compare(&self, other: &RecordData) -> Ordering {
        match (self, other) {
            (RecordData::A(a), RecordData::A(b)) => a.cmp(b),
            (RecordData::Aaaa(a), RecordData::Aaaa(b)) => a.cmp(b),
            (RecordData::Cname(a), RecordData::Cname(b))
            | (RecordData::Ptr(a), RecordData::Ptr(b)) => a.cmp(b),
            (RecordData::Srv(a), RecordData::Srv(b)) => a
                .priority()
                .cmp(&b.priority())
                .then(b.weight.cmp(&a.weight))
                .then_with(|| a.target.cmp(&b.target))
                .then(a.port.cmp(&b.port)),
            (RecordData::Naptr(a), RecordData::Naptr(b)) => a
                .order
                .cmp(&b.order)
                .then(a.preference.cmp(&b.preference))
                .then_with(|| a.flags.cmp(&b.flags))
                .then_with(|| a.services.cmp(&b.services))
                .then_with(|| a.regexp.cmp(&b.regexp))
                .then_with(|| a.replacement.cmp(&b.replacement)),
            (RecordData::Soa(a), RecordData::Soa(b)) => a
                .serial
                .cmp(&b.serial)
                .then_with(|| cmp_ignore_case(&a.mname, &b.mname))
                .then_with(|| cmp_ignore_case(&a.rname, &b.rname))
                .then(a.refresh.cmp(&b.refresh))
                .then(a.retry.cmp(&b.retry))
                .then(a.expire.cmp(&b.expire))
                .then(a.minimum.cmp(&b.minimum)),
            (RecordData::A6(a), RecordData::A6(b)) => a
                .prefix_len
                .cmp(&b.prefix_len)
                .then_with(|| match (&a.prefix_name, &b.prefix_name) {
                    (Some(x), Some(y)) => cmp_ignore_case(x, y),
                    (x, y) => x.is_none().cmp(&y.is_none()),
                })
                .then(a.suffix.cmp(&b.suffix)),
            (RecordData::Opt(a), RecordData::Opt(b))
            | (RecordData::Unknown(a), RecordData::Unknown(b)) => a.cmp(b),
            _ => Ordering::Equal,
        }
    }
}

fn cmp_ignore_case(left: &str, right: &str) -> Ordering {
    left.bytes()
        .map(|ch| ch.to_ascii_lowercase())
        .cmp(right.bytes().map(|ch| ch.to_ascii_lowercase()))
}

impl fmt::Display for RecordData {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            RecordData::A(addr) => addr.fmt(f),
            RecordData::Aaaa(addr) => addr.fmt(f),
            RecordData::Cname(ref name) | RecordData::Ptr(ref name) => {
                f.write_str(name)
            }
            RecordData::Srv(ref srv) => write!(
                f,
                "{} {} {} {}",
                srv.priority(),
                srv.weight,
                srv.port,
                srv.target
            ),
            RecordData::Naptr(ref naptr) => write!(
                f,
                "{} {} {:?} {:?} {:?} {}",
                naptr.order,
                naptr.preference,
                naptr.flags,
                naptr.services,
                naptr.regexp,
                naptr.replacement
            ),
            RecordData::Soa(ref soa) => write!(
                f,
                "{} {} {} {} {} {} {}",
                soa.mname,
                soa.rname,
                soa.serial,
                soa.refresh,
                soa.retry,
                soa.expire,
                soa.minimum
            ),
            RecordData::A6(ref a6) => {
                write!(f, "{} {}", a6.prefix_len, a6.suffix)?;
                if let Some(name) = a6.prefix_name.as_ref() {
                    write!(f, " {}", name)?;
                }
                Ok(())
            }
            RecordData::Opt(ref data) | RecordData::Unknown(ref data) => {
                write!(f, "\\# {}", data.len())?;
                for octet in data.iter() {
                    write!(f, " {:02x}", octet)?;
                }
                Ok(())
            }
            RecordData::Error => Ok(()),
        }
    }
}

//------------ Srv -----------------------------------------------------------

/// The data of an SRV record.
///
/// See RFC 2782.
#[derive(Debug)]
pub struct Srv {
    /// The priority of the target, lower values are tried first.
    ///
    /// Kept atomic since graylisting lowers it for a cached record.
    priority: AtomicU16,

    /// The relative weight among targets of the same priority.
    pub weight: u16,

    /// The port of the service on the target.
    pub port: u16,

    /// The target host.
    pub target: String,
}

impl Srv {
    /// Creates new SRV data.
    pub fn new(
        priority: u16,
        weight: u16,
        port: u16,
        target: impl Into<String>,
    ) -> Self {
        Srv {
            priority: AtomicU16::new(priority),
            weight,
            port,
            target: target.into(),
        }
    }

    fn parse(parser: &mut Parser) -> Self {
        let priority = parser.get_u16();
        let weight = parser.get_u16();
        let port = parser.get_u16();
        Srv::new(priority, weight, port, parse_name(parser))
    }

    /// Returns the current priority.
    pub fn priority(&self) -> u16 {
        self.priority.load(Relaxed)
    }

    /// Changes the priority.
    pub(crate) fn set_priority(&self, priority: u16) {
        self.priority.store(priority, Relaxed)
    }
}

//------------ Naptr ---------------------------------------------------------

/// The data of a NAPTR record.
///
/// See RFC 2915.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Naptr {
    pub order: u16,
    pub preference: u16,
    pub flags: String,
    pub services: String,
    pub regexp: String,
    pub replacement: String,
}

impl Naptr {
    fn parse(parser: &mut Parser) -> Self {
        Naptr {
            order: parser.get_u16(),
            preference: parser.get_u16(),
            flags: lossy_string(parser.get_string()),
            services: lossy_string(parser.get_string()),
            regexp: lossy_string(parser.get_string()),
            replacement: parse_name(parser),
        }
    }

    /// Returns whether the flags contain the given flag character.
    pub fn has_flag(&self, flag: char) -> bool {
        self.flags.chars().any(|ch| ch.eq_ignore_ascii_case(&flag))
    }
}

fn lossy_string(data: Bytes) -> String {
    String::from_utf8_lossy(&data).into_owned()
}

//------------ Soa -----------------------------------------------------------

/// The data of a SOA record.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Soa {
    pub mname: String,
    pub rname: String,
    pub serial: u32,
    pub refresh: u32,
    pub retry: u32,
    pub expire: u32,
    pub minimum: u32,
}

impl Soa {
    fn parse(parser: &mut Parser) -> Self {
        Soa {
            mname: parse_name(parser),
            rname: parse_name(parser),
            serial: parser.get_u32(),
            refresh: parser.get_u32(),
            retry: parser.get_u32(),
            expire: parser.get_u32(),
            minimum: parser.get_u32(),
        }
    }
}

//------------ A6 ------------------------------------------------------------

/// The data of an A6 record.
///
/// See RFC 2874.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct A6 {
    /// The number of leading address bits taken from the prefix name.
    pub prefix_len: u8,

    /// The address suffix with the prefix bits cleared.
    pub suffix: Ipv6Addr,

    /// The name to look up the prefix under, if `prefix_len` > 0.
    pub prefix_name: Option<String>,
}

impl A6 {
    fn parse(parser: &mut Parser) -> Self {
        let prefix_len = parser.get_u8();
        let mut res = A6 {
            prefix_len,
            suffix: Ipv6Addr::UNSPECIFIED,
            prefix_name: None,
        };
        if prefix_len > 128 {
            parser.fail(ParseError::form_error("invalid A6 prefix length"));
            return res;
        }
        let suffix_len = res.suffix_len();
        let slice = parser.get_slice(suffix_len);
        if slice.len() != suffix_len {
            return res;
        }
        let mut octets = [0u8; 16];
        octets[16 - suffix_len..].copy_from_slice(slice);
        if prefix_len > 0 {
            if suffix_len > 0 {
                octets[16 - suffix_len] &= 0xFF >> (prefix_len & 7);
            }
            res.prefix_name = Some(parse_name(parser));
        }
        res.suffix = Ipv6Addr::from(octets);
        res
    }

    /// Returns the number of suffix octets present on the wire.
    fn suffix_len(&self) -> usize {
        (128 + 7 - usize::from(self.prefix_len.min(128))) / 8
    }
}

//------------ Answer utilities ----------------------------------------------

/// Sorts a list of answers with [`Record::compare`].
///
/// The sort is stable: records comparing equal keep their order.
pub fn sort_answers(answers: &mut [Arc<Record>]) {
    answers.sort_by(|left, right| left.compare(right))
}

/// Removes all but valid `IN` records of the given type, then sorts.
///
/// If `rtype` is `ANY`, records of all types are kept.
pub fn filter_answers(answers: &mut Answers, rtype: Rtype) {
    answers.retain(|record| {
        !record.is_error()
            && record.class() == Class::IN
            && (rtype == Rtype::ANY || record.rtype() == rtype)
    });
    sort_answers(answers)
}

//============ Testing =======================================================

#[cfg(test)]
mod test {
    use super::*;

    fn parse(data: &[u8]) -> Result<Record, ParseError> {
        let mut parser = Parser::new(data);
        Record::parse(&mut parser)
    }

    #[test]
    fn parse_a() {
        let record = parse(
            b"\x07example\x04test\x00\x00\x01\x00\x01\x00\x00\x0e\x10\
              \x00\x04\xc0\x00\x02\x0a",
        )
        .unwrap();
        assert_eq!(record.name(), "example.test.");
        assert_eq!(record.rtype(), Rtype::A);
        assert_eq!(record.class(), Class::IN);
        assert_eq!(record.ttl(), 3600);
        assert_eq!(record.rdlen(), 4);
        assert!(matches!(
            record.data(),
            RecordData::A(addr) if *addr == Ipv4Addr::new(192, 0, 2, 10)
        ));
    }

    #[test]
    fn parse_srv_and_naptr() {
        let record = parse(
            b"\x00\x00\x21\x00\x01\x00\x00\x00\x3c\x00\x0e\
              \x00\x01\x00\x02\x13\xc4\x03sip\x02ex\x00",
        )
        .unwrap();
        let srv = record.as_srv().unwrap();
        assert_eq!(
            (srv.priority(), srv.weight, srv.port, srv.target.as_str()),
            (1, 2, 5060, "sip.ex.")
        );

        let record = parse(
            b"\x00\x00\x23\x00\x01\x00\x00\x00\x3c\x00\x1d\
              \x00\x0a\x00\x14\x01s\x07SIP+D2U\x00\
              \x04_sip\x04_udp\x02ex\x00",
        )
        .unwrap();
        let naptr = record.as_naptr().unwrap();
        assert_eq!(naptr.order, 10);
        assert_eq!(naptr.preference, 20);
        assert!(naptr.has_flag('S'));
        assert_eq!(naptr.services, "SIP+D2U");
        assert_eq!(naptr.regexp, "");
        assert_eq!(naptr.replacement, "_sip._udp.ex.");
    }

    #[test]
    fn parse_unknown_kept_opaque() {
        let record = parse(
            b"\x00\x00\x10\x00\x01\x00\x00\x00\x3c\x00\x04\x03abc",
        )
        .unwrap();
        assert_eq!(record.rtype(), Rtype::TXT);
        assert!(matches!(
            record.data(),
            RecordData::Unknown(data) if data.as_ref() == b"\x03abc"
        ));
    }

    #[test]
    fn rdlen_mismatch() {
        // A record claiming five octets of data.
        assert!(parse(
            b"\x00\x00\x01\x00\x01\x00\x00\x00\x3c\x00\x05\x01\x02\x03\x04\x05"
        )
        .is_err());
        // A record with three octets of data.
        assert!(
            parse(b"\x00\x00\x01\x00\x01\x00\x00\x00\x3c\x00\x03\x01\x02\x03")
                .is_err()
        );
        // Declared length beyond the end of the message.
        assert_eq!(
            parse(b"\x00\x00\x01\x00\x01\x00\x00\x00\x3c\x00\x04\x01\x02")
                .unwrap_err(),
            ParseError::ShortInput
        );
        // SRV target running past the record data.
        assert!(parse(
            b"\x00\x00\x21\x00\x01\x00\x00\x00\x3c\x00\x08\
              \x00\x01\x00\x02\x13\xc4\x03sip\x00"
        )
        .is_err());
    }

    #[test]
    fn parse_a6() {
        let record = parse(
            b"\x00\x00\x26\x00\x01\x00\x00\x00\x3c\x00\x0c\
              \x40\x00\x00\x00\x00\x00\x00\x00\x01\x01p\x00",
        )
        .unwrap();
        match record.data() {
            RecordData::A6(a6) => {
                assert_eq!(a6.prefix_len, 64);
                assert_eq!(a6.suffix, "::1".parse::<Ipv6Addr>().unwrap());
                assert_eq!(a6.prefix_name.as_deref(), Some("p."));
            }
            other => panic!("unexpected data {:?}", other),
        }
    }

    fn srv(priority: u16, weight: u16, target: &str) -> Arc<Record> {
        Arc::new(Record::new(
            "_sip._udp.ex.",
            Rtype::SRV,
            Class::IN,
            60,
            RecordData::Srv(Srv::new(priority, weight, 5060, target)),
        ))
    }

    #[test]
    fn srv_ordering() {
        let mut answers = vec![
            srv(1, 100, "c."),
            srv(0, 10, "a."),
            srv(0, 90, "b."),
        ];
        sort_answers(&mut answers);
        let targets: Vec<_> = answers
            .iter()
            .map(|r| r.as_srv().unwrap().target.clone())
            .collect();
        assert_eq!(targets, ["b.", "a.", "c."]);
    }

    #[test]
    fn errors_sort_after_valid_records() {
        let mut answers = vec![
            Arc::new(Record::error(
                "ex.",
                Rtype::A,
                Class::IN,
                Status::RecordErr,
            )),
            Arc::new(Record::new(
                "ex.",
                Rtype::A,
                Class::IN,
                60,
                RecordData::A(Ipv4Addr::new(192, 0, 2, 2)),
            )),
            Arc::new(Record::new(
                "ex.",
                Rtype::A,
                Class::IN,
                60,
                RecordData::A(Ipv4Addr::new(192, 0, 2, 1)),
            )),
        ];
        sort_answers(&mut answers);
        assert!(matches!(
            answers[0].data(),
            RecordData::A(addr) if *addr == Ipv4Addr::new(192, 0, 2, 1)
        ));
        assert!(answers[2].is_error());

        filter_answers(&mut answers, Rtype::AAAA);
        assert!(answers.is_empty());
    }

    #[test]
    fn filter() {
        let mut answers = vec![
            srv(0, 1, "a."),
            Arc::new(Record::new(
                "ex.",
                Rtype::A,
                Class::CH,
                60,
                RecordData::A(Ipv4Addr::LOCALHOST),
            )),
            Arc::new(Record::error(
                "ex.",
                Rtype::SRV,
                Class::IN,
                Status::NameErr,
            )),
        ];
        filter_answers(&mut answers, Rtype::ANY);
        assert_eq!(answers.len(), 1);
        assert_eq!(answers[0].rtype(), Rtype::SRV);
    }

    #[test]
    fn soa_compares_names_ignoring_case() {
        let soa = |mname: &str| {
            Record::new(
                "ex.",
                Rtype::SOA,
                Class::IN,
                60,
                RecordData::Soa(Soa {
                    mname: mname.into(),
                    rname: "hostmaster.ex.".into(),
                    serial: 1,
                    refresh: 2,
                    retry: 3,
                    expire: 4,
                    minimum: 5,
                }),
            )
        };
        assert_eq!(soa("NS.ex.").compare(&soa("ns.EX.")), Ordering::Equal);
        assert_eq!(soa("a.ex.").compare(&soa("b.ex.")), Ordering::Less);
    }

    #[test]
    fn compose_round_trip() {
        let data = RecordData::Naptr(Naptr {
            order: 1,
            preference: 2,
            flags: "a".into(),
            services: "SIPS+D2T".into(),
            regexp: "".into(),
            replacement: "host.ex.".into(),
        });
        let mut target = Composer::with_capacity(512);
        target.put_slice(b"\x00\x00\x23\x00\x01\x00\x00\x00\x3c\x00\x00")
            .unwrap();
        data.compose(&mut target).unwrap();
        let rdlen = (target.len() - 11) as u16;
        target.set_u16_at(9, rdlen);
        let record = parse(target.as_slice()).unwrap();
        assert_eq!(
            record.as_naptr(),
            match data {
                RecordData::Naptr(ref naptr) => Some(naptr),
                _ => None,
            }
        );
    }

    #[test]
    fn display() {
        let record = Record::new(
            "_sip._udp.ex.",
            Rtype::SRV,
            Class::IN,
            300,
            RecordData::Srv(Srv::new(10, 60, 5060, "pbx.ex.")),
        );
        assert_eq!(
            record.to_string(),
            "_sip._udp.ex. 300 IN SRV 10 60 5060 pbx.ex."
        );
        let error =
            Record::error("nowhere.ex.", Rtype::A, Class::IN, Status::NameErr);
        assert!(error.to_string().starts_with("nowhere.ex. IN A ; "));
    }
}
