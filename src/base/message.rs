//! Query and response messages.
//!
//! The resolver only ever sends one kind of message: a recursive query
//! with a single question and, for servers that have not been found to
//! reject it, an EDNS0 OPT record. Responses are decoded into a list of
//! records for the caller plus the records of the authority and
//! additional sections which only go into the cache.
//!
//! [`ResponseBuilder`] creates responses. The resolver itself never
//! needs it; it exists for exercising the resolver without a nameserver.

use super::header::{Header, FLAG_QR, FLAG_RA, FLAG_RD, HEADER_LEN};
use super::iana::{Class, Rcode, Rtype};
use super::name::{compose_name, name_eq, parse_name, to_rooted};
use super::record::{Answers, Record, Status};
use super::wire::{ComposeError, Composer, ParseError, Parser};
use bytes::Bytes;
use core::fmt;
use std::sync::Arc;

/// The maximum size of a message sent or received.
///
/// This is also the UDP payload size advertised via EDNS0.
pub const MAX_MESSAGE: usize = 1460;

/// Error records take the SOA minimum as TTL only if it is above this.
const MIN_NEGATIVE_TTL: u32 = 10;

//------------ Encoding ------------------------------------------------------

/// Creates a query message.
///
/// The message asks for records of `rtype` and `class` for `name` with
/// recursion desired. If `edns` is true, an OPT record advertising
/// [`MAX_MESSAGE`] as the UDP payload size is added.
pub fn encode_query(
    id: u16,
    name: &str,
    rtype: Rtype,
    class: Class,
    edns: bool,
) -> Result<Bytes, ComposeError> {
    let mut target = Composer::with_capacity(MAX_MESSAGE);
    let mut header = Header::new_query(id);
    if edns {
        header.arcount = 1;
    }
    header.compose(&mut target)?;
    compose_name(&mut target, name, None)?;
    target.put_u16(rtype.to_int())?;
    target.put_u16(class.to_int())?;
    if edns {
        compose_name(&mut target, ".", None)?;
        target.put_u16(Rtype::OPT.to_int())?;
        // The class of an OPT record is our UDP payload size.
        target.put_u16(MAX_MESSAGE as u16)?;
        // Extended RCODE and flags.
        target.put_u32(0)?;
        target.put_u16(0)?;
    }
    Ok(target.freeze())
}

//------------ Decoding ------------------------------------------------------

/// Returns the message ID of a datagram if it is long enough.
pub fn peek_id(data: &[u8]) -> Option<u16> {
    match *data.get(..2)? {
        [a, b] => Some(u16::from_be_bytes([a, b])),
        _ => None,
    }
}

/// What a response is checked against.
#[derive(Clone, Copy, Debug)]
pub struct QueryInfo<'a> {
    /// The queried name.
    pub name: &'a str,

    /// The queried type.
    pub rtype: Rtype,

    /// The queried class.
    pub class: Class,

    /// Whether the query carried an OPT record.
    pub edns: bool,

    /// Whether the query follows a CNAME of an earlier answer.
    ///
    /// A response to such a query that only contains another CNAME is
    /// not followed again but turned into a record error.
    pub chasing: bool,
}

/// A decoded response.
#[derive(Debug)]
pub struct Response {
    /// The message ID.
    pub id: u16,

    /// The overall status of the response.
    pub status: Status,

    /// The records delivered to the caller.
    ///
    /// If `status` is an error, the first record is the error record.
    pub answers: Answers,

    /// The records from the authority and additional sections.
    pub extra: Answers,
}

impl Response {
    /// Returns the records of the response that belong into the cache.
    ///
    /// These are all records except error records for transient errors
    /// and OPT records.
    pub fn cacheable(&self) -> impl Iterator<Item = &Arc<Record>> {
        self.answers
            .iter()
            .chain(self.extra.iter())
            .filter(|record| {
                record.status().is_cacheable() && record.rtype() != Rtype::OPT
            })
    }
}

/// Decodes a response to the query described by `query`.
///
/// Any response code other than NOERROR, or a NOERROR response without
/// records, results in an error record at the front of the answers. A
/// server responding with FORMERR to a query with an OPT record is taken
/// as rejecting EDNS0 and reported as [`DecodeError::EdnsRejected`].
pub fn decode_response(
    data: &[u8],
    query: &QueryInfo,
) -> Result<Response, DecodeError> {
    if data.len() < HEADER_LEN {
        return Err(ParseError::ShortInput.into());
    }
    let mut parser = Parser::new(data);
    let header = Header::parse(&mut parser);

    if header.rcode() == Rcode::FORMERR && query.edns {
        return Err(DecodeError::EdnsRejected);
    }

    for _ in 0..header.qdcount {
        parse_name(&mut parser);
        parser.get_u16();
        parser.get_u16();
    }
    parser.check()?;

    let mut status = Status::from_rcode(header.rcode());
    if header.ancount == 0 && status == Status::Ok {
        status = Status::RecordErr;
    }
    let error = if status.is_error() {
        Some(Arc::new(error_record(query, status)))
    } else {
        None
    };

    let mut answers = Answers::with_capacity(
        usize::from(header.ancount) + usize::from(error.is_some()),
    );
    answers.extend(error.clone());
    let mut extra = Answers::new();
    let total = usize::from(header.ancount)
        + usize::from(header.nscount)
        + usize::from(header.arcount);
    for i in 0..total {
        let record = Record::parse(&mut parser)?;
        if let (Some(error), Some(soa)) = (error.as_ref(), record.as_soa()) {
            if error.ttl() > soa.minimum && soa.minimum > MIN_NEGATIVE_TTL {
                error.set_ttl(soa.minimum);
            }
        }
        if i < usize::from(header.ancount) {
            answers.push(Arc::new(record));
        } else {
            extra.push(Arc::new(record));
        }
    }

    if error.is_none()
        && !query.rtype.is_qtype()
        && (query.chasing || answers[0].rtype() != Rtype::CNAME)
        && !answers.iter().any(|record| record.rtype() == query.rtype)
    {
        status = Status::RecordErr;
        answers.insert(0, Arc::new(error_record(query, status)));
    }

    Ok(Response {
        id: header.id,
        status,
        answers,
        extra,
    })
}

/// Creates the error record for a query.
pub fn error_record(query: &QueryInfo, status: Status) -> Record {
    Record::error(to_rooted(query.name), query.rtype, query.class, status)
}

//------------ ResponseBuilder -----------------------------------------------

/// Builds a response message.
///
/// Owner names equal to the question name are compressed into a pointer
/// to the question.
#[derive(Debug)]
pub struct ResponseBuilder {
    header: Header,
    qname: String,
    qtype: Rtype,
    qclass: Class,
    answer: Vec<Record>,
    authority: Vec<Record>,
    additional: Vec<Record>,
}

impl ResponseBuilder {
    /// Starts a response with the given ID and question.
    pub fn new(id: u16, qname: &str, qtype: Rtype) -> Self {
        ResponseBuilder {
            header: Header {
                id,
                flags: FLAG_QR | FLAG_RD | FLAG_RA,
                qdcount: 1,
                ..Default::default()
            },
            qname: to_rooted(qname).into_owned(),
            qtype,
            qclass: Class::IN,
            answer: Vec::new(),
            authority: Vec::new(),
            additional: Vec::new(),
        }
    }

    /// Starts a response to the given query message.
    pub fn for_query(query: &[u8]) -> Result<Self, ParseError> {
        let mut parser = Parser::new(query);
        let header = Header::parse(&mut parser);
        let qname = parse_name(&mut parser);
        let qtype = Rtype::from_int(parser.get_u16());
        parser.check()?;
        Ok(Self::new(header.id, &qname, qtype))
    }

    /// Returns the question name.
    pub fn qname(&self) -> &str {
        &self.qname
    }

    /// Returns the question type.
    pub fn qtype(&self) -> Rtype {
        self.qtype
    }

    /// Sets the response code.
    pub fn rcode(mut self, rcode: Rcode) -> Self {
        self.header.set_rcode(rcode);
        self
    }

    /// Adds a record to the answer section.
    pub fn answer(mut self, record: Record) -> Self {
        self.answer.push(record);
        self
    }

    /// Adds a record to the authority section.
    pub fn authority(mut self, record: Record) -> Self {
        self.authority.push(record);
        self
    }

    /// Adds a record to the additional section.
    pub fn additional(mut self, record: Record) -> Self {
        self.additional.push(record);
        self
    }

    /// Assembles the message.
    pub fn finish(mut self) -> Result<Bytes, ComposeError> {
        let count = |records: &[Record]| {
            u16::try_from(records.len()).map_err(|_| ComposeError::ShortBuf)
        };
        self.header.ancount = count(&self.answer)?;
        self.header.nscount = count(&self.authority)?;
        self.header.arcount = count(&self.additional)?;

        let mut target = Composer::with_capacity(usize::from(u16::MAX));
        self.header.compose(&mut target)?;
        compose_name(&mut target, &self.qname, None)?;
        target.put_u16(self.qtype.to_int())?;
        target.put_u16(self.qclass.to_int())?;
        for record in self
            .answer
            .iter()
            .chain(self.authority.iter())
            .chain(self.additional.iter())
        {
            self.compose_record(&mut target, record)?;
        }
        Ok(target.freeze())
    }

    fn compose_record(
        &self,
        target: &mut Composer,
        record: &Record,
    ) -> Result<(), ComposeError> {
        if self.qname != "." && name_eq(record.name(), &self.qname) {
            compose_name(target, "", Some(HEADER_LEN as u16))?;
        } else {
            compose_name(target, record.name(), None)?;
        }
        target.put_u16(record.rtype().to_int())?;
        target.put_u16(record.class().to_int())?;
        target.put_u32(record.ttl())?;
        let pos = target.len();
        target.put_u16(0)?;
        record.data().compose(target)?;
        let rdlen = target.len() - pos - 2;
        target.set_u16_at(
            pos,
            u16::try_from(rdlen).map_err(|_| ComposeError::ShortBuf)?,
        );
        Ok(())
    }
}

//============ Error Types ===================================================

//------------ DecodeError ---------------------------------------------------

/// A response could not be used.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum DecodeError {
    /// The message was malformed.
    Parse(ParseError),

    /// The server answered a query with an OPT record with FORMERR.
    EdnsRejected,
}

impl From<ParseError> for DecodeError {
    fn from(err: ParseError) -> Self {
        DecodeError::Parse(err)
    }
}

impl fmt::Display for DecodeError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            DecodeError::Parse(ref err) => err.fmt(f),
            DecodeError::EdnsRejected => f.write_str("server rejected EDNS0"),
        }
    }
}

impl std::error::Error for DecodeError {}

//============ Testing =======================================================

#[cfg(test)]
mod test {
    use super::*;
    use crate::base::record::{RecordData, Soa, Srv};
    use std::net::Ipv4Addr;

    fn info(name: &str, rtype: Rtype) -> QueryInfo {
        QueryInfo {
            name,
            rtype,
            class: Class::IN,
            edns: false,
            chasing: false,
        }
    }

    fn a(name: &str, addr: [u8; 4]) -> Record {
        Record::new(
            name,
            Rtype::A,
            Class::IN,
            3600,
            RecordData::A(Ipv4Addr::from(addr)),
        )
    }

    #[test]
    fn encode() {
        let msg =
            encode_query(0x1234, "sip.ex", Rtype::SRV, Class::IN, false)
                .unwrap();
        assert_eq!(
            msg.as_ref(),
            b"\x12\x34\x01\x00\x00\x01\x00\x00\x00\x00\x00\x00\
              \x03sip\x02ex\x00\x00\x21\x00\x01"
        );

        let msg =
            encode_query(1, "ex.", Rtype::A, Class::IN, true).unwrap();
        assert_eq!(&msg[10..12], b"\x00\x01");
        assert_eq!(&msg[msg.len() - 11..], b"\x00\x00\x29\x05\xb4\x00\x00\x00\x00\x00\x00");
    }

    #[test]
    fn encode_bad_names() {
        assert_eq!(
            encode_query(1, "a..b", Rtype::A, Class::IN, false),
            Err(ComposeError::EmptyLabel)
        );
        let long = "x".repeat(64);
        assert_eq!(
            encode_query(1, &long, Rtype::A, Class::IN, false),
            Err(ComposeError::LongLabel)
        );
    }

    #[test]
    fn round_trip() {
        let query =
            encode_query(77, "example.test", Rtype::A, Class::IN, true)
                .unwrap();
        let response = ResponseBuilder::for_query(&query)
            .unwrap()
            .answer(a("example.test.", [192, 0, 2, 10]))
            .finish()
            .unwrap();
        assert_eq!(peek_id(&response), Some(77));
        let res = decode_response(&response, &info("example.test", Rtype::A))
            .unwrap();
        assert_eq!(res.status, Status::Ok);
        assert_eq!(res.answers.len(), 1);
        let record = &res.answers[0];
        assert_eq!(record.name(), "example.test.");
        assert_eq!(record.ttl(), 3600);
        assert!(matches!(
            record.data(),
            RecordData::A(addr) if *addr == Ipv4Addr::new(192, 0, 2, 10)
        ));
    }

    #[test]
    fn short_message() {
        assert_eq!(
            decode_response(b"\x00\x01\x81\x80", &info("ex", Rtype::A))
                .unwrap_err(),
            DecodeError::Parse(ParseError::ShortInput)
        );
        assert_eq!(peek_id(b"\x01"), None);
    }

    #[test]
    fn edns_rejected() {
        let msg = ResponseBuilder::new(1, "ex.", Rtype::A)
            .rcode(Rcode::FORMERR)
            .finish()
            .unwrap();
        let mut query = info("ex.", Rtype::A);
        query.edns = true;
        assert_eq!(
            decode_response(&msg, &query).unwrap_err(),
            DecodeError::EdnsRejected
        );
        query.edns = false;
        let res = decode_response(&msg, &query).unwrap();
        assert_eq!(res.status, Status::FormatErr);
        assert_eq!(res.answers.len(), 1);
        assert!(res.cacheable().next().is_none());
    }

    #[test]
    fn nxdomain_with_soa() {
        let msg = ResponseBuilder::new(1, "nope.ex.", Rtype::A)
            .rcode(Rcode::NXDOMAIN)
            .authority(Record::new(
                "ex.",
                Rtype::SOA,
                Class::IN,
                3600,
                RecordData::Soa(Soa {
                    mname: "ns.ex.".into(),
                    rname: "hostmaster.ex.".into(),
                    serial: 1,
                    refresh: 7200,
                    retry: 900,
                    expire: 86400,
                    minimum: 300,
                }),
            ))
            .finish()
            .unwrap();
        let res = decode_response(&msg, &info("nope.ex", Rtype::A)).unwrap();
        assert_eq!(res.status, Status::NameErr);
        assert_eq!(res.answers.len(), 1);
        let error = &res.answers[0];
        assert!(error.is_error());
        assert_eq!(error.name(), "nope.ex.");
        assert_eq!(error.rtype(), Rtype::A);
        assert_eq!(error.ttl(), 300);
        assert_eq!(res.extra.len(), 1);
        assert_eq!(res.cacheable().count(), 2);
    }

    #[test]
    fn empty_answer_is_record_error() {
        let msg = ResponseBuilder::new(1, "ex.", Rtype::AAAA).finish().unwrap();
        let res = decode_response(&msg, &info("ex.", Rtype::AAAA)).unwrap();
        assert_eq!(res.status, Status::RecordErr);
        assert_eq!(res.answers[0].ttl(), 600);
    }

    #[test]
    fn wrong_type_is_record_error() {
        let msg = ResponseBuilder::new(1, "ex.", Rtype::SRV)
            .answer(a("ex.", [192, 0, 2, 1]))
            .finish()
            .unwrap();
        let res = decode_response(&msg, &info("ex.", Rtype::SRV)).unwrap();
        assert_eq!(res.status, Status::RecordErr);
        assert_eq!(res.answers.len(), 2);
        assert!(res.answers[0].is_error());
        assert_eq!(res.answers[1].rtype(), Rtype::A);

        // ANY matches whatever comes back.
        let res = decode_response(&msg, &info("ex.", Rtype::ANY)).unwrap();
        assert_eq!(res.status, Status::Ok);
    }

    #[test]
    fn cname_only() {
        let msg = ResponseBuilder::new(1, "alias.ex.", Rtype::A)
            .answer(Record::new(
                "alias.ex.",
                Rtype::CNAME,
                Class::IN,
                60,
                RecordData::Cname("real.ex.".into()),
            ))
            .finish()
            .unwrap();
        let res = decode_response(&msg, &info("alias.ex.", Rtype::A)).unwrap();
        assert_eq!(res.status, Status::Ok);
        assert_eq!(res.answers[0].as_cname(), Some("real.ex."));

        let mut query = info("alias.ex.", Rtype::A);
        query.chasing = true;
        let res = decode_response(&msg, &query).unwrap();
        assert_eq!(res.status, Status::RecordErr);
    }

    #[test]
    fn extra_sections() {
        let msg = ResponseBuilder::new(9, "_sip._udp.ex.", Rtype::SRV)
            .answer(Record::new(
                "_sip._udp.ex.",
                Rtype::SRV,
                Class::IN,
                60,
                RecordData::Srv(Srv::new(0, 0, 5060, "sip.ex.")),
            ))
            .additional(a("sip.ex.", [192, 0, 2, 3]))
            .finish()
            .unwrap();
        let res =
            decode_response(&msg, &info("_sip._udp.ex.", Rtype::SRV)).unwrap();
        assert_eq!(res.id, 9);
        assert_eq!(res.answers.len(), 1);
        assert_eq!(res.extra.len(), 1);
        assert_eq!(res.extra[0].name(), "sip.ex.");
        assert_eq!(res.cacheable().count(), 2);
    }

    #[test]
    fn truncated_record() {
        let msg = ResponseBuilder::new(1, "ex.", Rtype::A)
            .answer(a("ex.", [192, 0, 2, 1]))
            .finish()
            .unwrap();
        assert!(matches!(
            decode_response(&msg[..msg.len() - 1], &info("ex.", Rtype::A)),
            Err(DecodeError::Parse(_))
        ));
    }
}
