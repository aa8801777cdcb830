//! The header of a DNS message.
//!
//! Each DNS message starts with a twelve octet long header section
//! containing some general information related to the message as well as
//! the number of records in each of the four sections that follow the
//! header.

use super::iana::Rcode;
use super::wire::{ComposeError, Composer, Parser};

/// The length of the header section in octets.
pub const HEADER_LEN: usize = 12;

//------------ Header --------------------------------------------------------

/// The complete header section of a DNS message.
///
/// Consists of the message ID, the flags word, and the four section
/// counts.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct Header {
    /// The ID of the message.
    pub id: u16,

    /// QR, Opcode, AA, TC, RD, RA, Z, AD, CD, and RCODE.
    pub flags: u16,

    /// The number of entries in the question section.
    pub qdcount: u16,

    /// The number of records in the answer section.
    pub ancount: u16,

    /// The number of records in the authority section.
    pub nscount: u16,

    /// The number of records in the additional section.
    pub arcount: u16,
}

/// The QR bit: set in responses.
pub const FLAG_QR: u16 = 0x8000;

/// The TC bit: the message was truncated.
pub const FLAG_TC: u16 = 0x0200;

/// The RD bit: recursion desired.
pub const FLAG_RD: u16 = 0x0100;

/// The RA bit: recursion available.
pub const FLAG_RA: u16 = 0x0080;

impl Header {
    /// Creates the header of a standard query with recursion desired.
    pub fn new_query(id: u16) -> Self {
        Header {
            id,
            flags: FLAG_RD,
            qdcount: 1,
            ..Default::default()
        }
    }

    /// Takes a header from the beginning of a message.
    pub fn parse(parser: &mut Parser) -> Self {
        Header {
            id: parser.get_u16(),
            flags: parser.get_u16(),
            qdcount: parser.get_u16(),
            ancount: parser.get_u16(),
            nscount: parser.get_u16(),
            arcount: parser.get_u16(),
        }
    }

    /// Appends the header.
    pub fn compose(&self, target: &mut Composer) -> Result<(), ComposeError> {
        target.put_u16(self.id)?;
        target.put_u16(self.flags)?;
        target.put_u16(self.qdcount)?;
        target.put_u16(self.ancount)?;
        target.put_u16(self.nscount)?;
        target.put_u16(self.arcount)
    }

    /// Returns whether the message is a response.
    pub fn qr(&self) -> bool {
        self.flags & FLAG_QR != 0
    }

    /// Returns whether the message was truncated.
    pub fn tc(&self) -> bool {
        self.flags & FLAG_TC != 0
    }

    /// Returns the response code.
    pub fn rcode(&self) -> Rcode {
        Rcode::from_flags(self.flags)
    }

    /// Sets the response code.
    pub fn set_rcode(&mut self, rcode: Rcode) {
        self.flags = (self.flags & !0x0F) | u16::from(rcode.to_int() & 0x0F)
    }
}

//============ Testing =======================================================
