//! Creating and consuming data in wire format.
//!
//! DNS messages handled by this crate are small and bounded: a query never
//! exceeds [`MAX_MESSAGE`] octets and a response is only ever read from a
//! single UDP datagram. Both directions therefore work on plain octet
//! slices.
//!
//! The [`Parser`] latches the first error it encounters. Once an error has
//! been recorded, all further reads return zero values and leave the
//! position untouched, so a sequence of reads can be checked with a single
//! call to [`Parser::check`] at its end.
//!
//! [`MAX_MESSAGE`]: crate::base::message::MAX_MESSAGE

use bytes::{BufMut, Bytes, BytesMut};
use core::fmt;

//------------ Parser --------------------------------------------------------

/// A bounds-checked reader over a DNS message.
#[derive(Clone, Debug)]
pub struct Parser<'a> {
    /// The complete message.
    ///
    /// Compression pointers are resolved against this, so it is never
    /// narrowed.
    data: &'a [u8],

    /// The current read position.
    pos: usize,

    /// The end of the currently readable area.
    limit: usize,

    /// The first error encountered.
    error: Option<ParseError>,
}

impl<'a> Parser<'a> {
    /// Creates a new parser over the complete message.
    pub fn new(data: &'a [u8]) -> Self {
        Parser {
            data,
            pos: 0,
            limit: data.len(),
            error: None,
        }
    }

    /// Returns the complete underlying message.
    pub fn message(&self) -> &'a [u8] {
        self.data
    }

    /// Returns the current read position.
    pub fn pos(&self) -> usize {
        self.pos
    }

    /// Returns the number of octets left before the current limit.
    pub fn remaining(&self) -> usize {
        self.limit.saturating_sub(self.pos)
    }

    /// Returns the current limit.
    pub fn limit(&self) -> usize {
        self.limit
    }

    /// Restricts reading to the next `len` octets.
    ///
    /// Returns the previous limit to be given back to
    /// [`restore_limit`][Self::restore_limit]. If fewer than `len` octets
    /// are available, the parser fails with a short input error.
    pub fn limit_to(&mut self, len: usize) -> usize {
        let old = self.limit;
        if self.error.is_none() {
            if len > self.remaining() {
                self.fail(ParseError::ShortInput);
            } else {
                self.limit = self.pos + len;
            }
        }
        old
    }

    /// Restores a limit previously returned by `limit_to`.
    pub fn restore_limit(&mut self, limit: usize) {
        self.limit = limit;
    }

    /// Returns the first error encountered, if any.
    pub fn error(&self) -> Option<ParseError> {
        self.error
    }

    /// Returns the latched error as a result.
    pub fn check(&self) -> Result<(), ParseError> {
        match self.error {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    /// Records an error unless one has already been recorded.
    pub fn fail(&mut self, err: ParseError) {
        if self.error.is_none() {
            self.error = Some(err)
        }
    }

    /// Takes the next `len` octets.
    ///
    /// Returns an empty slice if the parser has failed or fails now.
    pub fn get_slice(&mut self, len: usize) -> &'a [u8] {
        if self.error.is_some() {
            return &[];
        }
        if len > self.remaining() {
            self.fail(ParseError::ShortInput);
            return &[];
        }
        let res = &self.data[self.pos..self.pos + len];
        self.pos += len;
        res
    }

    /// Takes an octet.
    pub fn get_u8(&mut self) -> u8 {
        match *self.get_slice(1) {
            [x] => x,
            _ => 0,
        }
    }

    /// Takes a big-endian 16 bit integer.
    pub fn get_u16(&mut self) -> u16 {
        match *self.get_slice(2) {
            [a, b] => u16::from_be_bytes([a, b]),
            _ => 0,
        }
    }

    /// Takes a big-endian 32 bit integer.
    pub fn get_u32(&mut self) -> u32 {
        match *self.get_slice(4) {
            [a, b, c, d] => u32::from_be_bytes([a, b, c, d]),
            _ => 0,
        }
    }

    /// Takes a character string: a length octet and that many octets.
    pub fn get_string(&mut self) -> Bytes {
        let len = self.get_u8();
        Bytes::copy_from_slice(self.get_slice(len.into()))
    }

    /// Skips over `len` octets.
    pub fn advance(&mut self, len: usize) {
        self.get_slice(len);
    }
}

//------------ Composer ------------------------------------------------------

/// A writer for DNS messages with a fixed maximum size.
#[derive(Clone, Debug)]
pub struct Composer {
    /// The message assembled so far.
    buf: BytesMut,

    /// The maximum size of the message.
    capacity: usize,
}

impl Composer {
    /// Creates a new composer that accepts up to `capacity` octets.
    pub fn with_capacity(capacity: usize) -> Self {
        Composer {
            buf: BytesMut::with_capacity(capacity),
            capacity,
        }
    }

    /// Returns the length of the message assembled so far.
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    /// Returns whether nothing has been written yet.
    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Returns the message assembled so far.
    pub fn as_slice(&self) -> &[u8] {
        self.buf.as_ref()
    }

    fn reserve(&self, len: usize) -> Result<(), ComposeError> {
        if self.buf.len() + len > self.capacity {
            Err(ComposeError::ShortBuf)
        } else {
            Ok(())
        }
    }

    /// Appends an octet.
    pub fn put_u8(&mut self, value: u8) -> Result<(), ComposeError> {
        self.reserve(1)?;
        self.buf.put_u8(value);
        Ok(())
    }

    /// Appends a big-endian 16 bit integer.
    pub fn put_u16(&mut self, value: u16) -> Result<(), ComposeError> {
        self.reserve(2)?;
        self.buf.put_u16(value);
        Ok(())
    }

    /// Appends a big-endian 32 bit integer.
    pub fn put_u32(&mut self, value: u32) -> Result<(), ComposeError> {
        self.reserve(4)?;
        self.buf.put_u32(value);
        Ok(())
    }

    /// Appends a slice of octets.
    pub fn put_slice(&mut self, data: &[u8]) -> Result<(), ComposeError> {
        self.reserve(data.len())?;
        self.buf.put_slice(data);
        Ok(())
    }

    /// Appends a character string.
    pub fn put_string(&mut self, data: &[u8]) -> Result<(), ComposeError> {
        let len = u8::try_from(data.len()).map_err(|_| ComposeError::LongLabel)?;
        self.put_u8(len)?;
        self.put_slice(data)
    }

    /// Overwrites a 16 bit integer at an earlier position.
    pub fn set_u16_at(&mut self, pos: usize, value: u16) {
        if let Some(target) = self.buf.get_mut(pos..pos + 2) {
            target.copy_from_slice(&value.to_be_bytes())
        }
    }

    /// Drops everything after the first `len` octets.
    pub fn truncate(&mut self, len: usize) {
        self.buf.truncate(len)
    }

    /// Converts the composer into the final message.
    pub fn freeze(self) -> Bytes {
        self.buf.freeze()
    }
}

//============ Error Types ===================================================

//------------ ParseError ----------------------------------------------------

/// An error happened while parsing wire-format data.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ParseError {
    /// An attempt was made to go beyond the end of the data.
    ShortInput,

    /// A compression pointer did not point backwards.
    BadCompression,

    /// A domain name was longer than 255 octets.
    LongName,

    /// A formatting error occurred.
    Form(&'static str),
}

impl ParseError {
    /// Creates a new parse error as a form error with the given message.
    pub fn form_error(msg: &'static str) -> Self {
        ParseError::Form(msg)
    }
}

//--- Display and Error

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            ParseError::ShortInput => f.write_str("unexpected end of input"),
            ParseError::BadCompression => {
                f.write_str("invalid compression pointer")
            }
            ParseError::LongName => f.write_str("long domain name"),
            ParseError::Form(msg) => f.write_str(msg),
        }
    }
}

impl std::error::Error for ParseError {}

//------------ ComposeError --------------------------------------------------

/// An error happened while composing a message.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ComposeError {
    /// The message would exceed its maximum size.
    ShortBuf,

    /// A domain name contained an empty label.
    EmptyLabel,

    /// A label or character string was longer than allowed.
    LongLabel,

    /// A domain name was longer than 255 octets.
    LongName,

    /// A domain name contained an incomplete or invalid escape sequence.
    BadEscape,
}

//--- Display and Error

impl fmt::Display for ComposeError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            ComposeError::ShortBuf => f.write_str("message size overflow"),
            ComposeError::EmptyLabel => f.write_str("empty label"),
            ComposeError::LongLabel => f.write_str("too long label"),
            ComposeError::LongName => f.write_str("long domain name"),
            ComposeError::BadEscape => f.write_str("invalid escape sequence"),
        }
    }
}

impl std::error::Error for ComposeError {}

//============ Testing =======================================================

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn latched_error() {
        let mut parser = Parser::new(b"\x01\x02\x03");
        assert_eq!(parser.get_u16(), 0x0102);
        assert_eq!(parser.get_u32(), 0);
        assert_eq!(parser.error(), Some(ParseError::ShortInput));
        // Once failed, nothing moves anymore.
        assert_eq!(parser.get_u8(), 0);
        assert_eq!(parser.pos(), 2);
        assert!(parser.check().is_err());
    }

    #[test]
    fn limits() {
        let mut parser = Parser::new(b"\x00\x01\x02\x03\x04");
        parser.advance(1);
        let old = parser.limit_to(2);
        assert_eq!(parser.get_u16(), 0x0102);
        assert_eq!(parser.remaining(), 0);
        parser.restore_limit(old);
        assert_eq!(parser.get_u16(), 0x0304);
        assert!(parser.check().is_ok());

        let mut parser = Parser::new(b"\x00\x01");
        parser.limit_to(3);
        assert_eq!(parser.error(), Some(ParseError::ShortInput));
    }

    #[test]
    fn strings() {
        let mut parser = Parser::new(b"\x03sip\x00\x05ab");
        assert_eq!(parser.get_string().as_ref(), b"sip");
        assert_eq!(parser.get_string().as_ref(), b"");
        assert!(parser.check().is_ok());
        assert!(parser.get_string().is_empty());
        assert_eq!(parser.error(), Some(ParseError::ShortInput));
    }

    #[test]
    fn composer_capacity() {
        let mut target = Composer::with_capacity(5);
        target.put_u32(0xdead_beef).unwrap();
        assert_eq!(target.put_u16(1), Err(ComposeError::ShortBuf));
        target.put_u8(7).unwrap();
        target.set_u16_at(0, 0x0102);
        assert_eq!(target.as_slice(), b"\x01\x02\xbe\xef\x07");
    }
}
