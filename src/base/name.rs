//! Domain names.
//!
//! Names are kept in their textual presentation form as a `String`: a
//! sequence of labels separated by dots. Names decoded from a message are
//! always absolute and end in a dot, the root name is a single dot. Names
//! given by users may or may not carry the final dot.
//!
//! This module provides the wire-format encoding and decoding of such
//! names, including name compression, plus a couple of helpers for
//! comparing, hashing, and synthesizing names.

use super::wire::{ComposeError, Composer, ParseError, Parser};
use core::hash::Hasher;
use siphasher::sip::SipHasher13;
use std::borrow::Cow;
use std::fmt::Write;
use std::net::IpAddr;

/// The maximum length of a label in octets.
pub const MAX_LABEL_LEN: usize = 63;

/// The maximum length of a domain name in wire format.
pub const MAX_NAME_LEN: usize = 255;

//------------ Composing -----------------------------------------------------

/// Appends a domain name in wire format.
///
/// Each label is written as a length octet followed by the label's octets.
/// Labels must not be longer than 63 octets and, except for a single final
/// dot marking an absolute name, must not be empty. Within a label, a
/// backslash escapes the next character or, followed by three decimal
/// digits, stands for the octet of that value.
///
/// If `pointer` is given, the name is terminated by a compression pointer
/// to that message offset instead of the root label. The caller is
/// responsible for the pointer referring to a previously written suffix.
pub fn compose_name(
    target: &mut Composer,
    name: &str,
    pointer: Option<u16>,
) -> Result<(), ComposeError> {
    let start = target.len();
    let mut len = 0;

    for label in split_labels(name)? {
        if label.len() > MAX_LABEL_LEN {
            return Err(ComposeError::LongLabel);
        }
        len += label.len() + 1;
        if len >= MAX_NAME_LEN {
            target.truncate(start);
            return Err(ComposeError::LongName);
        }
        // The length fits: checked against MAX_LABEL_LEN above.
        target.put_u8(label.len() as u8)?;
        target.put_slice(&label)?;
    }

    match pointer {
        Some(offset) => target.put_u16(0xC000 | (offset & 0x3FFF)),
        None => target.put_u8(0),
    }
}

/// Splits a name in presentation form into the octets of its labels.
fn split_labels(name: &str) -> Result<Vec<Vec<u8>>, ComposeError> {
    let mut res = Vec::new();
    if name == "." {
        return Ok(res);
    }
    let mut label = Vec::new();
    let mut chars = name.bytes();
    while let Some(ch) = chars.next() {
        match ch {
            b'.' => {
                if label.is_empty() {
                    return Err(ComposeError::EmptyLabel);
                }
                res.push(std::mem::take(&mut label));
            }
            b'\\' => {
                let ch = chars.next().ok_or(ComposeError::BadEscape)?;
                if !ch.is_ascii_digit() {
                    label.push(ch);
                    continue;
                }
                let mut value = u32::from(ch - b'0');
                for _ in 0..2 {
                    let digit = chars
                        .next()
                        .filter(u8::is_ascii_digit)
                        .ok_or(ComposeError::BadEscape)?;
                    value = value * 10 + u32::from(digit - b'0');
                }
                label.push(
                    u8::try_from(value).map_err(|_| ComposeError::BadEscape)?,
                );
            }
            _ => label.push(ch),
        }
    }
    if !label.is_empty() {
        res.push(label);
    }
    Ok(res)
}

//------------ Parsing -------------------------------------------------------

/// Takes a possibly compressed domain name from the parser.
///
/// The parser is left behind the name as it appears at the current
/// position, i.e., behind the first compression pointer if there is one.
/// Each compression pointer must refer to a position strictly before the
/// pointer itself, which guarantees that decompression terminates. The
/// uncompressed name must not exceed 255 octets.
///
/// Errors are latched in the parser; in that case an empty string is
/// returned.
pub fn parse_name(parser: &mut Parser) -> String {
    match parse_name_inner(parser) {
        Ok(name) => name,
        Err(err) => {
            parser.fail(err);
            String::new()
        }
    }
}

fn parse_name_inner(parser: &mut Parser) -> Result<String, ParseError> {
    parser.check()?;
    let mut res = String::new();
    let mut wire_len = 0;

    // Phase one: labels at the parser's position.
    let mut ptr = loop {
        let pos = parser.pos();
        let ltype = parser.get_u8();
        match ltype {
            0 => {
                parser.check()?;
                return Ok(finish_name(res));
            }
            1..=0x3F => {
                let label = parser.get_slice(ltype.into());
                parser.check()?;
                wire_len += label.len() + 1;
                if wire_len >= MAX_NAME_LEN {
                    return Err(ParseError::LongName);
                }
                push_label(&mut res, label);
            }
            0xC0..=0xFF => {
                let low = parser.get_u8();
                parser.check()?;
                let target = (usize::from(ltype & 0x3F) << 8) | usize::from(low);
                if target >= pos {
                    return Err(ParseError::BadCompression);
                }
                break target;
            }
            _ => {
                parser.check()?;
                return Err(ParseError::form_error("invalid label type"));
            }
        }
    };

    // Phase two: follow compression pointers on the complete message.
    let data = parser.message();
    loop {
        let pos = ptr;
        let ltype = *data.get(pos).ok_or(ParseError::ShortInput)?;
        match ltype {
            0 => return Ok(finish_name(res)),
            1..=0x3F => {
                let end = pos + 1 + usize::from(ltype);
                let label = data.get(pos + 1..end).ok_or(ParseError::ShortInput)?;
                wire_len += label.len() + 1;
                if wire_len >= MAX_NAME_LEN {
                    return Err(ParseError::LongName);
                }
                push_label(&mut res, label);
                ptr = end;
            }
            0xC0..=0xFF => {
                let low = *data.get(pos + 1).ok_or(ParseError::ShortInput)?;
                let target = (usize::from(ltype & 0x3F) << 8) | usize::from(low);
                if target >= pos {
                    return Err(ParseError::BadCompression);
                }
                ptr = target;
            }
            _ => return Err(ParseError::form_error("invalid label type")),
        }
    }
}

/// Appends a label in presentation form.
///
/// Dots and backslashes are escaped with a backslash, octets outside
/// printable ASCII become `\DDD`.
fn push_label(res: &mut String, label: &[u8]) {
    for &ch in label {
        match ch {
            b'.' | b'\\' => {
                res.push('\\');
                res.push(char::from(ch));
            }
            0x21..=0x7E => res.push(char::from(ch)),
            _ => {
                let _ = write!(res, "\\{:03}", ch);
            }
        }
    }
    res.push('.');
}

fn finish_name(res: String) -> String {
    if res.is_empty() {
        ".".into()
    } else {
        res
    }
}

//------------ Helpers -------------------------------------------------------

/// Returns the name in absolute form, i.e., ending in a dot.
pub fn to_rooted(name: &str) -> Cow<str> {
    if name.ends_with('.') {
        Cow::Borrowed(name)
    } else {
        Cow::Owned(format!("{}.", name))
    }
}

/// Compares two names ignoring ASCII case and a final dot.
pub fn name_eq(left: &str, right: &str) -> bool {
    let left = left.strip_suffix('.').unwrap_or(left);
    let right = right.strip_suffix('.').unwrap_or(right);
    left.eq_ignore_ascii_case(right)
}

/// Returns a hash value for a name.
///
/// The hash ignores ASCII case and a final dot, so that all spellings
/// comparing equal under [`name_eq`] hash to the same value.
pub fn name_hash(name: &str) -> u64 {
    let name = name.strip_suffix('.').unwrap_or(name);
    let mut hasher = SipHasher13::new();
    for ch in name.bytes() {
        hasher.write_u8(ch.to_ascii_lowercase());
    }
    hasher.finish()
}

/// Counts the dots in a name, stopping once `limit` has been reached.
pub fn count_dots(name: &str, limit: usize) -> usize {
    name.bytes().filter(|&ch| ch == b'.').take(limit).count()
}

/// Returns the domain name for a reverse lookup of an address.
///
/// IPv4 addresses are turned into the reversed octets below
/// `in-addr.arpa.`. IPv6 addresses are turned into reversed nibbles below
/// `ip6.arpa.` or, if `ip6_int` is set, the historic `ip6.int.`.
pub fn reverse_name(addr: IpAddr, ip6_int: bool) -> String {
    let mut res = String::new();
    match addr {
        IpAddr::V4(addr) => {
            let octets = addr.octets();
            // Writing to a String cannot fail.
            let _ = write!(
                res,
                "{}.{}.{}.{}.in-addr.arpa.",
                octets[3], octets[2], octets[1], octets[0]
            );
        }
        IpAddr::V6(addr) => {
            for octet in addr.octets().iter().rev() {
                let _ = write!(res, "{:x}.{:x}.", octet & 0x0F, octet >> 4);
            }
            res.push_str(if ip6_int { "ip6.int." } else { "ip6.arpa." });
        }
    }
    res
}

//============ Testing =======================================================
