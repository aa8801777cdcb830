//! Basics.
//!
//! This module provides the types for DNS data the resolver deals with
//! and the means to turn them into and extract them from wire-format
//! messages.
//!
//!
//! ## Parsing and Composing Messages
//!
//! We use the term *parsing* for extracting data from a wire-format
//! representation and *composing* for producing such a representation.
//!
//! Both parsing and composing happen on buffers holding a complete DNS
//! message. This seems to be a reasonable choice given the limited size of
//! DNS messages and the complexities introduced by compressing domain
//! names in message by referencing other parts of the message. The
//! fundamental types are the [`Parser`] and [`Composer`] of the [wire]
//! module.
//!
//! Unless you are testing the resolver, you are unlikely to ever deal with
//! messages directly. The [message] module creates the only query the
//! resolver sends and decodes the responses into [`Record`]s.
//!
//!
//! # Types for DNS Data
//!
//! The module contains a number of types for DNS data, arranged in
//! submodules:
//!
//! * [header](header/index.html) for the header of DNS messages,
//! * [name](name/index.html) for domain names,
//! * [record](record/index.html) for DNS resource records including record
//!   data,
//! * [iana](iana/index.html) for the various registered values.

//--- Re-exports

pub use self::header::Header;
pub use self::iana::{Class, Rcode, Rtype};
pub use self::message::{
    decode_response, encode_query, DecodeError, QueryInfo, Response,
    ResponseBuilder, MAX_MESSAGE,
};
pub use self::record::{
    filter_answers, sort_answers, Answers, Record, RecordData, Status,
};
pub use self::wire::{ComposeError, Composer, ParseError, Parser};

//--- Modules

pub mod header;
pub mod iana;
pub mod message;
pub mod name;
pub mod record;
pub mod wire;
