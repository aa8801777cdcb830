//! Registry values used on the wire.
//!
//! Record types, classes and response codes are all plain integers in a
//! message. Each of them gets a newtype here with constants for the
//! values the resolver cares about. Any other integer is still accepted
//! and carried through unchanged, it just lacks a name.
//!
//! The types convert to and from their integer via `From` as well as
//! `from_int` and `to_int`. They parse from and display as the usual
//! zone file mnemonics.

pub use self::class::Class;
pub use self::macros::FromStrError;
pub use self::rcode::Rcode;
pub use self::rtype::Rtype;

#[macro_use]
mod macros;

pub mod class;
pub mod rcode;
pub mod rtype;
