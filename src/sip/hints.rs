//! What kind of results a SIP resolution should produce.

use super::transport::SipTransport;
use crate::base::iana::Rtype;
use smallvec::SmallVec;

//------------ Family --------------------------------------------------------

/// An address family.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum Family {
    V4,
    V6,
}

impl Family {
    /// Returns the record type holding addresses of this family.
    pub fn rtype(self) -> Rtype {
        match self {
            Family::V4 => Rtype::A,
            Family::V6 => Rtype::AAAA,
        }
    }
}

//------------ Hint ----------------------------------------------------------

/// A filter for results.
///
/// A missing family or transport matches all of them.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct Hint {
    pub family: Option<Family>,
    pub transport: Option<SipTransport>,
}

impl Hint {
    pub fn new(
        family: Option<Family>,
        transport: Option<SipTransport>,
    ) -> Self {
        Hint { family, transport }
    }
}

//------------ Hints ---------------------------------------------------------

/// The hints for a SIP resolution.
///
/// Results are produced for every combination of address family and
/// transport matched by at least one hint. Without any hints, all
/// families and transports are considered.
///
/// The flags determine the name carried in each result: with
/// `canon_name`, the result has the owner name of its address record,
/// or with `numeric_host` the address itself in text form.
#[derive(Clone, Debug, Default)]
pub struct Hints {
    hints: SmallVec<[Hint; 4]>,
    canon_name: bool,
    numeric_host: bool,
}

impl Hints {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a filter.
    pub fn hint(
        mut self,
        family: Option<Family>,
        transport: Option<SipTransport>,
    ) -> Self {
        self.hints.push(Hint::new(family, transport));
        self
    }

    /// Includes the canonical name in results.
    pub fn canon_name(mut self, yes: bool) -> Self {
        self.canon_name = yes;
        self
    }

    /// Includes the numeric address in results.
    ///
    /// This wins over `canon_name`.
    pub fn numeric_host(mut self, yes: bool) -> Self {
        self.numeric_host = yes;
        self
    }

    pub fn wants_canon_name(&self) -> bool {
        self.canon_name
    }

    pub fn wants_numeric_host(&self) -> bool {
        self.numeric_host
    }

    /// Returns the filters, or a single match-all filter if there are none.
    pub fn iter(&self) -> impl Iterator<Item = Hint> + '_ {
        let default = if self.hints.is_empty() {
            Some(Hint::default())
        } else {
            None
        };
        self.hints.iter().copied().chain(default)
    }
}
