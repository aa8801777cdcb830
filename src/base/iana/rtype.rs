//! Record types.

//------------ Rtype ---------------------------------------------------------

int_enum! {
    /// The type of a record or question.
    ///
    /// Only the types the resolver knows how to decode or that show up in
    /// its logs have constants here. All other values are still valid and
    /// are carried as opaque data.
    ///
    /// [IANA registry]: http://www.iana.org/assignments/dns-parameters/dns-parameters.xhtml#dns-parameters-4
    =>
    Rtype, u16;

    /// A host address.
    (A => 1, "A")

    /// An authoritative name server.
    (NS => 2, "NS")

    /// The canonical name for an alias
    (CNAME => 5, "CNAME")

    /// Marks the start of a zone of authority.
    (SOA => 6, "SOA")

    /// A domain name pointer.
    (PTR => 12, "PTR")

    /// Mail exchange.
    (MX => 15, "MX")

    /// Text strings.
    (TXT => 16, "TXT")

    /// IPv6 address.
    ///
    /// See RFC 3596.
    (AAAA => 28, "AAAA")

    /// Server selection.
    ///
    /// See RFC 2782.
    (SRV => 33, "SRV")

    /// Naming authority pointer.
    ///
    /// See RFC 2915 and RFC 3403.
    (NAPTR => 35, "NAPTR")

    /// A6.
    ///
    /// Historic IPv6 address record, see RFC 2874.
    (A6 => 38, "A6")

    /// OPT.
    ///
    /// The EDNS0 pseudo-record, see RFC 6891.
    (OPT => 41, "OPT")

    /// Transaction signature.
    ///
    /// Only valid in queries; everything from here on is a query type.
    (TSIG => 250, "TSIG")

    /// A request for a transfer of an entire zone.
    (AXFR => 252, "AXFR")

    /// A request for all records the server/cache has available.
    (ANY => 255, "ANY")
}

int_enum_str_with_prefix!(Rtype, "TYPE", u16, "unknown record type");

impl Rtype {
    /// Returns whether the type is a query type rather than a record type.
    ///
    /// Query types never appear in an answer, so a response to a query
    /// for one of those is never checked for matching records.
    #[must_use]
    pub fn is_qtype(self) -> bool {
        self.to_int() >= Rtype::TSIG.to_int()
    }
}

//============ Testing =======================================================

#[cfg(test)]
mod test {
    use super::Rtype;
    use core::str::FromStr;

    #[test]
    fn debug() {
        assert_eq!(format!("{:?}", Rtype::SRV), "Rtype::SRV");
        assert_eq!(format!("{:?}", Rtype::from_int(99)), "Rtype(99)");
    }

    #[test]
    fn from_str() {
        assert_eq!(Rtype::from_str("naptr"), Ok(Rtype::NAPTR));
        assert_eq!(Rtype::from_str("TYPE33"), Ok(Rtype::SRV));
        assert_eq!(Rtype::from_str("65"), Ok(Rtype::from_int(65)));
        assert!(Rtype::from_str("bogus").is_err());
    }

    #[test]
    fn display() {
        assert_eq!(format!("{}", Rtype::AAAA), "AAAA");
        assert_eq!(format!("{}", Rtype::from_int(99)), "TYPE99");
    }
}
