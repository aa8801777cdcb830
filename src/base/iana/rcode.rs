//! DNS response codes.
//!
//! The 4 bit response code lives in the lower bits of the header flags.
//! Extended codes via EDNS are not used by this crate: a stub resolver
//! only ever needs to tell the classic codes apart.

//------------ Rcode ---------------------------------------------------------

int_enum! {
    /// DNS Response Codes.
    ///
    /// See RFC 1035, section 4.1.1.
    =>
    Rcode, u8;

    /// No error condition.
    (NOERROR => 0, "NOERROR")

    /// Format error.
    ///
    /// The name server was unable to interpret the query. A server that
    /// does not understand EDNS0 answers an OPT record with this code.
    (FORMERR => 1, "FORMERR")

    /// Server failure.
    (SERVFAIL => 2, "SERVFAIL")

    /// Name error.
    ///
    /// The domain name given in the query does not exist at the name
    /// server.
    (NXDOMAIN => 3, "NXDOMAIN")

    /// Not implemented.
    (NOTIMP => 4, "NOTIMP")

    /// Query refused.
    (REFUSED => 5, "REFUSED")
}

int_enum_str_with_prefix!(Rcode, "RCODE", u8, "unknown rcode");

impl Rcode {
    /// Returns the response code from the second flags octet of a header.
    #[must_use]
    pub fn from_flags(flags: u16) -> Self {
        Rcode::from_int((flags & 0x0F) as u8)
    }
}

//============ Testing =======================================================

#[cfg(test)]
mod test {
    use super::Rcode;

    #[test]
    fn from_flags() {
        assert_eq!(Rcode::from_flags(0x8183), Rcode::NXDOMAIN);
        assert_eq!(Rcode::from_flags(0x8180), Rcode::NOERROR);
    }
}
