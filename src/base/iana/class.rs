//! Record classes.

//------------ Class ---------------------------------------------------------

int_enum! {
    /// The class of a record or question.
    ///
    /// The resolver only ever asks for records of class IN. The other
    /// values are here so that they show up with their proper name when
    /// a server hands out something unexpected.
    =>
    Class, u16;

    /// The Internet.
    (IN => 1, "IN")

    /// Chaosnet, used by some servers for version queries.
    (CH => 3, "CH")

    /// Hesiod.
    (HS => 4, "HS")

    /// The NONE query class.
    (NONE => 0xFE, "NONE")

    /// Any class at all.
    (ANY => 0xFF, "*")
}

int_enum_str_with_prefix!(Class, "CLASS", u16, "unknown class");

//============ Testing =======================================================

#[cfg(test)]
mod test {
    use super::Class;

    #[test]
    fn names() {
        assert_eq!(format!("{:?}", Class::IN), "Class::IN");
        assert_eq!(format!("{:?}", Class::from_int(69)), "Class(69)");
        assert_eq!(Class::ANY.to_string(), "*");
        assert_eq!(Class::from_int(42).to_string(), "CLASS42");
        assert_eq!("class3".parse::<Class>(), Ok(Class::CH));
        assert_eq!("in".parse::<Class>(), Ok(Class::IN));
        assert!("CLASSX".parse::<Class>().is_err());
    }
}
