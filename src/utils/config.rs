//! Limits for configuration values.

use core::str::FromStr;
use std::cmp;

//------------ DefMinMax -----------------------------------------------------

/// The range of a numeric resolver option and its fallback value.
#[derive(Clone, Copy, Debug)]
pub struct DefMinMax<T> {
    def: T,
    min: T,
    max: T,
}

impl<T> DefMinMax<T> {
    /// Creates a new value.
    pub const fn new(def: T, min: T, max: T) -> Self {
        Self { def, min, max }
    }

    /// Returns the default value.
    pub fn default(self) -> T {
        self.def
    }

    /// Trims the given value to fit into the minimum/maximum range.
    pub fn limit(self, value: T) -> T
    where
        T: Ord,
    {
        cmp::max(self.min, cmp::min(self.max, value))
    }

    /// Parses a decimal value and trims it into the range.
    ///
    /// Digits too large for `T` end up as the maximum. Anything else
    /// that does not parse results in the default.
    pub fn parse(self, value: &str) -> T
    where
        T: Ord + FromStr,
    {
        let value = value.trim();
        match value.parse() {
            Ok(value) => self.limit(value),
            Err(_) if is_number(value) => self.max,
            Err(_) => self.def,
        }
    }
}

fn is_number(value: &str) -> bool {
    !value.is_empty() && value.bytes().all(|ch| ch.is_ascii_digit())
}

//============ Testing =======================================================

#[cfg(test)]
mod test {
    use super::DefMinMax;

    const NDOTS: DefMinMax<u8> = DefMinMax::new(1, 0, 15);

    #[test]
    fn limit_and_parse() {
        assert_eq!(NDOTS.default(), 1);
        assert_eq!(NDOTS.limit(40), 15);
        assert_eq!(NDOTS.parse("3"), 3);
        assert_eq!(NDOTS.parse("300"), 15);
        assert_eq!(NDOTS.parse("-1"), 1);
        assert_eq!(NDOTS.parse("x"), 1);
        assert_eq!(DefMinMax::new(6u32, 1, 16).parse("0"), 1);
    }
}
