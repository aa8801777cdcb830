//! Macros for the registry newtypes.

/// Defines a newtype over a registry integer.
///
/// Every listed value becomes an associated constant together with its
/// mnemonic. Values without a constant are still representable. The type
/// gets `Clone`, `Copy`, the comparison traits, `Hash`, conversions from
/// and into the integer, and a `Debug` impl that prints `Type::NAME` or
/// `Type(value)`.
macro_rules! int_enum {
    ( $(#[$attr:meta])* =>
      $ianatype:ident, $inttype:path;
      $( $(#[$variant_attr:meta])* ( $variant:ident =>
                                        $value:expr, $mnemonic:expr) )* ) => {
        $(#[$attr])*
        #[derive(Clone, Copy, Eq, Hash, Ord, PartialEq, PartialOrd)]
        pub struct $ianatype($inttype);

        impl $ianatype {
            $(
                $(#[$variant_attr])*
                pub const $variant: $ianatype = $ianatype($value);
            )*

            /// All named values with their mnemonic.
            const NAMED: &'static [($ianatype, &'static str)] = &[
                $( ($ianatype::$variant, $mnemonic), )*
            ];

            /// Creates a value from the raw integer.
            #[must_use]
            pub const fn from_int(value: $inttype) -> Self {
                Self(value)
            }

            /// Returns the raw integer.
            #[must_use]
            pub const fn to_int(self) -> $inttype {
                self.0
            }

            /// Looks up a mnemonic, ignoring ASCII case.
            #[must_use]
            pub fn from_mnemonic(m: &[u8]) -> Option<Self> {
                Self::NAMED
                    .iter()
                    .find(|(_, name)| m.eq_ignore_ascii_case(name.as_bytes()))
                    .map(|(value, _)| *value)
            }

            /// Returns the mnemonic if the value has one.
            #[must_use]
            pub fn to_mnemonic_str(self) -> Option<&'static str> {
                Self::NAMED
                    .iter()
                    .find(|(value, _)| value.0 == self.0)
                    .map(|(_, name)| *name)
            }
        }

        impl From<$inttype> for $ianatype {
            fn from(value: $inttype) -> Self {
                Self(value)
            }
        }

        impl From<$ianatype> for $inttype {
            fn from(value: $ianatype) -> Self {
                value.0
            }
        }

        impl core::fmt::Debug for $ianatype {
            fn fmt(&self, f: &mut core::fmt::Formatter) -> core::fmt::Result {
                let ty = stringify!($ianatype);
                match self.to_mnemonic_str() {
                    Some(name) => write!(f, "{}::{}", ty, name),
                    None => write!(f, "{}({})", ty, self.0),
                }
            }
        }
    }
}

/// Adds `FromStr` and `Display` using a generic prefix.
///
/// Parsing accepts a mnemonic, the prefix followed by a decimal number
/// such as `TYPE99`, or a bare number. Displaying falls back to the
/// prefixed form for values without a mnemonic.
macro_rules! int_enum_str_with_prefix {
    ($ianatype:ident, $str_prefix:expr, $inttype:ident, $error:expr) => {
        impl core::str::FromStr for $ianatype {
            type Err = $crate::base::iana::FromStrError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                if let Some(res) = $ianatype::from_mnemonic(s.as_bytes()) {
                    return Ok(res);
                }
                let prefix_len = $str_prefix.len();
                let digits = match s.get(..prefix_len) {
                    Some(head) if head.eq_ignore_ascii_case($str_prefix) => {
                        &s[prefix_len..]
                    }
                    _ => s,
                };
                match digits.parse::<$inttype>() {
                    Ok(value) => Ok($ianatype::from_int(value)),
                    Err(_) => Err($crate::base::iana::FromStrError($error)),
                }
            }
        }

        impl core::fmt::Display for $ianatype {
            fn fmt(&self, f: &mut core::fmt::Formatter) -> core::fmt::Result {
                if let Some(name) = self.to_mnemonic_str() {
                    return f.write_str(name);
                }
                write!(f, "{}{}", $str_prefix, self.0)
            }
        }
    };
}

//------------ FromStrError --------------------------------------------------

/// A string was neither a known mnemonic nor a number.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct FromStrError(pub(crate) &'static str);

impl core::fmt::Display for FromStrError {
    fn fmt(&self, f: &mut core::fmt::Formatter) -> core::fmt::Result {
        f.write_str(self.0)
    }
}

impl std::error::Error for FromStrError {}
