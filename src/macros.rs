//! Declarative helpers for the CoAP code tables.

/// Defines an enum of CoAP message codes written as `class.detail` pairs.
///
/// The generated enum carries an `Other(u8)` variant so that every raw code
/// byte maps to a value, which keeps decoding of unknown codes lossless.
macro_rules! define_message_code {
    (
        $(#[$meta:meta])*
        $name:ident {
            $($variant:ident = ($class:expr, $detail:expr, $label:expr)),* $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum $name {
            $($variant,)*
            Other(u8),
        }

        impl $name {
            /// Raw code byte (`class << 5 | detail`).
            pub const fn code(self) -> u8 {
                match self {
                    $($name::$variant => ($class << 5) | $detail,)*
                    $name::Other(c) => c,
                }
            }

            pub const fn from_code(code: u8) -> Self {
                $(
                    if code == (($class << 5) | $detail) {
                        return $name::$variant;
                    }
                )*
                $name::Other(code)
            }

            pub const fn class(self) -> u8 {
                self.code() >> 5
            }

            pub const fn detail(self) -> u8 {
                self.code() & 0x1f
            }

            pub fn label(self) -> &'static str {
                match self {
                    $($name::$variant => $label,)*
                    $name::Other(_) => "Unknown",
                }
            }
        }

        impl From<u8> for $name {
            fn from(code: u8) -> Self {
                $name::from_code(code)
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}.{:02} {}", self.class(), self.detail(), self.label())
            }
        }
    };
}
