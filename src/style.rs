// SPDX-License-Identifier: MIT OR Apache-2.0

//! ANSI text styles used by keyword colorization.
//!
//! Each palette is a closed set. Names parse case-insensitively; an unknown name is an
//! [`UnknownIdentifier`](crate::LogError::UnknownIdentifier) error. `Display` writes the
//! escape sequence itself, so a style can be spliced straight into output.

use crate::error::LogError;
use std::fmt::Display;
use std::str::FromStr;

/// Resets every attribute set by a previous sequence.
pub const RESET: &str = "\x1b[0m";

macro_rules! palette {
    (
        $(#[$meta:meta])*
        $name:ident, $kind:literal {
            $($variant:ident => $label:literal, $code:literal;)+
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum $name {
            $($variant,)+
        }

        impl $name {
            /// Every member, in palette order.
            pub const ALL: &'static [$name] = &[$($name::$variant,)+];

            /// The palette name, e.g. `"RED"`.
            pub const fn name(self) -> &'static str {
                match self {
                    $($name::$variant => $label,)+
                }
            }

            /// The ANSI escape sequence.
            pub const fn code(self) -> &'static str {
                match self {
                    $($name::$variant => $code,)+
                }
            }
        }

        impl FromStr for $name {
            type Err = LogError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                let wanted = s.trim();
                $name::ALL
                    .iter()
                    .copied()
                    .find(|member| member.name().eq_ignore_ascii_case(wanted))
                    .ok_or_else(|| LogError::unknown($kind, wanted))
            }
        }

        impl Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.code())
            }
        }
    };
}

palette! {
    /// Foreground colors.
    TextColor, "text color" {
        Black => "BLACK", "\x1b[30m";
        Red => "RED", "\x1b[31m";
        Green => "GREEN", "\x1b[32m";
        Yellow => "YELLOW", "\x1b[33m";
        Blue => "BLUE", "\x1b[34m";
        Magenta => "MAGENTA", "\x1b[35m";
        Cyan => "CYAN", "\x1b[36m";
        White => "WHITE", "\x1b[37m";
    }
}

palette! {
    /// Background colors.
    BackgroundColor, "background color" {
        Black => "BLACK", "\x1b[40m";
        Red => "RED", "\x1b[41m";
        Green => "GREEN", "\x1b[42m";
        Yellow => "YELLOW", "\x1b[43m";
        Blue => "BLUE", "\x1b[44m";
        Magenta => "MAGENTA", "\x1b[45m";
        Cyan => "CYAN", "\x1b[46m";
        White => "WHITE", "\x1b[47m";
    }
}

palette! {
    /// Text effects.
    TextEffect, "text effect" {
        Bold => "BOLD", "\x1b[1m";
        Italic => "ITALIC", "\x1b[3m";
        Underline => "UNDERLINE", "\x1b[4m";
    }
}
